//! Parallel data capture (PDC) register block.

use vcell::VolatileCell;

use super::{reg_bit, reg_field, reg_raw};

/// PCSR flag: receive FIFO busy.
pub const STATUS_FBSY: u32 = 1 << 0;
/// PCSR flag: receive FIFO empty.
pub const STATUS_FEMPF: u32 = 1 << 1;
/// PCSR flag: frame end.
pub const STATUS_FEF: u32 = 1 << 2;
/// PCSR flag: receive data overrun.
pub const STATUS_OVRF: u32 = 1 << 3;
/// PCSR flag: receive data underrun.
pub const STATUS_UDRF: u32 = 1 << 4;
/// PCSR flag: vertical line count setting error.
pub const STATUS_VERF: u32 = 1 << 5;
/// PCSR flag: horizontal byte count setting error.
pub const STATUS_HERF: u32 = 1 << 6;

const STATUS_CLEARABLE: u32 =
    STATUS_FEF | STATUS_OVRF | STATUS_UDRF | STATUS_VERF | STATUS_HERF;

#[repr(C)]
pub struct RegisterBlock {
    /// Control register 0: clock, sync polarity, reset, interrupt enables.
    pccr0: VolatileCell<u32>,
    /// Control register 1: capture enable.
    pccr1: VolatileCell<u32>,
    /// Status register.
    pcsr: VolatileCell<u32>,
    /// Pin monitor register: live VSYNC and HSYNC levels.
    pcmonr: VolatileCell<u32>,
    /// Receive data register (drained by the transfer engine).
    pcdr: VolatileCell<u32>,
    /// Vertical capture window: start line and line count.
    vcr: VolatileCell<u32>,
    /// Horizontal capture window: start byte and byte count.
    hcr: VolatileCell<u32>,
}

impl RegisterBlock {
    reg_bit!(u32, pccr0, pcke, 0);
    reg_bit!(u32, pccr0, vps, 1);
    reg_bit!(u32, pccr0, hps, 2);
    reg_bit!(u32, pccr0, pckoe, 4);

    /// Initiates the PDC reset sequence; hardware clears the bit when the
    /// reset completes. The host build stands in for hardware and completes
    /// it immediately.
    pub fn pccr0_prst_start(&self) {
        self.pccr0.set(self.pccr0.get() | (1 << 3));
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        self.pccr0.set(self.pccr0.get() & !(1 << 3));
    }

    #[inline(always)]
    pub fn pccr0_prst(&self) -> bool {
        self.pccr0.get() & (1 << 3) != 0
    }

    reg_field!(u32, pccr0, pckdiv, 8, 0xF);
    reg_bit!(u32, pccr0, eds, 14);

    /// Interrupt enable field: data-ready, frame-end, overrun, underrun,
    /// vertical error, horizontal error, packed in bits 21:16.
    reg_field!(u32, pccr0, inte, 16, 0x3F);

    reg_bit!(u32, pccr1, pce, 0);

    reg_raw!(u32, pcsr);

    /// Clears the given status flags; non-serviced flags and the FIFO state
    /// bits are carried through unchanged.
    pub fn pcsr_clear(&self, mask: u32) {
        self.pcsr.set(self.pcsr.get() & !(mask & STATUS_CLEARABLE));
    }

    reg_bit!(u32, pcmonr, vsync, 0);
    reg_bit!(u32, pcmonr, hsync, 1);

    reg_field!(u32, vcr, vst, 0, 0xFFF);
    reg_field!(u32, vcr, vsz, 16, 0xFFF);
    reg_field!(u32, hcr, hst, 0, 0xFFF);
    reg_field!(u32, hcr, hsz, 16, 0xFFF);

    /// Address of the receive data register, used as the fixed source of the
    /// external transfer engine.
    pub fn pcdr_ptr(&self) -> *const u32 {
        self.pcdr.as_ptr()
    }

    #[cfg(test)]
    pub(crate) fn test_raise_status(&self, mask: u32) {
        self.pcsr.set(self.pcsr.get() | mask);
    }

    #[cfg(test)]
    pub(crate) const fn test_block() -> Self {
        Self {
            pccr0: VolatileCell::new(0),
            pccr1: VolatileCell::new(0),
            pcsr: VolatileCell::new(0),
            pcmonr: VolatileCell::new(0),
            pcdr: VolatileCell::new(0),
            vcr: VolatileCell::new(0),
            hcr: VolatileCell::new(0),
        }
    }
}
