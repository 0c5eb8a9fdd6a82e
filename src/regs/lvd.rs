//! Low-voltage detection (LVD) register bank.
//!
//! The bank sits in the always-on system block behind the PRCR write
//! protection register. Both monitors share LVCMPCR and LVDLVLR, so updates
//! to those registers are critical-section read-modify-writes performed
//! between `prcr_unlock` and `prcr_lock`.

use vcell::VolatileCell;

/// LVDnCR1.IDTSEL encoding: crossing while the supply falls.
pub const IDTSEL_FALLING: u8 = 0b00;
/// LVDnCR1.IDTSEL encoding: crossing while the supply rises.
pub const IDTSEL_RISING: u8 = 0b01;
/// LVDnCR1.IDTSEL encoding: either crossing direction.
pub const IDTSEL_BOTH: u8 = 0b10;

const PRCR_UNLOCK_KEY: u16 = 0xA50B;
const PRCR_LOCK_KEY: u16 = 0xA500;

#[repr(C)]
pub struct RegisterBlock {
    /// Protect register: key in the upper byte, protect bits below.
    prcr: VolatileCell<u16>,
    _reserved0: [u8; 2],
    /// Voltage monitor enable bits (LVD1E, LVD2E).
    lvcmpcr: VolatileCell<u8>,
    _reserved1: [u8; 3],
    /// Detection voltage level, one nibble per monitor.
    lvdlvlr: VolatileCell<u8>,
    _reserved2: [u8; 3],
    /// Monitor control 0: RIE, DFDIS, CMPE, FSAMP, RI, RN.
    lvdcr0: [VolatileCell<u8>; 2],
    _reserved3: [u8; 2],
    /// Monitor control 1: IDTSEL, IRQSEL.
    lvdcr1: [VolatileCell<u8>; 2],
    _reserved4: [u8; 2],
    /// Monitor status: DET (latched crossing), MON (live comparison).
    lvdsr: [VolatileCell<u8>; 2],
}

impl RegisterBlock {
    pub fn prcr_unlock(&self) {
        self.prcr.set(PRCR_UNLOCK_KEY);
    }

    pub fn prcr_lock(&self) {
        self.prcr.set(PRCR_LOCK_KEY);
    }

    #[cfg(test)]
    pub(crate) fn prcr_locked(&self) -> bool {
        self.prcr.get() == PRCR_LOCK_KEY
    }

    pub fn lvcmpcr_lvde(&self, monitor: u8) -> bool {
        self.lvcmpcr.get() & (1 << (5 + monitor)) != 0
    }

    pub fn lvcmpcr_lvde_set(&self, monitor: u8, on: bool) {
        let mask = 1 << (5 + monitor);
        let value = self.lvcmpcr.get();
        self.lvcmpcr.set(if on { value | mask } else { value & !mask });
    }

    pub fn lvdlvlr_lvl_set(&self, monitor: u8, level: u8) {
        let shift = monitor * 4;
        let value = self.lvdlvlr.get() & !(0x0F << shift);
        self.lvdlvlr.set(value | ((level & 0x0F) << shift));
    }

    fn cr0_bit_set(&self, monitor: u8, bit: u8, on: bool) {
        let reg = &self.lvdcr0[monitor as usize];
        let mask = 1 << bit;
        let value = reg.get();
        reg.set(if on { value | mask } else { value & !mask });
    }

    fn cr0_bit(&self, monitor: u8, bit: u8) -> bool {
        self.lvdcr0[monitor as usize].get() & (1 << bit) != 0
    }

    /// Reset/interrupt event enable.
    pub fn lvdcr0_rie(&self, monitor: u8) -> bool {
        self.cr0_bit(monitor, 0)
    }

    pub fn lvdcr0_rie_set(&self, monitor: u8, on: bool) {
        self.cr0_bit_set(monitor, 0, on);
    }

    /// Digital filter disable (set disables the filter).
    pub fn lvdcr0_dfdis_set(&self, monitor: u8, disabled: bool) {
        self.cr0_bit_set(monitor, 1, disabled);
    }

    /// Comparison result output enable.
    pub fn lvdcr0_cmpe(&self, monitor: u8) -> bool {
        self.cr0_bit(monitor, 2)
    }

    pub fn lvdcr0_cmpe_set(&self, monitor: u8, on: bool) {
        self.cr0_bit_set(monitor, 2, on);
    }

    /// Negation delay select: set delays negation until reset entry.
    pub fn lvdcr0_rn_set(&self, monitor: u8, from_reset: bool) {
        self.cr0_bit_set(monitor, 7, from_reset);
    }

    /// Digital filter sampling clock divider.
    pub fn lvdcr0_fsamp_set(&self, monitor: u8, fsamp: u8) {
        let reg = &self.lvdcr0[monitor as usize];
        let value = reg.get() & !(0b11 << 4);
        reg.set(value | ((fsamp & 0b11) << 4));
    }

    pub fn lvdcr1_idtsel(&self, monitor: u8) -> u8 {
        self.lvdcr1[monitor as usize].get() & 0b11
    }

    pub fn lvdcr1_idtsel_set(&self, monitor: u8, idtsel: u8) {
        let reg = &self.lvdcr1[monitor as usize];
        let value = reg.get() & !0b11;
        reg.set(value | (idtsel & 0b11));
    }

    /// Maskable interrupt (rather than NMI) routing select.
    pub fn lvdcr1_irqsel_set(&self, monitor: u8, maskable: bool) {
        let reg = &self.lvdcr1[monitor as usize];
        let value = reg.get();
        reg.set(if maskable { value | (1 << 2) } else { value & !(1 << 2) });
    }

    /// Latched threshold-crossing flag.
    pub fn lvdsr_det(&self, monitor: u8) -> bool {
        self.lvdsr[monitor as usize].get() & 1 != 0
    }

    pub fn lvdsr_det_clear(&self, monitor: u8) {
        let reg = &self.lvdsr[monitor as usize];
        reg.set(reg.get() & !1);
    }

    /// Live comparison result: set while the supply is above the threshold.
    pub fn lvdsr_mon(&self, monitor: u8) -> bool {
        self.lvdsr[monitor as usize].get() & (1 << 1) != 0
    }

    #[cfg(test)]
    pub(crate) const fn test_block() -> Self {
        Self {
            prcr: VolatileCell::new(PRCR_LOCK_KEY),
            _reserved0: [0; 2],
            lvcmpcr: VolatileCell::new(0),
            _reserved1: [0; 3],
            lvdlvlr: VolatileCell::new(0),
            _reserved2: [0; 3],
            lvdcr0: [VolatileCell::new(0), VolatileCell::new(0)],
            _reserved3: [0; 2],
            lvdcr1: [VolatileCell::new(0), VolatileCell::new(0)],
            _reserved4: [0; 2],
            lvdsr: [VolatileCell::new(0), VolatileCell::new(0)],
        }
    }

    /// Raises the latched/live status bits the way the analog side would.
    #[cfg(test)]
    pub(crate) fn test_raise(&self, monitor: u8, det: bool, above: bool) {
        let mut value = 0u8;
        if det {
            value |= 1;
        }
        if above {
            value |= 1 << 1;
        }
        self.lvdsr[monitor as usize].set(value);
    }
}
