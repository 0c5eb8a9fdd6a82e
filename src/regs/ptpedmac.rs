//! PTP Ethernet DMA controller (PTPEDMAC) register block.

use vcell::VolatileCell;

use super::{reg_bit, reg_raw};

/// EESR: received frame type field mask.
pub const EESR_TYPE_MASK: u32 = 0xF;
/// EESR: receiving port bit.
pub const EESR_PORT: u32 = 1 << 7;
/// EESR: receive FIFO overflow.
pub const EESR_RFOF: u32 = 1 << 16;
/// EESR: receive descriptor exhausted.
pub const EESR_RDE: u32 = 1 << 17;
/// EESR: frame received.
pub const EESR_FR: u32 = 1 << 18;
/// EESR: transmit FIFO underflow.
pub const EESR_TFUF: u32 = 1 << 19;
/// EESR: transmit descriptor exhausted.
pub const EESR_TDE: u32 = 1 << 20;
/// EESR: frame transmit complete.
pub const EESR_TC: u32 = 1 << 21;
/// EESR: MAC address error.
pub const EESR_MACE: u32 = 1 << 22;
/// EESR: address error.
pub const EESR_ADE: u32 = 1 << 23;
/// EESR: received frame count overflow.
pub const EESR_RFCOF: u32 = 1 << 24;

/// The error-group interrupt sources.
pub const EESR_ERROR_GROUP: u32 =
    EESR_MACE | EESR_RFOF | EESR_RDE | EESR_TFUF | EESR_TDE | EESR_ADE | EESR_RFCOF;

/// All status bits the driver clears at open.
pub const EESR_ALL: u32 = EESR_ERROR_GROUP | EESR_FR | EESR_TC;

#[repr(C)]
pub struct RegisterBlock {
    /// Mode register: SWR software reset, DE little-endian select.
    edmr: VolatileCell<u32>,
    /// Transmit request register.
    edtrr: VolatileCell<u32>,
    /// Receive request register: RR receive enable.
    edrrr: VolatileCell<u32>,
    /// Transmit descriptor list base address.
    tdlar: VolatileCell<u32>,
    /// Receive descriptor list base address.
    rdlar: VolatileCell<u32>,
    /// ETHERC/EDMAC status register; a bit clears when 1 is written to it.
    eesr: VolatileCell<u32>,
    /// Interrupt source enable register.
    eesipr: VolatileCell<u32>,
    /// Missed-frame counter.
    rmfcr: VolatileCell<u32>,
    /// Transmit FIFO threshold.
    tftr: VolatileCell<u32>,
    /// FIFO depth configuration.
    fdr: VolatileCell<u32>,
    /// Receiving method control: RNR continuous reception.
    rmcr: VolatileCell<u32>,
}

impl RegisterBlock {
    reg_bit!(u32, edmr, swr, 0);
    reg_bit!(u32, edmr, de, 6);

    reg_bit!(u32, edrrr, rr, 0);

    reg_raw!(u32, rdlar);
    reg_raw!(u32, eesr);
    reg_raw!(u32, eesipr);
    reg_raw!(u32, tftr);
    reg_raw!(u32, fdr);

    reg_bit!(u32, rmcr, rnr, 0);

    #[cfg(test)]
    pub(crate) const fn test_block() -> Self {
        Self {
            edmr: VolatileCell::new(0),
            edtrr: VolatileCell::new(0),
            edrrr: VolatileCell::new(0),
            tdlar: VolatileCell::new(0),
            rdlar: VolatileCell::new(0),
            eesr: VolatileCell::new(0),
            eesipr: VolatileCell::new(0),
            rmfcr: VolatileCell::new(0),
            tftr: VolatileCell::new(0),
            fdr: VolatileCell::new(0),
            rmcr: VolatileCell::new(0),
        }
    }
}
