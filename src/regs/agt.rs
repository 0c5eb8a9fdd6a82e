//! Low-power timer (AGT) register block, one instance per unit.
//!
//! The 16-bit counter counts down; input-capture measurements are computed
//! as `0xFFFF - counter` by the driver.

use vcell::VolatileCell;

use super::{reg_bit, reg_field, reg_raw};

/// AGTCR event flag: active measurement edge captured.
pub const FLAG_TEDGF: u8 = 1 << 4;
/// AGTCR event flag: counter underflow.
pub const FLAG_TUNDF: u8 = 1 << 5;
/// AGTCR event flag: compare match A.
pub const FLAG_TCMAF: u8 = 1 << 6;

const FLAG_MASK: u8 = FLAG_TEDGF | FLAG_TUNDF | FLAG_TCMAF;

/// AGTMR1.TMOD encoding: event (pulse) counting.
pub const TMOD_EVENT: u8 = 0b010;
/// AGTMR1.TMOD encoding: pulse width measurement.
pub const TMOD_PULSE_WIDTH: u8 = 0b011;
/// AGTMR1.TMOD encoding: pulse period measurement.
pub const TMOD_PERIOD: u8 = 0b100;

#[repr(C)]
pub struct RegisterBlock {
    /// Counter register.
    agt: VolatileCell<u16>,
    /// Compare match A register.
    agtcma: VolatileCell<u16>,
    /// Control register: TSTART, TCSTF (count status), TSTOP (force stop),
    /// event flags in bits 6:4.
    agtcr: VolatileCell<u8>,
    /// Mode register 1: TMOD, TEDGPL, TCK (count source).
    agtmr1: VolatileCell<u8>,
    /// Mode register 2: CKS divider.
    agtmr2: VolatileCell<u8>,
    /// I/O control: TEDGSEL, TIPF (input filter).
    agtioc: VolatileCell<u8>,
    /// Input pin select.
    agtiosel: VolatileCell<u8>,
    /// Compare match function select: TCMEA enable.
    agtcmsr: VolatileCell<u8>,
}

impl RegisterBlock {
    reg_raw!(u16, agt);
    reg_raw!(u16, agtcma);

    reg_bit!(u8, agtcr, tstart, 0);
    reg_bit!(u8, agtcr, tcstf, 1);

    /// Forces the counter to stop and resets the count status flag.
    pub fn agtcr_force_stop(&self) {
        let value = self.agtcr.get() & !0b11;
        self.agtcr.set(value | (1 << 2));
    }

    /// Pending event flags.
    pub fn flags(&self) -> u8 {
        self.agtcr.get() & FLAG_MASK
    }

    /// Clears the given event flags; the control bits are carried through
    /// unchanged.
    pub fn flags_clear(&self, mask: u8) {
        self.agtcr.set(self.agtcr.get() & !(mask & FLAG_MASK));
    }

    #[cfg(test)]
    pub(crate) fn test_raise_flags(&self, mask: u8) {
        self.agtcr.set(self.agtcr.get() | (mask & FLAG_MASK));
    }

    reg_field!(u8, agtmr1, tmod, 0, 0b111);
    reg_bit!(u8, agtmr1, tedgpl, 3);
    reg_field!(u8, agtmr1, tck, 4, 0b111);

    reg_field!(u8, agtmr2, cks, 0, 0b111);

    reg_bit!(u8, agtioc, tedgsel, 0);
    reg_field!(u8, agtioc, tipf, 4, 0b11);

    reg_field!(u8, agtiosel, sel, 0, 0b11);

    reg_bit!(u8, agtcmsr, tcmea, 0);

    #[cfg(test)]
    pub(crate) const fn test_block() -> Self {
        Self {
            agt: VolatileCell::new(0),
            agtcma: VolatileCell::new(0),
            agtcr: VolatileCell::new(0),
            agtmr1: VolatileCell::new(0),
            agtmr2: VolatileCell::new(0),
            agtioc: VolatileCell::new(0),
            agtiosel: VolatileCell::new(0),
            agtcmsr: VolatileCell::new(0),
        }
    }
}
