//! Key interrupt (KINT) register block.

use vcell::VolatileCell;

use super::{reg_bit, reg_raw};

/// Edge encoding of the KRCTL.KREG field.
pub const KREG_FALLING: bool = false;
/// Edge encoding of the KRCTL.KREG field.
pub const KREG_RISING: bool = true;

#[repr(C)]
pub struct RegisterBlock {
    /// Key return control register.
    krctl: VolatileCell<u8>,
    _reserved0: [u8; 3],
    /// Key return flag register. A flag clears when 0 is written to its bit
    /// position; writing 1 leaves the bit unchanged.
    krf: VolatileCell<u8>,
    _reserved1: [u8; 3],
    /// Key return mode register: one interrupt-enable bit per key line.
    krm: VolatileCell<u8>,
}

impl RegisterBlock {
    // KRCTL.KREG: detection edge. KRCTL.KRMD: key interrupt flag usage.
    reg_bit!(u8, krctl, kreg, 0);
    reg_bit!(u8, krctl, krmd, 1);

    reg_raw!(u8, krf);
    reg_raw!(u8, krm);

    /// Clears exactly the flag bits in `mask` by writing their positions as
    /// 0 and every other position as 1 (a written 1 is a hardware no-op, so
    /// a flag raised concurrently with the write is preserved).
    #[inline(always)]
    pub fn krf_clear(&self, mask: u8) {
        self.krf.set(!mask);
    }

    #[cfg(test)]
    pub(crate) const fn test_block() -> Self {
        Self {
            krctl: VolatileCell::new(0),
            _reserved0: [0; 3],
            krf: VolatileCell::new(0),
            _reserved1: [0; 3],
            krm: VolatileCell::new(0),
        }
    }
}
