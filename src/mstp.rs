//! # Module-stop control
//!
//! Clock gating for the peripheral blocks. Out of reset every gated module
//! is stopped; `open` releases the gate before the first register access and
//! `close` re-engages it. The module-stop words are shared by every driver
//! in the crate, so each update is a critical-section read-modify-write.

use vcell::VolatileCell;

use crate::fmi::{Feature, IpId};

#[repr(C)]
pub(crate) struct RegisterBlock {
    mstpcrb: VolatileCell<u32>,
    mstpcrc: VolatileCell<u32>,
    mstpcrd: VolatileCell<u32>,
}

const WORD_B: usize = 0;
const WORD_C: usize = 1;
const WORD_D: usize = 2;

impl RegisterBlock {
    fn word(&self, index: usize) -> &VolatileCell<u32> {
        match index {
            WORD_B => &self.mstpcrb,
            WORD_C => &self.mstpcrc,
            _ => &self.mstpcrd,
        }
    }
}

/// Stop bit assignment for a feature, or `None` for modules in the
/// always-on domain (LVD).
fn stop_bit(feature: &Feature) -> Option<(usize, u32)> {
    match feature.id {
        IpId::Acmp => Some((WORD_D, 1 << 29)),
        IpId::Dac8 => Some((WORD_D, 1 << 20)),
        IpId::Kint => Some((WORD_C, 1 << 17)),
        IpId::Lvd => None,
        IpId::Agt => Some((WORD_D, 1 << (3 - feature.unit as u32))),
        IpId::Pdc => Some((WORD_C, 1 << 2)),
        IpId::Ptpedmac => Some((WORD_B, 1 << 13)),
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
fn regs() -> &'static RegisterBlock {
    const MSTP_BASE: usize = 0x4004_7000;
    unsafe { &*(MSTP_BASE as *const RegisterBlock) }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn regs() -> &'static RegisterBlock {
    struct SyncBlock(RegisterBlock);
    unsafe impl Sync for SyncBlock {}
    // Reset state: every gated module stopped.
    static FAKE: SyncBlock = SyncBlock(RegisterBlock {
        mstpcrb: VolatileCell::new(!0),
        mstpcrc: VolatileCell::new(!0),
        mstpcrd: VolatileCell::new(!0),
    });
    &FAKE.0
}

/// Releases the module-stop gate so the feature's registers are clocked.
pub(crate) fn module_start(feature: &Feature) {
    if let Some((word, bit)) = stop_bit(feature) {
        critical_section::with(|_| {
            let reg = regs().word(word);
            reg.set(reg.get() & !bit);
        });
    }
}

/// Re-engages the module-stop gate.
pub(crate) fn module_stop(feature: &Feature) {
    if let Some((word, bit)) = stop_bit(feature) {
        critical_section::with(|_| {
            let reg = regs().word(word);
            reg.set(reg.get() | bit);
        });
    }
}

#[cfg(test)]
pub(crate) fn is_running(feature: &Feature) -> bool {
    match stop_bit(feature) {
        Some((word, bit)) => regs().word(word).get() & bit == 0,
        None => true,
    }
}
