//! # Hardware resource lock
//!
//! Process-wide mutual exclusion keyed by peripheral identity. A driver
//! acquires the slot for its (peripheral, unit, channel) at `open` and
//! releases it at `close`; a second `open` of the same slot fails with
//! [`Error::InUse`] before any register is touched.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::fmi::{Feature, IpId};
use crate::Error;

// One bit per lockable resource. The map is small enough for a single word:
// ACMP ch0-1, DAC8 ch0-2, KINT, LVD mon0-1, AGT unit0-1, PDC, PTPEDMAC.
static LOCKS: AtomicU32 = AtomicU32::new(0);

fn slot(feature: &Feature) -> u32 {
    match feature.id {
        IpId::Acmp => feature.channel as u32,
        IpId::Dac8 => 2 + feature.channel as u32,
        IpId::Kint => 5,
        IpId::Lvd => 6 + feature.channel as u32,
        IpId::Agt => 8 + feature.unit as u32,
        IpId::Pdc => 10,
        IpId::Ptpedmac => 11,
    }
}

/// Takes exclusive ownership of the resource, failing if it is already held.
pub(crate) fn acquire(feature: &Feature) -> Result<(), Error> {
    let bit = 1u32 << slot(feature);
    let mut current = LOCKS.load(Ordering::Relaxed);
    loop {
        if current & bit != 0 {
            return Err(Error::InUse);
        }
        match LOCKS.compare_exchange_weak(
            current,
            current | bit,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => return Ok(()),
            Err(observed) => current = observed,
        }
    }
}

/// Releases a resource previously acquired with [`acquire`].
pub(crate) fn release(feature: &Feature) {
    let bit = 1u32 << slot(feature);
    LOCKS.fetch_and(!bit, Ordering::Release);
}
