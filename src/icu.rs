//! # Interrupt Control Unit (ICU) plumbing
//!
//! Two services live here: a thin facade over the NVIC and the ICU's
//! line-level pending flags, and the vector-to-context dispatch table that
//! ISR free functions use to find the driver instance that owns the
//! currently active interrupt.
//!
//! On a host build (tests) the facade records its operations instead of
//! touching hardware, so lifecycle tests can assert masking behavior.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// Number of event slots in the vector table.
pub const VECTOR_COUNT: usize = 96;

/// An interrupt number resolved through the feature registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Irq(u8);

impl Irq {
    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    pub const fn number(self) -> u8 {
        self.0
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
unsafe impl cortex_m::interrupt::InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0 as u16
    }
}

// Dispatch table: one type-erased context pointer per vector. Drivers store
// a pointer to a module-owned static dispatch record, never a pointer into
// the caller's control block, so control blocks stay movable.
const NO_CONTEXT: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());
static CONTEXTS: [AtomicPtr<()>; VECTOR_COUNT] = [NO_CONTEXT; VECTOR_COUNT];

pub(crate) fn context_set(irq: Irq, context: *const ()) {
    CONTEXTS[irq.number() as usize].store(context as *mut (), Ordering::Release);
}

pub(crate) fn context_get(irq: Irq) -> *const () {
    CONTEXTS[irq.number() as usize].load(Ordering::Acquire)
}

pub(crate) fn context_clear(irq: Irq) {
    CONTEXTS[irq.number() as usize].store(ptr::null_mut(), Ordering::Release);
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod imp {
    use super::Irq;
    use vcell::VolatileCell;

    const ICU_BASE: usize = 0x4000_6300;
    const IELSR_IR: u32 = 1 << 16;

    #[repr(C)]
    struct IcuRegisterBlock {
        ielsr: [VolatileCell<u32>; super::VECTOR_COUNT],
    }

    fn icu() -> &'static IcuRegisterBlock {
        unsafe { &*(ICU_BASE as *const IcuRegisterBlock) }
    }

    pub fn irq_enable(irq: Irq) {
        unsafe { cortex_m::peripheral::NVIC::unmask(irq) }
    }

    pub fn irq_disable(irq: Irq) {
        cortex_m::peripheral::NVIC::mask(irq);
    }

    pub fn irq_clear_pending(irq: Irq) {
        cortex_m::peripheral::NVIC::unpend(irq);
    }

    pub fn irq_set_priority(irq: Irq, ipl: u8) {
        // Four priority bits are implemented, left-justified in the byte.
        unsafe {
            (*cortex_m::peripheral::NVIC::PTR).ipr[irq.number() as usize].write(ipl << 4);
        }
    }

    pub fn irq_status_clear(irq: Irq) {
        let slot = &icu().ielsr[irq.number() as usize];
        slot.set(slot.get() & !IELSR_IR);
    }

    pub fn current_irq() -> Irq {
        let icsr = unsafe { (*cortex_m::peripheral::SCB::PTR).icsr.read() };
        Irq::new(((icsr & 0x1FF) as u16 as u8).wrapping_sub(16))
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod imp {
    use super::{Irq, VECTOR_COUNT};
    use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

    const ZERO: AtomicU8 = AtomicU8::new(0);
    static ENABLED: [AtomicU8; VECTOR_COUNT] = [ZERO; VECTOR_COUNT];
    static PRIORITY: [AtomicU8; VECTOR_COUNT] = [ZERO; VECTOR_COUNT];
    static STATUS_CLEARS: [AtomicU8; VECTOR_COUNT] = [ZERO; VECTOR_COUNT];
    static CURRENT: AtomicU32 = AtomicU32::new(0);

    pub fn irq_enable(irq: Irq) {
        ENABLED[irq.number() as usize].store(1, Ordering::SeqCst);
    }

    pub fn irq_disable(irq: Irq) {
        ENABLED[irq.number() as usize].store(0, Ordering::SeqCst);
    }

    pub fn irq_clear_pending(_irq: Irq) {}

    pub fn irq_set_priority(irq: Irq, ipl: u8) {
        PRIORITY[irq.number() as usize].store(ipl, Ordering::SeqCst);
    }

    pub fn irq_status_clear(irq: Irq) {
        STATUS_CLEARS[irq.number() as usize].fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_irq() -> Irq {
        Irq::new(CURRENT.load(Ordering::SeqCst) as u8)
    }

    /// Host-only hooks for lifecycle tests.
    #[allow(dead_code)]
    pub mod host {
        use super::*;

        pub fn set_current_irq(irq: Irq) {
            CURRENT.store(irq.number() as u32, Ordering::SeqCst);
        }

        pub fn is_enabled(irq: Irq) -> bool {
            ENABLED[irq.number() as usize].load(Ordering::SeqCst) != 0
        }

        pub fn priority(irq: Irq) -> u8 {
            PRIORITY[irq.number() as usize].load(Ordering::SeqCst)
        }

        pub fn status_clear_count(irq: Irq) -> u8 {
            STATUS_CLEARS[irq.number() as usize].load(Ordering::SeqCst)
        }
    }
}

pub(crate) use imp::{irq_clear_pending, irq_disable, irq_enable, irq_set_priority, irq_status_clear};

/// The interrupt number currently being serviced.
///
/// Only meaningful when called from within an ISR.
pub use imp::current_irq;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub(crate) use imp::host;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_slot_round_trip() {
        let _hw = crate::test_support::hw_guard();
        let irq = Irq::new(90);
        let value = 0xABu8;
        context_set(irq, &value as *const u8 as *const ());
        assert_eq!(context_get(irq), &value as *const u8 as *const ());
        context_clear(irq);
        assert!(context_get(irq).is_null());
    }
}
