//! # Key Interrupt (KINT) Key-Matrix Controller
//!
//! Detects edges on up to eight key-return lines and funnels them into a
//! single interrupt vector. Because the hardware provides one vector for all
//! lines, exactly one callback registration exists at a time, owned by the
//! driver's dispatch slot; the channel mask delivered to the callback tells
//! the application which lines fired.
//!
//! Bind [`kint_isr`] to the KINT slot of the application vector table.

use core::cell::Cell;
use core::ptr;

use critical_section::Mutex;

use crate::fmi::{self, Feature, IpId, Signal};
use crate::icu::{self, Irq};
use crate::regs::kint::RegisterBlock;
use crate::{lock, mstp, Edge, Error, OpenState, Version};

const VERSION: Version = Version {
    api_major: 2,
    api_minor: 0,
    code_major: 1,
    code_minor: 8,
};

/// Driver version.
pub fn version() -> Version {
    VERSION
}

/// Data passed to the user callback on every key interrupt.
pub struct KeyMatrixCallbackArgs {
    /// Mask of the key-return lines serviced by this invocation.
    pub channels: u8,
    /// Opaque pointer registered at open.
    pub context: *const (),
}

/// Callback invoked in interrupt context; must be fast and reentrant-safe.
pub type KeyMatrixCallback = fn(&KeyMatrixCallbackArgs);

/// Key-matrix configuration.
#[derive(Clone, Copy)]
pub struct KeyMatrixConfig {
    /// Mask of key-return lines to monitor; must be nonzero and within the
    /// line count of the detected part.
    pub channels: u8,
    /// Detection edge. [`Edge::BothEdges`] is not supported by this
    /// peripheral.
    pub trigger: Edge,
    /// Begin monitoring immediately instead of waiting for
    /// [`KeyMatrix::enable`].
    pub autostart: bool,
    /// NVIC priority level for the shared vector.
    pub irq_priority: u8,
    pub callback: KeyMatrixCallback,
    pub context: *const (),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct KintVariant {
    lines: u8,
}

impl KintVariant {
    pub(crate) fn decode(variant: u16) -> Self {
        Self {
            lines: (variant & 0xF) as u8,
        }
    }
}

#[derive(Clone, Copy)]
struct IsrContext {
    regs: *const RegisterBlock,
    callback: KeyMatrixCallback,
    context: *const (),
}

// The pointers reference the memory-mapped register block and the caller's
// context; both must remain valid while the driver is open.
unsafe impl Send for IsrContext {}

type DispatchSlot = Mutex<Cell<Option<IsrContext>>>;

// Single process-wide dispatch record: the hardware has one vector for all
// key-return lines.
static DISPATCH: DispatchSlot = Mutex::new(Cell::new(None));

/// # Key-matrix control block
///
/// ## Example
/// ```no_run
/// use vk55xx_hal::kint::{KeyMatrix, KeyMatrixConfig, KeyMatrixCallbackArgs};
/// use vk55xx_hal::Edge;
///
/// fn on_key(args: &KeyMatrixCallbackArgs) {
///     let _pressed = args.channels;
/// }
///
/// let mut keys = KeyMatrix::new();
/// keys.open(&KeyMatrixConfig {
///     channels: 0b0011_1111,
///     trigger: Edge::Falling,
///     autostart: true,
///     irq_priority: 3,
///     callback: on_key,
///     context: core::ptr::null(),
/// })?;
/// # Ok::<(), vk55xx_hal::Error>(())
/// ```
pub struct KeyMatrix {
    regs: *const RegisterBlock,
    channels: u8,
    irq: Option<Irq>,
    state: OpenState,
}

impl KeyMatrix {
    /// Creates a closed control block.
    pub const fn new() -> Self {
        Self {
            regs: ptr::null(),
            channels: 0,
            irq: None,
            state: OpenState::Closed,
        }
    }

    fn feature() -> Feature {
        Feature::new(IpId::Kint, 0, 0)
    }

    #[inline(always)]
    fn regs(&self) -> &RegisterBlock {
        unsafe { &*self.regs }
    }

    fn require_open(&self) -> Result<Irq, Error> {
        match self.state {
            OpenState::Open => Ok(self.irq.unwrap_or(Irq::new(0))),
            OpenState::Closed => Err(Error::NotOpen),
        }
    }

    /// Configures all monitored key-return lines and arms the dispatch slot.
    ///
    /// To change the callback or context the driver must be closed and
    /// reopened; [`KeyMatrix::enable`] only re-arms the lines selected here.
    pub fn open(&mut self, cfg: &KeyMatrixConfig) -> Result<(), Error> {
        let feature = Self::feature();
        let info = fmi::product_feature_get(&feature)?;
        let irq = fmi::event_info_get(&feature, Signal::KintInt).ok_or(Error::IrqNotAvailable)?;
        self.open_with(
            info.base as *const RegisterBlock,
            irq,
            KintVariant::decode(info.variant),
            cfg,
        )
    }

    pub(crate) fn open_with(
        &mut self,
        regs: *const RegisterBlock,
        irq: Irq,
        variant: KintVariant,
        cfg: &KeyMatrixConfig,
    ) -> Result<(), Error> {
        if self.state == OpenState::Open {
            return Err(Error::InUse);
        }
        if cfg.channels == 0 {
            return Err(Error::InvalidArgument);
        }
        if cfg.trigger == Edge::BothEdges {
            return Err(Error::InvalidArgument);
        }
        let valid_mask: u8 = if variant.lines >= 8 {
            0xFF
        } else {
            (1 << variant.lines) - 1
        };
        if cfg.channels & !valid_mask != 0 {
            return Err(Error::ChannelNotPresent);
        }

        let feature = Self::feature();
        lock::acquire(&feature)?;
        mstp::module_start(&feature);

        self.regs = regs;

        icu::irq_disable(irq);
        icu::irq_set_priority(irq, cfg.irq_priority);

        // Disable line interrupts, then drop any stale flags and the stale
        // line-level request before reprogramming.
        self.regs().krm_write(0);
        self.regs().krf_write(0);
        icu::irq_status_clear(irq);
        icu::irq_clear_pending(irq);

        self.regs().krctl_kreg_set(cfg.trigger == Edge::Rising);
        self.regs().krctl_krmd_set(true);

        critical_section::with(|cs| {
            DISPATCH.borrow(cs).set(Some(IsrContext {
                regs,
                callback: cfg.callback,
                context: cfg.context,
            }));
        });
        icu::context_set(irq, &DISPATCH as *const DispatchSlot as *const ());

        if cfg.autostart {
            self.regs().krm_write(cfg.channels);
            icu::irq_enable(irq);
        }

        self.channels = cfg.channels;
        self.irq = Some(irq);
        self.state = OpenState::Open;
        Ok(())
    }

    /// Re-arms interrupts for the lines selected at open, clearing stale
    /// flags first. Enabling an already enabled driver is a no-op success.
    pub fn enable(&mut self) -> Result<(), Error> {
        let irq = self.require_open()?;
        self.regs().krf_write(0);
        icu::irq_status_clear(irq);
        self.regs().krm_write(self.channels);
        icu::irq_enable(irq);
        Ok(())
    }

    /// Disarms all line interrupts without forgetting the configuration.
    pub fn disable(&mut self) -> Result<(), Error> {
        let irq = self.require_open()?;
        self.regs().krm_write(0);
        self.regs().krf_write(0);
        icu::irq_disable(irq);
        Ok(())
    }

    /// Changes the detection edge for all monitored lines.
    ///
    /// Permitted while enabled, but the new sense applies to the next edge,
    /// not retroactively; disable first if that matters.
    pub fn trigger_set(&mut self, trigger: Edge) -> Result<(), Error> {
        self.require_open()?;
        if trigger == Edge::BothEdges {
            return Err(Error::InvalidArgument);
        }
        self.regs().krctl_kreg_set(trigger == Edge::Rising);
        self.regs().krctl_krmd_set(true);
        Ok(())
    }

    /// Disables the peripheral, clears the dispatch slot, and releases the
    /// hardware resource.
    pub fn close(&mut self) -> Result<(), Error> {
        let irq = self.require_open()?;

        self.state = OpenState::Closed;

        icu::irq_disable(irq);
        self.regs().krm_write(0);
        self.regs().krf_write(0);
        icu::irq_status_clear(irq);

        icu::context_clear(irq);
        critical_section::with(|cs| DISPATCH.borrow(cs).set(None));

        let feature = Self::feature();
        mstp::module_stop(&feature);
        lock::release(&feature);
        Ok(())
    }
}

/// Key interrupt service routine.
///
/// Clears the line-level request, reads the key return flags, clears exactly
/// the flags it observed (a written 1 is a hardware no-op, so a line that
/// fires between the read and the write keeps its flag and re-raises the
/// interrupt), and invokes the registered callback with the serviced mask.
pub fn kint_isr() {
    let irq = icu::current_irq();
    icu::irq_status_clear(irq);

    let slot = icu::context_get(irq) as *const DispatchSlot;
    if slot.is_null() {
        return;
    }
    let context = critical_section::with(|cs| unsafe { &*slot }.borrow(cs).get());
    let Some(context) = context else {
        return;
    };

    let regs = unsafe { &*context.regs };
    let status = regs.krf();
    regs.krf_clear(status);

    // A zero status is possible when the flags of this request were already
    // serviced by a previous invocation; there is nothing to report then.
    if status != 0 {
        (context.callback)(&KeyMatrixCallbackArgs {
            channels: status,
            context: context.context,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icu::host;
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

    const FULL: KintVariant = KintVariant { lines: 8 };
    const REDUCED: KintVariant = KintVariant { lines: 6 };
    const IRQ: Irq = Irq::new(28);

    static LAST_MASK: AtomicU8 = AtomicU8::new(0);
    static LAST_CONTEXT: AtomicUsize = AtomicUsize::new(0);
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn recording_callback(args: &KeyMatrixCallbackArgs) {
        LAST_MASK.store(args.channels, Ordering::SeqCst);
        LAST_CONTEXT.store(args.context as usize, Ordering::SeqCst);
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    fn config(channels: u8, trigger: Edge) -> KeyMatrixConfig {
        KeyMatrixConfig {
            channels,
            trigger,
            autostart: false,
            irq_priority: 2,
            callback: recording_callback,
            context: ptr::null(),
        }
    }

    #[test]
    fn open_validates_channel_mask_and_trigger() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut keys = KeyMatrix::new();

        assert_eq!(
            keys.open_with(&block, IRQ, FULL, &config(0, Edge::Falling))
                .unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(
            keys.open_with(&block, IRQ, FULL, &config(0x01, Edge::BothEdges))
                .unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(
            keys.open_with(&block, IRQ, REDUCED, &config(0xC0, Edge::Falling))
                .unwrap_err(),
            Error::ChannelNotPresent
        );
    }

    #[test]
    fn trigger_edge_encodings_are_observable() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut keys = KeyMatrix::new();
        keys.open_with(&block, IRQ, FULL, &config(0x0F, Edge::Falling))
            .unwrap();

        assert_eq!(block.krctl_kreg(), crate::regs::kint::KREG_FALLING);

        keys.trigger_set(Edge::Rising).unwrap();
        assert_eq!(block.krctl_kreg(), crate::regs::kint::KREG_RISING);

        keys.trigger_set(Edge::Falling).unwrap();
        assert_eq!(block.krctl_kreg(), crate::regs::kint::KREG_FALLING);

        // Invalid edge leaves the register untouched.
        assert_eq!(
            keys.trigger_set(Edge::BothEdges).unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(block.krctl_kreg(), crate::regs::kint::KREG_FALLING);

        keys.close().unwrap();
    }

    #[test]
    fn isr_services_exactly_the_observed_flags() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut keys = KeyMatrix::new();
        let mut cfg = config(0xFF, Edge::Falling);
        cfg.autostart = true;
        cfg.context = &CALLS as *const _ as *const ();
        keys.open_with(&block, IRQ, FULL, &cfg).unwrap();

        let fired = (1 << 2) | (1 << 5);
        block.krf_write(fired);
        CALLS.store(0, Ordering::SeqCst);
        host::set_current_irq(IRQ);
        kint_isr();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_MASK.load(Ordering::SeqCst), fired);
        assert_eq!(
            LAST_CONTEXT.load(Ordering::SeqCst),
            &CALLS as *const _ as usize
        );

        // The ISR wrote the complement of the serviced mask: zeros exactly
        // at the serviced bits, ones everywhere else.
        let written = block.krf();
        assert_eq!(written, !fired);

        // Hardware clears a flag on written-0 and ignores written-1, so a
        // line that fired after the status read (bit 6 here) survives the
        // clear and re-raises the interrupt.
        let raced = fired | (1 << 6);
        let after_hardware_clear = raced & written;
        assert_eq!(after_hardware_clear, 1 << 6);

        keys.close().unwrap();
    }

    #[test]
    fn isr_with_no_flags_invokes_nothing() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut cfg = config(0xFF, Edge::Falling);
        cfg.autostart = true;
        let mut keys = KeyMatrix::new();
        keys.open_with(&block, IRQ, FULL, &cfg).unwrap();

        CALLS.store(0, Ordering::SeqCst);
        host::set_current_irq(IRQ);
        kint_isr();
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        keys.close().unwrap();
    }

    #[test]
    fn enable_disable_enable_is_idempotent() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut keys = KeyMatrix::new();
        keys.open_with(&block, IRQ, FULL, &config(0x33, Edge::Falling))
            .unwrap();

        keys.enable().unwrap();
        let after_first = (block.krm(), block.krctl_kreg(), host::is_enabled(IRQ));
        keys.disable().unwrap();
        assert_eq!(block.krm(), 0);
        assert!(!host::is_enabled(IRQ));
        keys.enable().unwrap();
        let after_second = (block.krm(), block.krctl_kreg(), host::is_enabled(IRQ));
        assert_eq!(after_first, after_second);

        keys.close().unwrap();
    }

    #[test]
    fn operations_on_closed_block_fail_with_not_open() {
        let mut keys = KeyMatrix::new();
        assert_eq!(keys.enable().unwrap_err(), Error::NotOpen);
        assert_eq!(keys.disable().unwrap_err(), Error::NotOpen);
        assert_eq!(keys.trigger_set(Edge::Rising).unwrap_err(), Error::NotOpen);
        assert_eq!(keys.close().unwrap_err(), Error::NotOpen);
    }

    #[test]
    fn second_open_is_locked_out_and_close_releases() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut first = KeyMatrix::new();
        let mut second = KeyMatrix::new();
        first
            .open_with(&block, IRQ, FULL, &config(0x0F, Edge::Falling))
            .unwrap();

        assert_eq!(
            second
                .open_with(&block, IRQ, FULL, &config(0x0F, Edge::Falling))
                .unwrap_err(),
            Error::InUse
        );

        first.close().unwrap();
        assert!(!host::is_enabled(IRQ));
        assert!(icu::context_get(IRQ).is_null());

        // The resource is free again after close.
        second
            .open_with(&block, IRQ, FULL, &config(0x0F, Edge::Falling))
            .unwrap();
        second.close().unwrap();
    }

    #[test]
    fn close_disables_lines_regardless_of_enabled_state() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut cfg = config(0xFF, Edge::Rising);
        cfg.autostart = true;
        let mut keys = KeyMatrix::new();
        keys.open_with(&block, IRQ, FULL, &cfg).unwrap();
        assert_eq!(block.krm(), 0xFF);
        assert!(host::is_enabled(IRQ));

        keys.close().unwrap();
        assert_eq!(block.krm(), 0);
        assert!(!host::is_enabled(IRQ));
    }
}
