//! # Low-Voltage Detection (LVD)
//!
//! Two supply-voltage monitors with latched crossing detection. The monitor
//! control registers live in the write-protected system bank and are shared
//! between the monitors, so every update happens inside a critical section
//! bracketed by the protect-register unlock/lock sequence.
//!
//! Bind [`lvd_isr`] to both monitor slots of the vector table.

use core::cell::Cell;
use core::ptr;

use critical_section::Mutex;

use crate::fmi::{self, Feature, IpId, Signal};
use crate::icu::{self, Irq};
use crate::regs::lvd::{self, RegisterBlock};
use crate::{lock, Edge, Error, OpenState, Version};

const VERSION: Version = Version {
    api_major: 2,
    api_minor: 0,
    code_major: 2,
    code_minor: 1,
};

/// Driver version.
pub fn version() -> Version {
    VERSION
}

/// Monitor numbers accepted by [`LvdConfig::monitor`].
pub const FIRST_MONITOR: u8 = 1;
pub const LAST_MONITOR: u8 = 2;

/// Detection voltage threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LvdLevel {
    V1_90,
    V2_29,
    V2_51,
    V2_68,
    V2_85,
    V2_99,
}

fn level_encoding(level: LvdLevel) -> u8 {
    match level {
        LvdLevel::V1_90 => 0b0000,
        LvdLevel::V2_29 => 0b0001,
        LvdLevel::V2_51 => 0b0010,
        LvdLevel::V2_68 => 0b0011,
        LvdLevel::V2_85 => 0b0100,
        LvdLevel::V2_99 => 0b0101,
    }
}

/// Digital filter sampling clock, or no filtering at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleClock {
    FilterOff,
    LocoDiv2,
    LocoDiv4,
    LocoDiv8,
    LocoDiv16,
}

/// Hardware response to a threshold crossing.
///
/// Only the maskable interrupt response is handled by this layer; NMI and
/// reset responses are wired by the board support and rejected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectionResponse {
    Interrupt,
    Nmi,
    Reset,
}

/// When the detection output releases after the supply recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NegationDelay {
    FromDetection,
    FromReset,
}

/// Live comparison result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LvdState {
    AboveThreshold,
    BelowThreshold,
}

/// Monitor status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LvdStatus {
    /// A threshold crossing has been latched since the last clear.
    pub crossing_detected: bool,
    pub current_state: LvdState,
}

/// Data passed to the user callback on a monitor event.
pub struct LvdCallbackArgs {
    pub monitor: u8,
    pub status: LvdStatus,
    pub context: *const (),
}

/// Callback invoked in interrupt context.
pub type LvdCallback = fn(&LvdCallbackArgs);

/// Voltage monitor configuration.
#[derive(Clone, Copy)]
pub struct LvdConfig {
    /// Monitor number, [`FIRST_MONITOR`]..=[`LAST_MONITOR`].
    pub monitor: u8,
    pub level: LvdLevel,
    pub sample_clock: SampleClock,
    pub response: DetectionResponse,
    /// Which supply slope latches the detection flag.
    pub slope: Edge,
    pub negation_delay: NegationDelay,
    pub monitor_ipl: u8,
    pub callback: Option<LvdCallback>,
    pub context: *const (),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LvdVariant {
    digital_filter: bool,
}

impl LvdVariant {
    pub(crate) fn decode(variant: u16) -> Self {
        Self {
            digital_filter: variant & 1 != 0,
        }
    }
}

#[derive(Clone, Copy)]
struct IsrContext {
    regs: *const RegisterBlock,
    monitor: u8,
    callback: Option<LvdCallback>,
    context: *const (),
}

unsafe impl Send for IsrContext {}

type DispatchSlot = Mutex<Cell<Option<IsrContext>>>;

const EMPTY_SLOT: DispatchSlot = Mutex::new(Cell::new(None));
static DISPATCH: [DispatchSlot; 2] = [EMPTY_SLOT; 2];

/// # Voltage monitor control block
pub struct Lvd {
    regs: *const RegisterBlock,
    monitor: u8,
    irq: Option<Irq>,
    state: OpenState,
}

impl Lvd {
    /// Creates a closed control block.
    pub const fn new() -> Self {
        Self {
            regs: ptr::null(),
            monitor: FIRST_MONITOR,
            irq: None,
            state: OpenState::Closed,
        }
    }

    fn feature(monitor: u8) -> Feature {
        Feature::new(IpId::Lvd, 0, monitor - FIRST_MONITOR)
    }

    fn index(&self) -> u8 {
        self.monitor - FIRST_MONITOR
    }

    #[inline(always)]
    fn regs(&self) -> &RegisterBlock {
        unsafe { &*self.regs }
    }

    fn require_open(&self) -> Result<(), Error> {
        match self.state {
            OpenState::Open => Ok(()),
            OpenState::Closed => Err(Error::NotOpen),
        }
    }

    /// Configures and enables one voltage monitor.
    pub fn open(&mut self, cfg: &LvdConfig) -> Result<(), Error> {
        if !(FIRST_MONITOR..=LAST_MONITOR).contains(&cfg.monitor) {
            return Err(Error::InvalidArgument);
        }
        let feature = Self::feature(cfg.monitor);
        let info = fmi::product_feature_get(&feature)?;
        let irq = fmi::event_info_get(&feature, Signal::LvdMonitor);
        self.open_with(
            info.base as *const RegisterBlock,
            irq,
            LvdVariant::decode(info.variant),
            cfg,
        )
    }

    pub(crate) fn open_with(
        &mut self,
        regs: *const RegisterBlock,
        irq: Option<Irq>,
        variant: LvdVariant,
        cfg: &LvdConfig,
    ) -> Result<(), Error> {
        if self.state == OpenState::Open {
            return Err(Error::InUse);
        }
        if !(FIRST_MONITOR..=LAST_MONITOR).contains(&cfg.monitor) {
            return Err(Error::InvalidArgument);
        }
        if cfg.response != DetectionResponse::Interrupt {
            return Err(Error::Unsupported);
        }
        if cfg.sample_clock != SampleClock::FilterOff {
            if !variant.digital_filter {
                return Err(Error::Unsupported);
            }
            // The filter and the from-reset negation delay cannot be
            // combined.
            if cfg.negation_delay == NegationDelay::FromReset {
                return Err(Error::InvalidArgument);
            }
        }
        let irq = match irq {
            Some(irq) => irq,
            None => return Err(Error::IrqNotAvailable),
        };

        let feature = Self::feature(cfg.monitor);
        lock::acquire(&feature)?;

        self.regs = regs;
        self.monitor = cfg.monitor;
        let index = self.index();

        icu::irq_disable(irq);
        icu::irq_set_priority(irq, cfg.monitor_ipl);
        critical_section::with(|cs| {
            DISPATCH[index as usize].borrow(cs).set(Some(IsrContext {
                regs,
                monitor: cfg.monitor,
                callback: cfg.callback,
                context: cfg.context,
            }));
        });
        icu::context_set(
            irq,
            &DISPATCH[index as usize] as *const DispatchSlot as *const (),
        );

        critical_section::with(|_| {
            let regs = self.regs();
            regs.prcr_unlock();

            regs.lvdlvlr_lvl_set(index, level_encoding(cfg.level));
            regs.lvcmpcr_lvde_set(index, true);

            match cfg.sample_clock {
                SampleClock::FilterOff => regs.lvdcr0_dfdis_set(index, true),
                clock => {
                    regs.lvdcr0_dfdis_set(index, false);
                    regs.lvdcr0_fsamp_set(
                        index,
                        match clock {
                            SampleClock::LocoDiv2 => 0b00,
                            SampleClock::LocoDiv4 => 0b01,
                            SampleClock::LocoDiv8 => 0b10,
                            _ => 0b11,
                        },
                    );
                }
            }

            regs.lvdcr1_idtsel_set(
                index,
                match cfg.slope {
                    Edge::Falling => lvd::IDTSEL_FALLING,
                    Edge::Rising => lvd::IDTSEL_RISING,
                    Edge::BothEdges => lvd::IDTSEL_BOTH,
                },
            );
            regs.lvdcr1_irqsel_set(index, true);

            regs.lvdcr0_rn_set(index, cfg.negation_delay == NegationDelay::FromReset);

            regs.lvdsr_det_clear(index);
            regs.lvdcr0_rie_set(index, true);
            regs.lvdcr0_cmpe_set(index, true);

            regs.prcr_lock();
        });

        icu::irq_status_clear(irq);
        icu::irq_clear_pending(irq);
        icu::irq_enable(irq);

        self.irq = Some(irq);
        self.state = OpenState::Open;
        Ok(())
    }

    /// Latched and live state of the monitor.
    pub fn status_get(&self) -> Result<LvdStatus, Error> {
        self.require_open()?;
        let index = self.index();
        let regs = self.regs();
        Ok(LvdStatus {
            crossing_detected: regs.lvdsr_det(index),
            current_state: if regs.lvdsr_mon(index) {
                LvdState::AboveThreshold
            } else {
                LvdState::BelowThreshold
            },
        })
    }

    /// Clears the latched crossing flag.
    pub fn status_clear(&mut self) -> Result<(), Error> {
        self.require_open()?;
        let index = self.index();
        critical_section::with(|_| {
            let regs = self.regs();
            regs.prcr_unlock();
            regs.lvdsr_det_clear(index);
            regs.prcr_lock();
        });
        Ok(())
    }

    /// Disables the monitor and releases the hardware resource.
    pub fn close(&mut self) -> Result<(), Error> {
        self.require_open()?;

        self.state = OpenState::Closed;
        let index = self.index();

        if let Some(irq) = self.irq {
            icu::irq_disable(irq);
            icu::context_clear(irq);
        }
        critical_section::with(|cs| DISPATCH[index as usize].borrow(cs).set(None));

        critical_section::with(|_| {
            let regs = self.regs();
            regs.prcr_unlock();
            regs.lvdcr0_cmpe_set(index, false);
            regs.lvdcr0_rie_set(index, false);
            regs.lvdsr_det_clear(index);
            regs.lvdcr0_dfdis_set(index, true);
            regs.lvcmpcr_lvde_set(index, false);
            regs.prcr_lock();
        });

        lock::release(&Self::feature(self.monitor));
        Ok(())
    }
}

/// Voltage monitor interrupt service routine, shared by both monitor
/// vectors.
pub fn lvd_isr() {
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
    let index = context.monitor - FIRST_MONITOR;

    if let Some(callback) = context.callback {
        callback(&LvdCallbackArgs {
            monitor: context.monitor,
            status: LvdStatus {
                crossing_detected: regs.lvdsr_det(index),
                current_state: if regs.lvdsr_mon(index) {
                    LvdState::AboveThreshold
                } else {
                    LvdState::BelowThreshold
                },
            },
            context: context.context,
        });
    }

    critical_section::with(|_| {
        regs.prcr_unlock();
        regs.lvdsr_det_clear(index);
        regs.prcr_lock();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icu::host;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const FULL: LvdVariant = LvdVariant {
        digital_filter: true,
    };
    const REDUCED: LvdVariant = LvdVariant {
        digital_filter: false,
    };

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static SAW_CROSSING: AtomicBool = AtomicBool::new(false);

    fn recording_callback(args: &LvdCallbackArgs) {
        CALLS.fetch_add(1, Ordering::SeqCst);
        SAW_CROSSING.store(args.status.crossing_detected, Ordering::SeqCst);
    }

    fn config(monitor: u8) -> LvdConfig {
        LvdConfig {
            monitor,
            level: LvdLevel::V2_85,
            sample_clock: SampleClock::FilterOff,
            response: DetectionResponse::Interrupt,
            slope: Edge::Falling,
            negation_delay: NegationDelay::FromDetection,
            monitor_ipl: 5,
            callback: Some(recording_callback),
            context: ptr::null(),
        }
    }

    fn irq_for(monitor: u8) -> Irq {
        Irq::new(29 + monitor)
    }

    #[test]
    fn open_enables_monitor_and_locks_protection() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut lvd = Lvd::new();
        lvd.open_with(&block, Some(irq_for(1)), FULL, &config(1))
            .unwrap();

        assert!(block.lvcmpcr_lvde(0));
        assert!(block.lvdcr0_cmpe(0));
        assert!(block.lvdcr0_rie(0));
        assert!(block.prcr_locked());
        assert!(host::is_enabled(irq_for(1)));

        lvd.close().unwrap();
    }

    #[test]
    fn status_reports_latched_and_live_state() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut lvd = Lvd::new();
        lvd.open_with(&block, Some(irq_for(2)), FULL, &config(2))
            .unwrap();

        block.test_raise(1, true, false);
        let status = lvd.status_get().unwrap();
        assert!(status.crossing_detected);
        assert_eq!(status.current_state, LvdState::BelowThreshold);

        lvd.status_clear().unwrap();
        let status = lvd.status_get().unwrap();
        assert!(!status.crossing_detected);
        assert!(block.prcr_locked());

        lvd.close().unwrap();
    }

    #[test]
    fn isr_reports_status_then_clears_the_latch() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut lvd = Lvd::new();
        lvd.open_with(&block, Some(irq_for(1)), FULL, &config(1))
            .unwrap();

        block.test_raise(0, true, true);
        CALLS.store(0, Ordering::SeqCst);
        host::set_current_irq(irq_for(1));
        lvd_isr();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(SAW_CROSSING.load(Ordering::SeqCst));
        assert!(!block.lvdsr_det(0), "latch cleared after the callback ran");

        lvd.close().unwrap();
    }

    #[test]
    fn variant_and_domain_validation() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut lvd = Lvd::new();

        let mut cfg = config(1);
        cfg.sample_clock = SampleClock::LocoDiv4;
        assert_eq!(
            lvd.open_with(&block, Some(irq_for(1)), REDUCED, &cfg)
                .unwrap_err(),
            Error::Unsupported
        );

        cfg.negation_delay = NegationDelay::FromReset;
        assert_eq!(
            lvd.open_with(&block, Some(irq_for(1)), FULL, &cfg)
                .unwrap_err(),
            Error::InvalidArgument
        );

        let mut cfg = config(1);
        cfg.response = DetectionResponse::Reset;
        assert_eq!(
            lvd.open_with(&block, Some(irq_for(1)), FULL, &cfg)
                .unwrap_err(),
            Error::Unsupported
        );

        let mut cfg = config(1);
        cfg.monitor = 3;
        assert_eq!(
            lvd.open_with(&block, Some(irq_for(1)), FULL, &cfg)
                .unwrap_err(),
            Error::InvalidArgument
        );

        assert_eq!(
            lvd.open_with(&block, None, FULL, &config(1)).unwrap_err(),
            Error::IrqNotAvailable
        );
    }

    #[test]
    fn operations_on_closed_block_fail_with_not_open() {
        let mut lvd = Lvd::new();
        assert_eq!(lvd.status_get().unwrap_err(), Error::NotOpen);
        assert_eq!(lvd.status_clear().unwrap_err(), Error::NotOpen);
        assert_eq!(lvd.close().unwrap_err(), Error::NotOpen);
    }

    #[test]
    fn close_disables_monitor_and_second_open_is_locked_out() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut first = Lvd::new();
        let mut second = Lvd::new();
        first
            .open_with(&block, Some(irq_for(1)), FULL, &config(1))
            .unwrap();

        assert_eq!(
            second
                .open_with(&block, Some(irq_for(1)), FULL, &config(1))
                .unwrap_err(),
            Error::InUse
        );

        first.close().unwrap();
        assert!(!block.lvcmpcr_lvde(0));
        assert!(!block.lvdcr0_cmpe(0));
        assert!(!host::is_enabled(irq_for(1)));
        assert!(block.prcr_locked());
    }
}
