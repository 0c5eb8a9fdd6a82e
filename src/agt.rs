//! # Low-Power Timer (AGT) Input Capture
//!
//! Pulse width, pulse period, and pulse count measurement on the 16-bit
//! down-counter. Each channel owns two vectors: the measurement/overflow
//! interrupt and the compare-match interrupt used by pulse counting.
//!
//! Bind [`agt_overflow_isr`] to the AGT interrupt slots and
//! [`agt_capture_isr`] to the compare-match slots.

use core::cell::Cell;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use critical_section::Mutex;

use crate::fmi::{self, Feature, IpId, Signal, AGT_UNITS};
use crate::icu::{self, Irq};
use crate::regs::agt::{self, RegisterBlock};
use crate::{lock, mstp, Edge, Error, OpenState, Version};

const VERSION: Version = Version {
    api_major: 1,
    api_minor: 1,
    code_major: 1,
    code_minor: 4,
};

/// Driver version.
pub fn version() -> Version {
    VERSION
}

/// Terminal value the down-counter is reloaded with.
const MAX_COUNT: u16 = 0xFFFF;

/// Measurement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureMode {
    /// Measure the width of a single pulse.
    PulseWidth,
    /// Measure the time between two active edges.
    Period,
    /// Count pulses until the configured total is reached.
    PulseCount,
}

/// Whether measurements repeat or stop after the first result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Repetition {
    Periodic,
    OneShot,
}

/// Counter clock source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountSource {
    Pclkb,
    Loco,
    Subclock,
}

/// Input signal debounce filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalFilter {
    Off,
    Pclk8,
    Pclk32,
}

/// Which AGTIO pin the measured signal arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinSelect {
    AgtioA,
    AgtioB,
    AgtioC,
}

/// What a callback invocation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureEvent {
    /// A measurement completed; the counter value is valid.
    Measurement,
    /// The counter wrapped while measuring.
    Overflow,
}

/// Operating status reported by [`AgtCapture::info_get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureStatus {
    Idle,
    Capturing,
}

/// Snapshot returned by [`AgtCapture::last_capture_get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureResult {
    pub counter: u16,
    pub overflows: u32,
}

/// Data passed to the user callback.
pub struct CaptureCallbackArgs {
    pub channel: u8,
    pub event: CaptureEvent,
    pub counter: u16,
    pub overflows: u32,
    pub context: *const (),
}

/// Callback invoked in interrupt context.
pub type CaptureCallback = fn(&CaptureCallbackArgs);

/// Hardware-variant options of the measurement input.
#[derive(Debug, Clone, Copy)]
pub struct AgtCaptureExtend {
    pub count_source: CountSource,
    /// CKS divider exponent, 0..=7.
    pub clock_divider: u8,
    pub signal_filter: SignalFilter,
    pub pin_select: PinSelect,
    /// Pulse total for [`CaptureMode::PulseCount`]; must be nonzero.
    pub pulse_count_value: u16,
    /// Active edge polarity for pulse counting.
    pub count_edge: Edge,
}

/// Input capture configuration.
#[derive(Clone, Copy)]
pub struct AgtCaptureConfig {
    /// AGT unit to use.
    pub channel: u8,
    pub mode: CaptureMode,
    /// Active measurement edge.
    pub edge: Edge,
    pub repetition: Repetition,
    pub autostart: bool,
    pub overflow_ipl: u8,
    pub capture_ipl: u8,
    pub callback: Option<CaptureCallback>,
    pub context: *const (),
    pub extend: AgtCaptureExtend,
}

// Measurement state shared between the API and the ISRs, per unit.
struct SharedState {
    capture_count: AtomicU16,
    overflows: AtomicU32,
    first_edge: AtomicBool,
}

impl SharedState {
    const fn new() -> Self {
        Self {
            capture_count: AtomicU16::new(0),
            overflows: AtomicU32::new(0),
            first_edge: AtomicBool::new(true),
        }
    }
}

static SHARED: [SharedState; AGT_UNITS] = [SharedState::new(), SharedState::new()];

#[derive(Clone, Copy)]
struct IsrContext {
    regs: *const RegisterBlock,
    channel: u8,
    mode: CaptureMode,
    repetition: Repetition,
    capture_irq: Irq,
    callback: Option<CaptureCallback>,
    context: *const (),
}

unsafe impl Send for IsrContext {}

type DispatchSlot = Mutex<Cell<Option<IsrContext>>>;

const EMPTY_SLOT: DispatchSlot = Mutex::new(Cell::new(None));
static DISPATCH: [DispatchSlot; AGT_UNITS] = [EMPTY_SLOT; AGT_UNITS];

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod cgc {
    use super::CountSource;
    use vcell::VolatileCell;

    // Oscillator stop registers in the system block; bit 0 set means the
    // oscillator is stopped.
    const LOCOCR: usize = 0x4001_E038;
    const SOSCCR: usize = 0x4001_E480;

    pub fn count_source_active(source: CountSource) -> bool {
        let stopped = |addr: usize| unsafe {
            (*(addr as *const VolatileCell<u8>)).get() & 1 != 0
        };
        match source {
            CountSource::Pclkb => true,
            CountSource::Loco => !stopped(LOCOCR),
            CountSource::Subclock => !stopped(SOSCCR),
        }
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod cgc {
    use super::CountSource;
    use core::sync::atomic::{AtomicBool, Ordering};

    static LOCO_RUNNING: AtomicBool = AtomicBool::new(true);
    static SUBCLOCK_RUNNING: AtomicBool = AtomicBool::new(false);

    pub fn count_source_active(source: CountSource) -> bool {
        match source {
            CountSource::Pclkb => true,
            CountSource::Loco => LOCO_RUNNING.load(Ordering::SeqCst),
            CountSource::Subclock => SUBCLOCK_RUNNING.load(Ordering::SeqCst),
        }
    }

    #[cfg(test)]
    pub fn set_subclock_running(running: bool) {
        SUBCLOCK_RUNNING.store(running, Ordering::SeqCst);
    }
}

/// # Input capture control block
pub struct AgtCapture {
    regs: *const RegisterBlock,
    channel: u8,
    mode: CaptureMode,
    overflow_irq: Option<Irq>,
    capture_irq: Option<Irq>,
    state: OpenState,
}

impl AgtCapture {
    /// Creates a closed control block.
    pub const fn new() -> Self {
        Self {
            regs: ptr::null(),
            channel: 0,
            mode: CaptureMode::PulseWidth,
            overflow_irq: None,
            capture_irq: None,
            state: OpenState::Closed,
        }
    }

    fn feature(channel: u8) -> Feature {
        Feature::new(IpId::Agt, channel, 0)
    }

    #[inline(always)]
    fn regs(&self) -> &RegisterBlock {
        unsafe { &*self.regs }
    }

    fn shared(&self) -> &'static SharedState {
        &SHARED[self.channel as usize]
    }

    fn require_open(&self) -> Result<(), Error> {
        match self.state {
            OpenState::Open => Ok(()),
            OpenState::Closed => Err(Error::NotOpen),
        }
    }

    /// Configures an AGT channel for input capture.
    ///
    /// Reentrant for different channels, not for the same channel.
    pub fn open(&mut self, cfg: &AgtCaptureConfig) -> Result<(), Error> {
        let feature = Self::feature(cfg.channel);
        let info = fmi::product_feature_get(&feature)?;
        let overflow_irq = fmi::event_info_get(&feature, Signal::AgtInt);
        let capture_irq = fmi::event_info_get(&feature, Signal::AgtCompareA);
        self.open_with(
            info.base as *const RegisterBlock,
            overflow_irq,
            capture_irq,
            cfg,
        )
    }

    pub(crate) fn open_with(
        &mut self,
        regs: *const RegisterBlock,
        overflow_irq: Option<Irq>,
        capture_irq: Option<Irq>,
        cfg: &AgtCaptureConfig,
    ) -> Result<(), Error> {
        if self.state == OpenState::Open {
            return Err(Error::InUse);
        }
        if cfg.channel as usize >= AGT_UNITS {
            return Err(Error::ChannelNotPresent);
        }
        if cfg.extend.clock_divider > 7 {
            return Err(Error::InvalidArgument);
        }
        if cfg.mode == CaptureMode::PulseCount && cfg.extend.pulse_count_value == 0 {
            return Err(Error::InvalidArgument);
        }
        // Width and period measurement trigger on a single edge.
        if cfg.mode != CaptureMode::PulseCount && cfg.edge == Edge::BothEdges {
            return Err(Error::InvalidArgument);
        }
        if !cgc::count_source_active(cfg.extend.count_source) {
            return Err(Error::ClockInactive);
        }
        let (overflow_irq, capture_irq) = match (overflow_irq, capture_irq) {
            (Some(o), Some(c)) => (o, c),
            _ => return Err(Error::IrqNotAvailable),
        };

        let feature = Self::feature(cfg.channel);
        lock::acquire(&feature)?;

        self.regs = regs;
        self.channel = cfg.channel;
        self.mode = cfg.mode;

        icu::irq_set_priority(overflow_irq, cfg.overflow_ipl);
        icu::irq_set_priority(capture_irq, cfg.capture_ipl);

        let unit = cfg.channel as usize;
        critical_section::with(|cs| {
            DISPATCH[unit].borrow(cs).set(Some(IsrContext {
                regs,
                channel: cfg.channel,
                mode: cfg.mode,
                repetition: cfg.repetition,
                capture_irq,
                callback: cfg.callback,
                context: cfg.context,
            }));
        });
        let slot = &DISPATCH[unit] as *const DispatchSlot as *const ();
        icu::context_set(overflow_irq, slot);
        icu::context_set(capture_irq, slot);

        let shared = self.shared();
        shared.capture_count.store(0, Ordering::SeqCst);
        shared.overflows.store(0, Ordering::SeqCst);
        shared.first_edge.store(true, Ordering::SeqCst);

        self.hardware_initialize(cfg, &feature, overflow_irq, capture_irq);

        self.overflow_irq = Some(overflow_irq);
        self.capture_irq = Some(capture_irq);
        self.state = OpenState::Open;
        Ok(())
    }

    fn hardware_initialize(
        &self,
        cfg: &AgtCaptureConfig,
        feature: &Feature,
        overflow_irq: Irq,
        capture_irq: Irq,
    ) {
        mstp::module_start(feature);
        let regs = self.regs();

        regs.agtcr_tstart_set(false);

        regs.agtmr1_tck_set(match cfg.extend.count_source {
            CountSource::Pclkb => 0b000,
            CountSource::Loco => 0b100,
            CountSource::Subclock => 0b110,
        });
        regs.agtmr2_cks_set(cfg.extend.clock_divider);
        regs.agtioc_tipf_set(match cfg.extend.signal_filter {
            SignalFilter::Off => 0b00,
            SignalFilter::Pclk8 => 0b01,
            SignalFilter::Pclk32 => 0b11,
        });
        regs.agtiosel_sel_set(match cfg.extend.pin_select {
            PinSelect::AgtioA => 0b00,
            PinSelect::AgtioB => 0b01,
            PinSelect::AgtioC => 0b10,
        });

        regs.agt_write(MAX_COUNT);
        regs.flags_clear(agt::FLAG_TEDGF | agt::FLAG_TUNDF);

        match cfg.mode {
            CaptureMode::PulseWidth => {
                regs.agtmr1_tmod_set(agt::TMOD_PULSE_WIDTH);
                regs.agtioc_tedgsel_set(cfg.edge == Edge::Rising);
            }
            CaptureMode::Period => {
                regs.agtmr1_tmod_set(agt::TMOD_PERIOD);
                regs.agtioc_tedgsel_set(cfg.edge == Edge::Rising);
            }
            CaptureMode::PulseCount => {
                regs.agtmr1_tmod_set(agt::TMOD_EVENT);
                regs.agtcma_write(MAX_COUNT - (cfg.extend.pulse_count_value - 1));
                regs.agtcmsr_tcmea_set(true);
                regs.agtioc_tedgsel_set(cfg.extend.count_edge == Edge::Rising);
                regs.agtmr1_tedgpl_set(cfg.extend.count_edge == Edge::BothEdges);
            }
        }

        if cfg.autostart {
            regs.agtcr_tstart_set(true);
            for irq in [overflow_irq, capture_irq] {
                icu::irq_status_clear(irq);
                icu::irq_clear_pending(irq);
                icu::irq_enable(irq);
            }
        }
    }

    /// Reloads the counter and starts a measurement. Enabling while already
    /// running is a no-op success.
    pub fn enable(&mut self) -> Result<(), Error> {
        self.require_open()?;
        let regs = self.regs();

        regs.agt_write(MAX_COUNT);
        if self.mode == CaptureMode::Period {
            self.shared().first_edge.store(true, Ordering::SeqCst);
        }

        for irq in [self.overflow_irq, self.capture_irq].into_iter().flatten() {
            icu::irq_status_clear(irq);
            icu::irq_clear_pending(irq);
            icu::irq_enable(irq);
        }

        regs.agtcr_tstart_set(true);
        Ok(())
    }

    /// Stops the measurement and masks both vectors; the configuration is
    /// retained.
    pub fn disable(&mut self) -> Result<(), Error> {
        self.require_open()?;
        self.regs().agtcr_tstart_set(false);
        for irq in [self.capture_irq, self.overflow_irq].into_iter().flatten() {
            icu::irq_disable(irq);
        }
        Ok(())
    }

    /// Whether a measurement is currently running.
    pub fn info_get(&self) -> Result<CaptureStatus, Error> {
        self.require_open()?;
        Ok(if self.regs().agtcr_tcstf() {
            CaptureStatus::Capturing
        } else {
            CaptureStatus::Idle
        })
    }

    /// Last measurement result.
    ///
    /// Pulse counting reads the live counter because no callback fires per
    /// counted pulse.
    pub fn last_capture_get(&self) -> Result<CaptureResult, Error> {
        self.require_open()?;
        let shared = self.shared();
        let counter = if self.mode == CaptureMode::PulseCount {
            MAX_COUNT - self.regs().agt()
        } else {
            shared.capture_count.load(Ordering::SeqCst)
        };
        Ok(CaptureResult {
            counter,
            overflows: shared.overflows.load(Ordering::SeqCst),
        })
    }

    /// Stops the channel, disarms both vectors, and releases the hardware
    /// resource.
    pub fn close(&mut self) -> Result<(), Error> {
        self.require_open()?;

        self.state = OpenState::Closed;
        let regs = self.regs();

        for irq in [self.overflow_irq, self.capture_irq].into_iter().flatten() {
            icu::irq_disable(irq);
            icu::irq_status_clear(irq);
            icu::irq_clear_pending(irq);
            icu::context_clear(irq);
        }

        regs.agtcmsr_tcmea_set(false);
        regs.agtcr_tstart_set(false);
        regs.agtcr_force_stop();

        critical_section::with(|cs| {
            DISPATCH[self.channel as usize].borrow(cs).set(None)
        });

        let feature = Self::feature(self.channel);
        mstp::module_stop(&feature);
        lock::release(&feature);
        Ok(())
    }
}

fn invoke(context: &IsrContext, event: CaptureEvent) {
    if let Some(callback) = context.callback {
        let shared = &SHARED[context.channel as usize];
        callback(&CaptureCallbackArgs {
            channel: context.channel,
            event,
            counter: shared.capture_count.load(Ordering::SeqCst),
            overflows: shared.overflows.load(Ordering::SeqCst),
            context: context.context,
        });
    }
}

fn dispatch_context(irq: Irq) -> Option<IsrContext> {
    let slot = icu::context_get(irq) as *const DispatchSlot;
    if slot.is_null() {
        return None;
    }
    critical_section::with(|cs| unsafe { &*slot }.borrow(cs).get())
}

/// Compare-match interrupt service routine: a pulse count completed.
pub fn agt_capture_isr() {
    let irq = icu::current_irq();
    icu::irq_status_clear(irq);

    let Some(context) = dispatch_context(irq) else {
        return;
    };
    let regs = unsafe { &*context.regs };
    let shared = &SHARED[context.channel as usize];

    // The counted total is reached; stop further compare matches until the
    // application re-arms.
    if context.mode == CaptureMode::PulseCount {
        icu::irq_clear_pending(context.capture_irq);
        icu::irq_disable(context.capture_irq);
    }

    if regs.flags() & agt::FLAG_TCMAF != 0 {
        regs.flags_clear(agt::FLAG_TCMAF);
        shared
            .capture_count
            .store(MAX_COUNT - regs.agt(), Ordering::SeqCst);
    }

    invoke(&context, CaptureEvent::Measurement);
}

/// Measurement/overflow interrupt service routine.
pub fn agt_overflow_isr() {
    let irq = icu::current_irq();
    icu::irq_status_clear(irq);

    let Some(context) = dispatch_context(irq) else {
        return;
    };
    let regs = unsafe { &*context.regs };
    let shared = &SHARED[context.channel as usize];
    let first_edge = shared.first_edge.load(Ordering::SeqCst);

    // One-shot measurements mask themselves once the result is in.
    if context.repetition == Repetition::OneShot
        && (context.mode == CaptureMode::PulseWidth
            || (context.mode == CaptureMode::Period && !first_edge))
    {
        icu::irq_disable(irq);
    }

    let flags = regs.flags();
    let mut event = CaptureEvent::Measurement;

    if flags & agt::FLAG_TEDGF != 0 {
        regs.flags_clear(agt::FLAG_TEDGF);
        let count = regs.agt();

        // The first edge of a period measurement only starts the interval;
        // a result needs the second edge.
        if context.mode == CaptureMode::Period && first_edge {
            shared.first_edge.store(false, Ordering::SeqCst);
            shared.overflows.store(0, Ordering::SeqCst);
            return;
        }

        match context.mode {
            CaptureMode::PulseWidth => {
                shared
                    .capture_count
                    .store(MAX_COUNT - count, Ordering::SeqCst);
                regs.agt_write(MAX_COUNT);
            }
            CaptureMode::Period => {
                shared
                    .capture_count
                    .store((MAX_COUNT - count).wrapping_add(1), Ordering::SeqCst);
            }
            CaptureMode::PulseCount => {}
        }
    } else if flags & agt::FLAG_TUNDF != 0 {
        regs.flags_clear(agt::FLAG_TUNDF);
        shared.overflows.fetch_add(1, Ordering::SeqCst);
        event = CaptureEvent::Overflow;
    }

    invoke(&context, event);

    if flags & agt::FLAG_TEDGF != 0 {
        shared.overflows.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icu::host;
    use std::sync::atomic::{AtomicU16 as TestU16, AtomicUsize, Ordering as TestOrdering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static LAST_COUNTER: TestU16 = TestU16::new(0);
    static LAST_EVENT_OVERFLOW: AtomicBool = AtomicBool::new(false);

    fn recording_callback(args: &CaptureCallbackArgs) {
        CALLS.fetch_add(1, TestOrdering::SeqCst);
        LAST_COUNTER.store(args.counter, TestOrdering::SeqCst);
        LAST_EVENT_OVERFLOW.store(args.event == CaptureEvent::Overflow, TestOrdering::SeqCst);
    }

    fn extend() -> AgtCaptureExtend {
        AgtCaptureExtend {
            count_source: CountSource::Pclkb,
            clock_divider: 0,
            signal_filter: SignalFilter::Off,
            pin_select: PinSelect::AgtioA,
            pulse_count_value: 1,
            count_edge: Edge::Rising,
        }
    }

    fn config(channel: u8, mode: CaptureMode) -> AgtCaptureConfig {
        AgtCaptureConfig {
            channel,
            mode,
            edge: Edge::Rising,
            repetition: Repetition::Periodic,
            autostart: true,
            overflow_ipl: 6,
            capture_ipl: 6,
            callback: Some(recording_callback),
            context: ptr::null(),
            extend: extend(),
        }
    }

    fn irqs(channel: u8) -> (Irq, Irq) {
        (Irq::new(32 + channel * 2), Irq::new(33 + channel * 2))
    }

    #[test]
    fn inactive_count_source_is_rejected() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut capture = AgtCapture::new();
        let mut cfg = config(0, CaptureMode::PulseWidth);
        cfg.extend.count_source = CountSource::Subclock;
        cgc::set_subclock_running(false);
        let (o, c) = irqs(0);
        assert_eq!(
            capture.open_with(&block, Some(o), Some(c), &cfg).unwrap_err(),
            Error::ClockInactive
        );
    }

    #[test]
    fn pulse_width_measurement_reports_elapsed_ticks() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut capture = AgtCapture::new();
        let (o, c) = irqs(0);
        capture
            .open_with(&block, Some(o), Some(c), &config(0, CaptureMode::PulseWidth))
            .unwrap();

        // The pulse ended after 0xFF ticks of down-counting.
        block.agt_write(MAX_COUNT - 0xFF);
        block.test_raise_flags(agt::FLAG_TEDGF);
        CALLS.store(0, TestOrdering::SeqCst);
        host::set_current_irq(o);
        agt_overflow_isr();

        assert_eq!(CALLS.load(TestOrdering::SeqCst), 1);
        assert_eq!(LAST_COUNTER.load(TestOrdering::SeqCst), 0xFF);
        assert_eq!(block.agt(), MAX_COUNT, "counter reloaded for next pulse");
        assert_eq!(block.flags(), 0);
        assert_eq!(capture.last_capture_get().unwrap().counter, 0xFF);

        capture.close().unwrap();
    }

    #[test]
    fn period_measurement_discards_the_first_edge() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut capture = AgtCapture::new();
        let (o, c) = irqs(1);
        capture
            .open_with(&block, Some(o), Some(c), &config(1, CaptureMode::Period))
            .unwrap();

        CALLS.store(0, TestOrdering::SeqCst);
        host::set_current_irq(o);

        block.test_raise_flags(agt::FLAG_TEDGF);
        agt_overflow_isr();
        assert_eq!(CALLS.load(TestOrdering::SeqCst), 0, "first edge only arms");

        block.agt_write(MAX_COUNT - 0x0F);
        block.test_raise_flags(agt::FLAG_TEDGF);
        agt_overflow_isr();
        assert_eq!(CALLS.load(TestOrdering::SeqCst), 1);
        assert_eq!(LAST_COUNTER.load(TestOrdering::SeqCst), 0x10);

        capture.close().unwrap();
    }

    #[test]
    fn underflow_counts_as_overflow_event() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut capture = AgtCapture::new();
        let (o, c) = irqs(0);
        capture
            .open_with(&block, Some(o), Some(c), &config(0, CaptureMode::PulseWidth))
            .unwrap();

        block.test_raise_flags(agt::FLAG_TUNDF);
        CALLS.store(0, TestOrdering::SeqCst);
        host::set_current_irq(o);
        agt_overflow_isr();

        assert_eq!(CALLS.load(TestOrdering::SeqCst), 1);
        assert!(LAST_EVENT_OVERFLOW.load(TestOrdering::SeqCst));
        assert_eq!(capture.last_capture_get().unwrap().overflows, 1);

        capture.close().unwrap();
    }

    #[test]
    fn pulse_count_reads_the_live_counter() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut capture = AgtCapture::new();
        let mut cfg = config(0, CaptureMode::PulseCount);
        cfg.extend.pulse_count_value = 0x20;
        let (o, c) = irqs(0);
        capture.open_with(&block, Some(o), Some(c), &cfg).unwrap();

        assert_eq!(block.agtcma(), MAX_COUNT - 0x1F);
        assert!(block.agtcmsr_tcmea());

        block.agt_write(MAX_COUNT - 0x7);
        assert_eq!(capture.last_capture_get().unwrap().counter, 0x7);

        // Compare match fires when the total is reached.
        block.agt_write(MAX_COUNT - 0x20);
        block.test_raise_flags(agt::FLAG_TCMAF);
        CALLS.store(0, TestOrdering::SeqCst);
        host::set_current_irq(c);
        agt_capture_isr();
        assert_eq!(CALLS.load(TestOrdering::SeqCst), 1);
        assert!(!host::is_enabled(c), "pulse count masks its vector");

        capture.close().unwrap();
    }

    #[test]
    fn enable_disable_enable_is_idempotent() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut capture = AgtCapture::new();
        let (o, c) = irqs(1);
        let mut cfg = config(1, CaptureMode::PulseWidth);
        cfg.autostart = false;
        capture.open_with(&block, Some(o), Some(c), &cfg).unwrap();

        capture.enable().unwrap();
        let after_first = (
            block.agt(),
            block.agtcr_tstart(),
            host::is_enabled(o),
            host::is_enabled(c),
        );
        capture.disable().unwrap();
        assert!(!block.agtcr_tstart());
        assert!(!host::is_enabled(o));
        capture.enable().unwrap();
        let after_second = (
            block.agt(),
            block.agtcr_tstart(),
            host::is_enabled(o),
            host::is_enabled(c),
        );
        assert_eq!(after_first, after_second);

        capture.close().unwrap();
    }

    #[test]
    fn operations_on_closed_block_fail_with_not_open() {
        let mut capture = AgtCapture::new();
        assert_eq!(capture.enable().unwrap_err(), Error::NotOpen);
        assert_eq!(capture.disable().unwrap_err(), Error::NotOpen);
        assert_eq!(capture.info_get().unwrap_err(), Error::NotOpen);
        assert_eq!(capture.last_capture_get().unwrap_err(), Error::NotOpen);
        assert_eq!(capture.close().unwrap_err(), Error::NotOpen);
    }

    #[test]
    fn same_unit_is_locked_out_and_validation_rejects_bad_config() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut first = AgtCapture::new();
        let mut second = AgtCapture::new();
        let (o, c) = irqs(0);
        first
            .open_with(&block, Some(o), Some(c), &config(0, CaptureMode::PulseWidth))
            .unwrap();
        assert_eq!(
            second
                .open_with(&block, Some(o), Some(c), &config(0, CaptureMode::PulseWidth))
                .unwrap_err(),
            Error::InUse
        );
        first.close().unwrap();

        let mut cfg = config(0, CaptureMode::PulseCount);
        cfg.extend.pulse_count_value = 0;
        assert_eq!(
            second.open_with(&block, Some(o), Some(c), &cfg).unwrap_err(),
            Error::InvalidArgument
        );

        let mut cfg = config(0, CaptureMode::PulseWidth);
        cfg.channel = AGT_UNITS as u8;
        assert_eq!(
            second.open_with(&block, Some(o), Some(c), &cfg).unwrap_err(),
            Error::ChannelNotPresent
        );

        let mut cfg = config(0, CaptureMode::PulseWidth);
        cfg.extend.clock_divider = 8;
        assert_eq!(
            second.open_with(&block, Some(o), Some(c), &cfg).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn close_stops_counter_and_disarms_vectors() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut capture = AgtCapture::new();
        let (o, c) = irqs(0);
        capture
            .open_with(&block, Some(o), Some(c), &config(0, CaptureMode::PulseWidth))
            .unwrap();
        assert!(block.agtcr_tstart());

        capture.close().unwrap();
        assert!(!block.agtcr_tstart());
        assert!(!host::is_enabled(o));
        assert!(!host::is_enabled(c));
        assert!(icu::context_get(o).is_null());
        assert!(icu::context_get(c).is_null());
    }
}
