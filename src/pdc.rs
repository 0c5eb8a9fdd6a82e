//! # Parallel Data Capture (PDC)
//!
//! Frame capture from a parallel camera interface. The PDC itself only fills
//! a small FIFO; an external transfer engine drains the data register into
//! the frame buffer. That engine is abstracted behind [`CaptureTransfer`] so
//! the driver works with a DTC, a DMAC channel, or a test double alike.
//!
//! Bind [`pdc_frame_end_isr`] to the frame-end slot and [`pdc_int_isr`] to
//! the error slot of the vector table.

use core::cell::Cell;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::fmi::{self, Feature, IpId, Signal};
use crate::icu::{self, Irq};
use crate::regs::pdc::{self, RegisterBlock};
use crate::{lock, mstp, Error, OpenState, Version};

const VERSION: Version = Version {
    api_major: 1,
    api_minor: 2,
    code_major: 1,
    code_minor: 6,
};

/// Driver version.
pub fn version() -> Version {
    VERSION
}

/// Largest start + size value of either capture axis.
const CAPTURE_RANGE_LIMIT: u32 = 4095;

/// Bytes moved per transfer-engine block.
const BYTES_PER_BLOCK: u32 = 32;

/// Spin bound for the reset and FIFO-drain waits.
const HW_TIMEOUT: u16 = 0xFFFF;

/// External engine moving data from the PDC FIFO to memory.
pub trait CaptureTransfer {
    /// Prepares the engine to move `num_blocks` blocks of
    /// 32 bytes from the fixed `source` register to `dest`.
    fn setup(&mut self, source: *const u32, dest: *mut u8, num_blocks: u16) -> Result<(), Error>;

    /// Stops any transfer in flight.
    fn disable(&mut self) -> Result<(), Error>;
}

/// Pixel clock divider applied to PCLKB for the PCKO output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivision {
    Div2,
    Div4,
    Div6,
    Div8,
    Div10,
    Div12,
    Div14,
    Div16,
}

/// Synchronization signal polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncPolarity {
    ActiveHigh,
    ActiveLow,
}

/// Capture data endianness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endian {
    Little,
    Big,
}

/// What a callback invocation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdcEvents {
    pub frame_complete: bool,
    pub overrun: bool,
    pub underrun: bool,
    pub vertical_setting_error: bool,
    pub horizontal_setting_error: bool,
}

/// Live synchronization pin state reported by [`Pdc::state_get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdcState {
    pub vsync: bool,
    pub hsync: bool,
}

/// Data passed to the user callback.
pub struct PdcCallbackArgs {
    pub events: PdcEvents,
    /// Frame buffer of the capture this event belongs to.
    pub buffer: *mut u8,
    pub context: *const (),
}

/// Callback invoked in interrupt context.
pub type PdcCallback = fn(&PdcCallbackArgs);

/// Capture configuration.
#[derive(Clone, Copy)]
pub struct PdcConfig {
    pub clock_division: ClockDivision,
    /// Bytes per pixel produced by the attached camera; nonzero.
    pub bytes_per_pixel: u8,
    pub x_capture_start_pixel: u16,
    pub x_capture_pixels: u16,
    pub y_capture_start_pixel: u16,
    pub y_capture_pixels: u16,
    pub hsync_polarity: SyncPolarity,
    pub vsync_polarity: SyncPolarity,
    pub endian: Endian,
    pub irq_ipl: u8,
    pub frame_end_ipl: u8,
    pub callback: Option<PdcCallback>,
    pub context: *const (),
}

#[derive(Clone, Copy)]
struct IsrContext {
    regs: *const RegisterBlock,
    callback: Option<PdcCallback>,
    context: *const (),
    buffer: *mut u8,
    irq: Irq,
    frame_end_irq: Irq,
}

unsafe impl Send for IsrContext {}

type DispatchSlot = Mutex<Cell<Option<IsrContext>>>;

static DISPATCH: DispatchSlot = Mutex::new(Cell::new(None));

// One PDC unit exists; the flag is shared between the API and the ISRs.
static TRANSFER_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// # PDC control block
///
/// Generic over the transfer engine that drains the capture FIFO.
pub struct Pdc<T: CaptureTransfer> {
    regs: *const RegisterBlock,
    transfer: T,
    bytes_per_pixel: u8,
    x_start: u16,
    x_pixels: u16,
    y_start: u16,
    y_pixels: u16,
    hsync_polarity: SyncPolarity,
    vsync_polarity: SyncPolarity,
    endian: Endian,
    callback: Option<PdcCallback>,
    context: *const (),
    irq: Option<Irq>,
    frame_end_irq: Option<Irq>,
    state: OpenState,
}

impl<T: CaptureTransfer> Pdc<T> {
    /// Creates a closed control block owning the transfer engine.
    pub const fn new(transfer: T) -> Self {
        Self {
            regs: ptr::null(),
            transfer,
            bytes_per_pixel: 0,
            x_start: 0,
            x_pixels: 0,
            y_start: 0,
            y_pixels: 0,
            hsync_polarity: SyncPolarity::ActiveHigh,
            vsync_polarity: SyncPolarity::ActiveHigh,
            endian: Endian::Little,
            callback: None,
            context: ptr::null(),
            irq: None,
            frame_end_irq: None,
            state: OpenState::Closed,
        }
    }

    fn feature() -> Feature {
        Feature::new(IpId::Pdc, 0, 0)
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

    /// Validates the capture window, powers the PDC, and enables the pixel
    /// clocks. Capture itself starts with [`Pdc::capture_start`], after the
    /// camera has been configured against the running PCKO.
    pub fn open(&mut self, cfg: &PdcConfig) -> Result<(), Error> {
        let feature = Self::feature();
        let info = fmi::product_feature_get(&feature)?;
        let irq = fmi::event_info_get(&feature, Signal::PdcInt);
        let frame_end_irq = fmi::event_info_get(&feature, Signal::PdcFrameEnd);
        self.open_with(info.base as *const RegisterBlock, irq, frame_end_irq, cfg)
    }

    pub(crate) fn open_with(
        &mut self,
        regs: *const RegisterBlock,
        irq: Option<Irq>,
        frame_end_irq: Option<Irq>,
        cfg: &PdcConfig,
    ) -> Result<(), Error> {
        if self.state == OpenState::Open {
            return Err(Error::InUse);
        }
        validate_window(cfg)?;
        let (irq, frame_end_irq) = match (irq, frame_end_irq) {
            (Some(i), Some(f)) => (i, f),
            _ => return Err(Error::IrqNotAvailable),
        };

        let feature = Self::feature();
        lock::acquire(&feature)?;
        mstp::module_start(&feature);

        self.regs = regs;

        icu::irq_disable(irq);
        icu::irq_disable(frame_end_irq);
        icu::irq_set_priority(irq, cfg.irq_ipl);
        icu::irq_set_priority(frame_end_irq, cfg.frame_end_ipl);

        self.bytes_per_pixel = cfg.bytes_per_pixel;
        self.x_start = cfg.x_capture_start_pixel;
        self.x_pixels = cfg.x_capture_pixels;
        self.y_start = cfg.y_capture_start_pixel;
        self.y_pixels = cfg.y_capture_pixels;
        self.hsync_polarity = cfg.hsync_polarity;
        self.vsync_polarity = cfg.vsync_polarity;
        self.endian = cfg.endian;
        self.callback = cfg.callback;
        self.context = cfg.context;

        TRANSFER_IN_PROGRESS.store(false, Ordering::SeqCst);

        let regs = self.regs();
        regs.pccr1_pce_set(false);
        regs.pccr0_pckdiv_set(match cfg.clock_division {
            ClockDivision::Div2 => 0,
            ClockDivision::Div4 => 1,
            ClockDivision::Div6 => 2,
            ClockDivision::Div8 => 3,
            ClockDivision::Div10 => 4,
            ClockDivision::Div12 => 5,
            ClockDivision::Div14 => 6,
            ClockDivision::Div16 => 7,
        });
        regs.pccr0_pckoe_set(true);
        regs.pccr0_pcke_set(true);

        self.irq = Some(irq);
        self.frame_end_irq = Some(frame_end_irq);
        self.state = OpenState::Open;
        Ok(())
    }

    /// Starts capturing one frame into `buffer`.
    ///
    /// The caller guarantees the buffer holds at least
    /// `x_pixels * y_pixels * bytes_per_pixel` bytes. Fails with
    /// [`Error::InUse`] while a previous capture is still in flight.
    pub fn capture_start(&mut self, buffer: *mut u8) -> Result<(), Error> {
        self.require_open()?;
        if buffer.is_null() {
            return Err(Error::InvalidArgument);
        }
        if TRANSFER_IN_PROGRESS.load(Ordering::SeqCst) {
            return Err(Error::InUse);
        }

        let frame_bytes = u32::from(self.x_pixels)
            * u32::from(self.bytes_per_pixel)
            * u32::from(self.y_pixels);
        let num_blocks = (frame_bytes / BYTES_PER_BLOCK) as u16;
        self.transfer
            .setup(self.regs().pcdr_ptr(), buffer, num_blocks)?;

        TRANSFER_IN_PROGRESS.store(true, Ordering::SeqCst);

        let regs = self.regs();
        regs.pccr0_prst_start();
        let mut timeout = HW_TIMEOUT;
        while regs.pccr0_prst() && timeout > 0 {
            timeout -= 1;
        }
        if timeout == 0 {
            TRANSFER_IN_PROGRESS.store(false, Ordering::SeqCst);
            return Err(Error::Timeout);
        }

        regs.hcr_hst_set(u32::from(self.x_start) * u32::from(self.bytes_per_pixel));
        regs.hcr_hsz_set(u32::from(self.x_pixels) * u32::from(self.bytes_per_pixel));
        regs.vcr_vst_set(u32::from(self.y_start));
        regs.vcr_vsz_set(u32::from(self.y_pixels));
        regs.pccr0_vps_set(self.vsync_polarity == SyncPolarity::ActiveLow);
        regs.pccr0_hps_set(self.hsync_polarity == SyncPolarity::ActiveLow);
        regs.pccr0_eds_set(self.endian == Endian::Big);
        regs.pccr0_inte_set(0x3F);

        let (irq, frame_end_irq) = (self.irq.unwrap(), self.frame_end_irq.unwrap());
        critical_section::with(|cs| {
            DISPATCH.borrow(cs).set(Some(IsrContext {
                regs: self.regs,
                callback: self.callback,
                context: self.context,
                buffer,
                irq,
                frame_end_irq,
            }));
        });
        icu::context_set(irq, &DISPATCH as *const DispatchSlot as *const ());
        icu::context_set(frame_end_irq, &DISPATCH as *const DispatchSlot as *const ());
        for vector in [irq, frame_end_irq] {
            icu::irq_status_clear(vector);
            icu::irq_clear_pending(vector);
            icu::irq_enable(vector);
        }

        regs.pccr1_pce_set(true);
        Ok(())
    }

    /// Live VSYNC/HSYNC pin levels.
    pub fn state_get(&self) -> Result<PdcState, Error> {
        self.require_open()?;
        let regs = self.regs();
        Ok(PdcState {
            vsync: regs.pcmonr_vsync(),
            hsync: regs.pcmonr_hsync(),
        })
    }

    /// Stops any capture in flight, disables the PDC and the transfer
    /// engine, and releases the hardware resource.
    pub fn close(&mut self) -> Result<(), Error> {
        self.require_open()?;

        self.state = OpenState::Closed;

        self.regs().pccr0_inte_set(0);
        for vector in [self.irq, self.frame_end_irq].into_iter().flatten() {
            icu::irq_disable(vector);
            icu::context_clear(vector);
        }
        critical_section::with(|cs| DISPATCH.borrow(cs).set(None));

        // A transfer that is already stopped is not an error on close.
        match self.transfer.disable() {
            Ok(()) | Err(Error::NotOpen) => {}
            Err(e) => return Err(e),
        }

        let regs = self.regs();
        regs.pccr1_pce_set(false);
        regs.pccr0_pcke_set(false);
        regs.pccr0_pckoe_set(false);
        TRANSFER_IN_PROGRESS.store(false, Ordering::SeqCst);

        let feature = Self::feature();
        mstp::module_stop(&feature);
        lock::release(&feature);
        Ok(())
    }
}

fn validate_window(cfg: &PdcConfig) -> Result<(), Error> {
    if cfg.bytes_per_pixel == 0 || cfg.x_capture_pixels == 0 || cfg.y_capture_pixels == 0 {
        return Err(Error::InvalidArgument);
    }
    let x_end = u32::from(cfg.x_capture_start_pixel) + u32::from(cfg.x_capture_pixels);
    let y_end = u32::from(cfg.y_capture_start_pixel) + u32::from(cfg.y_capture_pixels);
    if x_end > CAPTURE_RANGE_LIMIT || y_end > CAPTURE_RANGE_LIMIT {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

fn dispatch_context(irq: Irq) -> Option<IsrContext> {
    let slot = icu::context_get(irq) as *const DispatchSlot;
    if slot.is_null() {
        return None;
    }
    critical_section::with(|cs| unsafe { &*slot }.borrow(cs).get())
}

fn error_events(regs: &RegisterBlock) -> PdcEvents {
    let status = regs.pcsr();
    let events = PdcEvents {
        frame_complete: false,
        overrun: status & pdc::STATUS_OVRF != 0,
        underrun: status & pdc::STATUS_UDRF != 0,
        vertical_setting_error: status & pdc::STATUS_VERF != 0,
        horizontal_setting_error: status & pdc::STATUS_HERF != 0,
    };
    let mut clear = 0;
    if events.overrun {
        clear |= pdc::STATUS_OVRF;
    }
    if events.underrun {
        clear |= pdc::STATUS_UDRF;
    }
    if events.vertical_setting_error {
        clear |= pdc::STATUS_VERF;
    }
    if events.horizontal_setting_error {
        clear |= pdc::STATUS_HERF;
    }
    regs.pcsr_clear(clear);
    events
}

fn invoke(context: &IsrContext, events: PdcEvents) {
    if let Some(callback) = context.callback {
        callback(&PdcCallbackArgs {
            events,
            buffer: context.buffer,
            context: context.context,
        });
    }
}

/// Frame-end interrupt service routine.
///
/// Waits for the transfer engine to drain the FIFO, then either completes
/// the capture or reports an underrun.
pub fn pdc_frame_end_isr() {
    let irq = icu::current_irq();

    let Some(context) = dispatch_context(irq) else {
        icu::irq_status_clear(irq);
        return;
    };
    let regs = unsafe { &*context.regs };

    let mut timeout = HW_TIMEOUT;
    while regs.pcsr() & (pdc::STATUS_FEMPF | pdc::STATUS_UDRF) == 0 && timeout > 0 {
        timeout -= 1;
    }

    TRANSFER_IN_PROGRESS.store(false, Ordering::SeqCst);

    if regs.pcsr() & pdc::STATUS_UDRF == 0 {
        regs.pccr1_pce_set(false);
        regs.pcsr_clear(pdc::STATUS_FEF);
        icu::irq_status_clear(irq);
        icu::irq_disable(irq);
        icu::irq_disable(context.irq);

        invoke(
            &context,
            PdcEvents {
                frame_complete: true,
                overrun: false,
                underrun: false,
                vertical_setting_error: false,
                horizontal_setting_error: false,
            },
        );
    } else {
        regs.pcsr_clear(pdc::STATUS_FEF);
        regs.pccr1_pce_set(false);
        let events = error_events(regs);
        icu::irq_status_clear(irq);
        icu::irq_disable(irq);
        invoke(&context, events);
    }
}

/// Error interrupt service routine: overrun, underrun, and capture window
/// setting errors.
pub fn pdc_int_isr() {
    let irq = icu::current_irq();

    let Some(context) = dispatch_context(irq) else {
        icu::irq_status_clear(irq);
        return;
    };
    let regs = unsafe { &*context.regs };

    regs.pccr1_pce_set(false);
    TRANSFER_IN_PROGRESS.store(false, Ordering::SeqCst);
    let events = error_events(regs);

    icu::irq_status_clear(irq);
    icu::irq_disable(irq);

    invoke(&context, events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icu::host;
    use std::sync::atomic::AtomicUsize;

    const IRQ: Irq = Irq::new(40);
    const FRAME_END_IRQ: Irq = Irq::new(41);

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static LAST_COMPLETE: AtomicBool = AtomicBool::new(false);
    static LAST_UNDERRUN: AtomicBool = AtomicBool::new(false);

    fn recording_callback(args: &PdcCallbackArgs) {
        CALLS.fetch_add(1, Ordering::SeqCst);
        LAST_COMPLETE.store(args.events.frame_complete, Ordering::SeqCst);
        LAST_UNDERRUN.store(args.events.underrun, Ordering::SeqCst);
    }

    #[derive(Default)]
    struct MockTransfer {
        setups: usize,
        disables: usize,
        last_blocks: u16,
    }

    impl CaptureTransfer for MockTransfer {
        fn setup(
            &mut self,
            _source: *const u32,
            _dest: *mut u8,
            num_blocks: u16,
        ) -> Result<(), Error> {
            self.setups += 1;
            self.last_blocks = num_blocks;
            Ok(())
        }

        fn disable(&mut self) -> Result<(), Error> {
            self.disables += 1;
            Ok(())
        }
    }

    fn config() -> PdcConfig {
        PdcConfig {
            clock_division: ClockDivision::Div4,
            bytes_per_pixel: 2,
            x_capture_start_pixel: 0,
            x_capture_pixels: 64,
            y_capture_start_pixel: 0,
            y_capture_pixels: 32,
            hsync_polarity: SyncPolarity::ActiveHigh,
            vsync_polarity: SyncPolarity::ActiveLow,
            endian: Endian::Little,
            irq_ipl: 7,
            frame_end_ipl: 7,
            callback: Some(recording_callback),
            context: ptr::null(),
        }
    }

    #[test]
    fn capture_start_programs_window_and_transfer() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut pdc = Pdc::new(MockTransfer::default());
        pdc.open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &config())
            .unwrap();

        let mut frame = [0u8; 64 * 32 * 2];
        pdc.capture_start(frame.as_mut_ptr()).unwrap();

        assert_eq!(block.hcr_hsz(), 64 * 2);
        assert_eq!(block.vcr_vsz(), 32);
        assert!(block.pccr0_vps(), "active-low vsync encodes as set bit");
        assert!(!block.pccr0_hps());
        assert!(block.pccr1_pce());
        assert_eq!(pdc.transfer.setups, 1);
        assert_eq!(pdc.transfer.last_blocks, (64 * 32 * 2 / 32) as u16);
        assert!(host::is_enabled(IRQ));
        assert!(host::is_enabled(FRAME_END_IRQ));

        // A second start while the first is in flight is refused.
        assert_eq!(
            pdc.capture_start(frame.as_mut_ptr()).unwrap_err(),
            Error::InUse
        );

        pdc.close().unwrap();
    }

    #[test]
    fn frame_end_completes_the_capture() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut pdc = Pdc::new(MockTransfer::default());
        pdc.open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &config())
            .unwrap();
        let mut frame = [0u8; 64 * 32 * 2];
        pdc.capture_start(frame.as_mut_ptr()).unwrap();

        block.test_raise_status(pdc::STATUS_FEF | pdc::STATUS_FEMPF);
        CALLS.store(0, Ordering::SeqCst);
        host::set_current_irq(FRAME_END_IRQ);
        pdc_frame_end_isr();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(LAST_COMPLETE.load(Ordering::SeqCst));
        assert!(!block.pccr1_pce());
        assert_eq!(block.pcsr() & pdc::STATUS_FEF, 0);
        assert!(!host::is_enabled(FRAME_END_IRQ));

        // The next capture may start now.
        pdc.capture_start(frame.as_mut_ptr()).unwrap();
        pdc.close().unwrap();
    }

    #[test]
    fn underrun_during_frame_end_reports_error() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut pdc = Pdc::new(MockTransfer::default());
        pdc.open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &config())
            .unwrap();
        let mut frame = [0u8; 64 * 32 * 2];
        pdc.capture_start(frame.as_mut_ptr()).unwrap();

        block.test_raise_status(pdc::STATUS_FEF | pdc::STATUS_UDRF);
        CALLS.store(0, Ordering::SeqCst);
        host::set_current_irq(FRAME_END_IRQ);
        pdc_frame_end_isr();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(!LAST_COMPLETE.load(Ordering::SeqCst));
        assert!(LAST_UNDERRUN.load(Ordering::SeqCst));
        assert_eq!(block.pcsr() & pdc::STATUS_UDRF, 0, "serviced flag cleared");

        pdc.close().unwrap();
    }

    #[test]
    fn window_bounds_are_validated() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut pdc = Pdc::new(MockTransfer::default());

        let mut cfg = config();
        cfg.x_capture_start_pixel = 4000;
        cfg.x_capture_pixels = 100;
        assert_eq!(
            pdc.open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &cfg)
                .unwrap_err(),
            Error::InvalidArgument
        );

        let mut cfg = config();
        cfg.bytes_per_pixel = 0;
        assert_eq!(
            pdc.open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &cfg)
                .unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn operations_on_closed_block_fail_with_not_open() {
        let mut pdc = Pdc::new(MockTransfer::default());
        let mut byte = 0u8;
        assert_eq!(
            pdc.capture_start(&mut byte as *mut u8).unwrap_err(),
            Error::NotOpen
        );
        assert_eq!(pdc.state_get().unwrap_err(), Error::NotOpen);
        assert_eq!(pdc.close().unwrap_err(), Error::NotOpen);
    }

    #[test]
    fn close_disables_everything_and_releases_the_lock() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut pdc = Pdc::new(MockTransfer::default());
        pdc.open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &config())
            .unwrap();

        let mut second = Pdc::new(MockTransfer::default());
        assert_eq!(
            second
                .open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &config())
                .unwrap_err(),
            Error::InUse
        );

        pdc.close().unwrap();
        assert!(!block.pccr1_pce());
        assert!(!block.pccr0_pcke());
        assert_eq!(pdc.transfer.disables, 1);
        assert!(!host::is_enabled(IRQ));

        second
            .open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &config())
            .unwrap();
        second.close().unwrap();
    }

    #[test]
    fn state_get_reads_sync_pins() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut pdc = Pdc::new(MockTransfer::default());
        pdc.open_with(&block, Some(IRQ), Some(FRAME_END_IRQ), &config())
            .unwrap();

        block.pcmonr_vsync_set(true);
        let state = pdc.state_get().unwrap();
        assert!(state.vsync);
        assert!(!state.hsync);

        pdc.close().unwrap();
    }
}
