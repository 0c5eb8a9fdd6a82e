//! # PTP Ethernet DMA Controller (PTPEDMAC)
//!
//! Receive path for IEEE 1588 time-synchronization messages. Frames land in
//! a caller-provided descriptor ring ([`RxRing`]); the single PINT vector
//! reports frame, transmit-complete, and error events to one callback.
//!
//! Bind [`ptpedmac_isr`] to the PINT slot of the vector table.

use core::cell::Cell;
use core::ptr;

use critical_section::Mutex;
use vcell::VolatileCell;

use crate::fmi::{self, Feature, IpId, Signal};
use crate::icu::{self, Irq};
use crate::regs::ptpedmac::{self, RegisterBlock};
use crate::{lock, mstp, Error, OpenState, Version};

const VERSION: Version = Version {
    api_major: 1,
    api_minor: 0,
    code_major: 1,
    code_minor: 3,
};

/// Driver version.
pub fn version() -> Version {
    VERSION
}

/// Descriptors in the receive ring.
pub const NUM_RX_DESCRIPTORS: usize = 4;
/// Bytes per receive buffer; PTP messages are small.
pub const BUFFER_SIZE: usize = 320;

// Transmit FIFO 2048 bytes, receive FIFO 4096 bytes.
const FDR_VALUE: u32 = 0x0000_070F;

// Receive descriptor status bits.
const DESC_RACT: u32 = 1 << 31;
const DESC_RDLE: u32 = 1 << 30;
const DESC_RFP1: u32 = 1 << 29;
const DESC_RFP0: u32 = 1 << 28;
const DESC_RFE: u32 = 1 << 27;
const DESC_PORT: u32 = 1 << 7;
const DESC_TYPE_MASK: u32 = 0xF;
const DESC_FRAME_BITS: u32 =
    DESC_RFP1 | DESC_RFP0 | DESC_RFE | DESC_PORT | DESC_TYPE_MASK;

/// One EDMAC receive descriptor.
#[repr(C, align(16))]
pub struct RxDescriptor {
    status: VolatileCell<u32>,
    size: VolatileCell<u16>,
    bufsize: VolatileCell<u16>,
    buffer: VolatileCell<u32>,
}

impl RxDescriptor {
    const fn new() -> Self {
        Self {
            status: VolatileCell::new(0),
            size: VolatileCell::new(0),
            bufsize: VolatileCell::new(0),
            buffer: VolatileCell::new(0),
        }
    }
}

/// Caller-provided receive descriptor ring and frame storage.
///
/// Must outlive the driver; on the target this is a `static` the EDMAC DMA
/// writes into.
pub struct RxRing {
    descriptors: [RxDescriptor; NUM_RX_DESCRIPTORS],
    buffers: [[u8; BUFFER_SIZE]; NUM_RX_DESCRIPTORS],
}

impl RxRing {
    pub const fn new() -> Self {
        Self {
            descriptors: [
                RxDescriptor::new(),
                RxDescriptor::new(),
                RxDescriptor::new(),
                RxDescriptor::new(),
            ],
            buffers: [[0; BUFFER_SIZE]; NUM_RX_DESCRIPTORS],
        }
    }

    /// Hands a received frame to a descriptor, standing in for the DMA
    /// engine in host tests.
    #[cfg(test)]
    pub(crate) fn test_receive(&mut self, index: usize, frame: &[u8], port: u8) {
        self.buffers[index][..frame.len()].copy_from_slice(frame);
        self.descriptors[index].size.set(frame.len() as u16);
        let mut status = DESC_RFP1 | DESC_RFP0;
        if port != 0 {
            status |= DESC_PORT;
        }
        self.descriptors[index].status.set(status);
    }
}

impl Default for RxRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Event reported to the user callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PtpedmacEvent {
    /// A frame is ready to be read.
    Read,
    /// A frame transmit completed.
    Write,
    /// A DMA or FIFO error was flagged.
    Error,
}

/// Data passed to the user callback.
pub struct PtpedmacCallbackArgs {
    pub event: PtpedmacEvent,
    /// Port the triggering frame arrived on.
    pub channel: u8,
    /// Ethernet frame type field of the status register.
    pub frame_type: u8,
    pub context: *const (),
}

/// Callback invoked in interrupt context.
pub type PtpedmacCallback = fn(&PtpedmacCallbackArgs);

/// PTP host interface configuration.
#[derive(Clone, Copy)]
pub struct PtpedmacConfig {
    pub pint_ipl: u8,
    pub callback: Option<PtpedmacCallback>,
    pub context: *const (),
}

/// Result of a successful [`Ptpedmac::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceivedFrame {
    pub port: u8,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferState {
    Off,
    On,
}

#[derive(Clone, Copy)]
struct IsrContext {
    regs: *const RegisterBlock,
    callback: Option<PtpedmacCallback>,
    context: *const (),
}

unsafe impl Send for IsrContext {}

type DispatchSlot = Mutex<Cell<Option<IsrContext>>>;

static DISPATCH: DispatchSlot = Mutex::new(Cell::new(None));

/// # PTP host interface control block
pub struct Ptpedmac {
    regs: *const RegisterBlock,
    ring: Option<&'static mut RxRing>,
    current: usize,
    transfer: TransferState,
    irq: Option<Irq>,
    state: OpenState,
}

impl Ptpedmac {
    /// Creates a closed control block.
    pub const fn new() -> Self {
        Self {
            regs: ptr::null(),
            ring: None,
            current: 0,
            transfer: TransferState::Off,
            irq: None,
            state: OpenState::Closed,
        }
    }

    fn feature() -> Feature {
        Feature::new(IpId::Ptpedmac, 0, 0)
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

    /// Resets the controller and arms the PINT vector. Reception starts
    /// with [`Ptpedmac::link_process`] once the Ethernet link is up.
    pub fn open(&mut self, cfg: &PtpedmacConfig, ring: &'static mut RxRing) -> Result<(), Error> {
        let feature = Self::feature();
        let info = fmi::product_feature_get(&feature)?;
        let irq = fmi::event_info_get(&feature, Signal::PtpedmacPint);
        self.open_with(info.base as *const RegisterBlock, irq, cfg, ring)
    }

    pub(crate) fn open_with(
        &mut self,
        regs: *const RegisterBlock,
        irq: Option<Irq>,
        cfg: &PtpedmacConfig,
        ring: &'static mut RxRing,
    ) -> Result<(), Error> {
        if self.state == OpenState::Open {
            return Err(Error::InUse);
        }
        let irq = match irq {
            Some(irq) => irq,
            None => return Err(Error::IrqNotAvailable),
        };

        let feature = Self::feature();
        lock::acquire(&feature)?;
        mstp::module_start(&feature);

        self.regs = regs;
        self.ring = Some(ring);
        self.current = 0;
        self.transfer = TransferState::Off;

        // Software-reset the controller; the bit self-clears once the
        // internal state machines settle.
        self.regs().edmr_swr_set(true);

        icu::irq_disable(irq);
        icu::irq_status_clear(irq);
        icu::irq_set_priority(irq, cfg.pint_ipl);
        critical_section::with(|cs| {
            DISPATCH.borrow(cs).set(Some(IsrContext {
                regs,
                callback: cfg.callback,
                context: cfg.context,
            }));
        });
        icu::context_set(irq, &DISPATCH as *const DispatchSlot as *const ());

        // Drop any status left over from before the reset.
        self.regs().eesr_write(ptpedmac::EESR_ALL);

        icu::irq_enable(irq);

        self.irq = Some(irq);
        self.state = OpenState::Open;
        Ok(())
    }

    /// Builds the receive descriptor ring and enables frame reception.
    pub fn link_process(&mut self) -> Result<(), Error> {
        self.require_open()?;

        let ring = self.ring.as_mut().ok_or(Error::NotOpen)?;
        for index in 0..NUM_RX_DESCRIPTORS {
            let descriptor = &ring.descriptors[index];
            descriptor
                .buffer
                .set(ring.buffers[index].as_ptr() as usize as u32);
            descriptor.bufsize.set(BUFFER_SIZE as u16);
            descriptor.size.set(0);
            descriptor.status.set(if index == NUM_RX_DESCRIPTORS - 1 {
                DESC_RACT | DESC_RDLE
            } else {
                DESC_RACT
            });
        }
        self.current = 0;

        let regs = self.regs();
        regs.eesipr_write(ptpedmac::EESR_ALL);
        regs.edmr_de_set(true);
        regs.rdlar_write(self.ring.as_ref().unwrap().descriptors.as_ptr() as usize as u32);
        regs.tftr_write(0);
        regs.fdr_write(FDR_VALUE);
        regs.rmcr_rnr_set(true);
        regs.edrrr_rr_set(true);

        self.transfer = if regs.edrrr_rr() {
            TransferState::On
        } else {
            TransferState::Off
        };
        Ok(())
    }

    /// Whether the interface is currently able to transfer PTP messages.
    pub fn link_check(&self) -> Result<(), Error> {
        self.require_open()?;
        match self.transfer {
            TransferState::On => Ok(()),
            TransferState::Off => Err(Error::NotEnabled),
        }
    }

    /// Copies the oldest received frame into `buffer` and recycles its
    /// descriptor.
    ///
    /// Returns [`Error::Timeout`] when no frame is pending and
    /// [`Error::Overflow`] when the frame does not fit the buffer.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<ReceivedFrame, Error> {
        self.require_open()?;
        if self.transfer != TransferState::On {
            return Err(Error::NotEnabled);
        }

        let current = self.current;
        let ring = self.ring.as_mut().ok_or(Error::NotOpen)?;
        let descriptor = &ring.descriptors[current];
        let status = descriptor.status.get();

        if status & DESC_RACT != 0 {
            return Err(Error::Timeout);
        }

        let length = descriptor.size.get() as usize;
        if length > buffer.len() {
            return Err(Error::Overflow);
        }
        let port = if status & DESC_PORT != 0 { 1 } else { 0 };
        buffer[..length].copy_from_slice(&ring.buffers[current][..length]);

        // Recycle the descriptor and hand it back to the controller.
        descriptor.status.set((status & !DESC_FRAME_BITS) | DESC_RACT);
        self.current = (current + 1) % NUM_RX_DESCRIPTORS;

        let regs = self.regs();
        if !regs.edrrr_rr() {
            // Reception stalled on descriptor exhaustion; restart it.
            regs.edrrr_rr_set(true);
        }

        Ok(ReceivedFrame { port, length })
    }

    /// Disables reception and releases the hardware resource.
    pub fn close(&mut self) -> Result<(), Error> {
        self.require_open()?;

        self.state = OpenState::Closed;
        self.transfer = TransferState::Off;

        if let Some(irq) = self.irq {
            icu::irq_disable(irq);
            icu::context_clear(irq);
        }
        critical_section::with(|cs| DISPATCH.borrow(cs).set(None));

        let regs = self.regs();
        regs.edrrr_rr_set(false);
        regs.rdlar_write(0);
        regs.eesipr_write(0);

        let feature = Self::feature();
        mstp::module_stop(&feature);
        lock::release(&feature);
        Ok(())
    }
}

/// PINT interrupt service routine.
///
/// Reads the status register once, reports each pending event group to the
/// callback, then writes the observed status back: a written 1 clears that
/// bit, so events raised after the read are preserved and re-raise the
/// interrupt.
pub fn ptpedmac_isr() {
    let irq = icu::current_irq();

    let slot = icu::context_get(irq) as *const DispatchSlot;
    if slot.is_null() {
        icu::irq_status_clear(irq);
        return;
    }
    let context = critical_section::with(|cs| unsafe { &*slot }.borrow(cs).get());
    let Some(context) = context else {
        icu::irq_status_clear(irq);
        return;
    };

    let regs = unsafe { &*context.regs };
    let status = regs.eesr();

    if let Some(callback) = context.callback {
        let channel = if status & ptpedmac::EESR_PORT != 0 { 1 } else { 0 };
        let frame_type = (status & ptpedmac::EESR_TYPE_MASK) as u8;
        let mut report = |event| {
            callback(&PtpedmacCallbackArgs {
                event,
                channel,
                frame_type,
                context: context.context,
            });
        };

        if status & ptpedmac::EESR_ERROR_GROUP != 0 {
            report(PtpedmacEvent::Error);
        }
        if status & ptpedmac::EESR_FR != 0 {
            report(PtpedmacEvent::Read);
        }
        if status & ptpedmac::EESR_TC != 0 {
            report(PtpedmacEvent::Write);
        }
    }

    regs.eesr_write(status);
    icu::irq_status_clear(irq);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icu::host;
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

    const IRQ: Irq = Irq::new(44);

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static LAST_EVENT: AtomicU8 = AtomicU8::new(0xFF);

    fn recording_callback(args: &PtpedmacCallbackArgs) {
        CALLS.fetch_add(1, Ordering::SeqCst);
        LAST_EVENT.store(args.event as u8, Ordering::SeqCst);
    }

    fn config() -> PtpedmacConfig {
        PtpedmacConfig {
            pint_ipl: 8,
            callback: Some(recording_callback),
            context: ptr::null(),
        }
    }

    fn leaked_ring() -> &'static mut RxRing {
        Box::leak(Box::new(RxRing::new()))
    }

    #[test]
    fn link_process_builds_the_ring_and_enables_reception() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut ptp = Ptpedmac::new();
        let ring = leaked_ring();
        ptp.open_with(&block, Some(IRQ), &config(), ring).unwrap();

        assert_eq!(ptp.link_check().unwrap_err(), Error::NotEnabled);
        ptp.link_process().unwrap();
        ptp.link_check().unwrap();

        assert!(block.edrrr_rr());
        assert!(block.edmr_de());
        assert_ne!(block.rdlar(), 0);
        assert_eq!(block.eesipr(), ptpedmac::EESR_ALL);

        ptp.close().unwrap();
    }

    #[test]
    fn read_returns_frames_in_order_and_recycles_descriptors() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut ptp = Ptpedmac::new();
        ptp.open_with(&block, Some(IRQ), &config(), leaked_ring())
            .unwrap();
        ptp.link_process().unwrap();

        let mut buffer = [0u8; BUFFER_SIZE];
        assert_eq!(ptp.read(&mut buffer).unwrap_err(), Error::Timeout);

        ptp.ring.as_mut().unwrap().test_receive(0, b"sync-msg", 1);
        let frame = ptp.read(&mut buffer).unwrap();
        assert_eq!(frame.port, 1);
        assert_eq!(frame.length, 8);
        assert_eq!(&buffer[..8], b"sync-msg");

        // The descriptor went back to the controller.
        assert_eq!(ptp.read(&mut buffer).unwrap_err(), Error::Timeout);

        // A short destination buffer is refused before any copy.
        ptp.ring.as_mut().unwrap().test_receive(1, b"follow-up", 0);
        let mut small = [0u8; 4];
        assert_eq!(ptp.read(&mut small).unwrap_err(), Error::Overflow);
        let frame = ptp.read(&mut buffer).unwrap();
        assert_eq!(frame.port, 0);
        assert_eq!(frame.length, 9);

        ptp.close().unwrap();
    }

    #[test]
    fn isr_reports_events_and_clears_only_observed_status() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut ptp = Ptpedmac::new();
        ptp.open_with(&block, Some(IRQ), &config(), leaked_ring())
            .unwrap();
        ptp.link_process().unwrap();

        block.eesr_write(ptpedmac::EESR_FR | 0x2);
        CALLS.store(0, Ordering::SeqCst);
        host::set_current_irq(IRQ);
        ptpedmac_isr();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_EVENT.load(Ordering::SeqCst), PtpedmacEvent::Read as u8);
        // The write-back pattern equals the observed status, so a bit set
        // after the read would not be cleared by hardware.
        assert_eq!(block.eesr(), ptpedmac::EESR_FR | 0x2);

        block.eesr_write(ptpedmac::EESR_RFOF);
        CALLS.store(0, Ordering::SeqCst);
        ptpedmac_isr();
        assert_eq!(LAST_EVENT.load(Ordering::SeqCst), PtpedmacEvent::Error as u8);

        ptp.close().unwrap();
    }

    #[test]
    fn operations_on_closed_block_fail_with_not_open() {
        let mut ptp = Ptpedmac::new();
        let mut buffer = [0u8; 16];
        assert_eq!(ptp.link_process().unwrap_err(), Error::NotOpen);
        assert_eq!(ptp.link_check().unwrap_err(), Error::NotOpen);
        assert_eq!(ptp.read(&mut buffer).unwrap_err(), Error::NotOpen);
        assert_eq!(ptp.close().unwrap_err(), Error::NotOpen);
    }

    #[test]
    fn second_open_is_locked_out_until_close() {
        let _hw = crate::test_support::hw_guard();
        let block = RegisterBlock::test_block();
        let mut first = Ptpedmac::new();
        let mut second = Ptpedmac::new();
        first
            .open_with(&block, Some(IRQ), &config(), leaked_ring())
            .unwrap();

        assert_eq!(
            second
                .open_with(&block, Some(IRQ), &config(), leaked_ring())
                .unwrap_err(),
            Error::InUse
        );

        first.close().unwrap();
        assert!(!block.edrrr_rr());
        assert_eq!(block.rdlar(), 0);
        assert!(!host::is_enabled(IRQ));

        second
            .open_with(&block, Some(IRQ), &config(), leaked_ring())
            .unwrap();
        second.close().unwrap();
    }
}
