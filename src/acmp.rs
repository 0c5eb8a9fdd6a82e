//! # Low-Power Analog Comparator (ACMP)
//!
//! Two comparator channels sharing a nibble-split register bank. The
//! comparator starts running at open; pin output and the edge interrupt are
//! held off until [`Acmp::output_enable`] so the application can wait out
//! the analog stabilization time first.
//!
//! Bind [`acmp_int_isr`] to both comparator slots of the vector table.

use core::cell::Cell;
use core::ptr;

use critical_section::Mutex;

use crate::fmi::{self, Feature, IpId, Signal};
use crate::icu::{self, Irq};
use crate::regs::acmp::{self, RegisterBlock};
use crate::{lock, mstp, Edge, Error, OpenState, Version};

const VERSION: Version = Version {
    api_major: 2,
    api_minor: 0,
    code_major: 1,
    code_minor: 7,
};

/// Driver version.
pub fn version() -> Version {
    VERSION
}

/// Number of comparator channels on every part in the family.
pub const CHANNELS: u8 = 2;

/// Minimum wait between open and a stable comparison result.
const STABILIZATION_WAIT_US: u32 = 100;

/// Comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcmpMode {
    /// Compare the input against the reference.
    Normal,
    /// Compare the input against a reference window; only present on parts
    /// with window hardware.
    Window,
}

/// Debounce filter sampling clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcmpFilter {
    Off,
    /// Sampling at PCLK/1 is not implemented by this comparator.
    Pclk1,
    Pclk8,
    /// Sampling at PCLK/16 is only present on parts with the extended
    /// filter option.
    Pclk16,
    Pclk32,
}

/// Operating state reported by [`Acmp::status_get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcmpState {
    /// [`Acmp::output_enable`] has not been called.
    OutputDisabled,
    /// VCMP < VREF (or the inverse with inverted polarity).
    OutputLow,
    /// VCMP > VREF (or the inverse with inverted polarity).
    OutputHigh,
}

/// Data passed to the user callback on a comparator event.
pub struct AcmpCallbackArgs {
    pub channel: u8,
    pub context: *const (),
}

/// Callback invoked in interrupt context.
pub type AcmpCallback = fn(&AcmpCallbackArgs);

/// Comparator channel configuration.
#[derive(Clone, Copy)]
pub struct AcmpConfig {
    pub channel: u8,
    pub mode: AcmpMode,
    pub filter: AcmpFilter,
    pub trigger: Edge,
    /// Invert the comparison result before output and status reporting.
    pub invert: bool,
    /// Drive the comparison result onto the VCOUT pin once output is
    /// enabled.
    pub pin_output: bool,
    pub irq_priority: u8,
    pub callback: Option<AcmpCallback>,
    pub context: *const (),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct AcmpVariant {
    window: bool,
    extended_filter: bool,
}

impl AcmpVariant {
    pub(crate) fn decode(variant: u16) -> Self {
        Self {
            window: variant & 1 != 0,
            extended_filter: variant & (1 << 1) != 0,
        }
    }
}

#[derive(Clone, Copy)]
struct IsrContext {
    channel: u8,
    callback: Option<AcmpCallback>,
    context: *const (),
}

unsafe impl Send for IsrContext {}

type DispatchSlot = Mutex<Cell<Option<IsrContext>>>;

const EMPTY_SLOT: DispatchSlot = Mutex::new(Cell::new(None));
static DISPATCH: [DispatchSlot; CHANNELS as usize] = [EMPTY_SLOT; CHANNELS as usize];

/// # Comparator channel control block
pub struct Acmp {
    regs: *const RegisterBlock,
    channel: u8,
    invert: bool,
    pin_output: bool,
    output_enabled: bool,
    irq: Option<Irq>,
    state: OpenState,
}

impl Acmp {
    /// Creates a closed control block.
    pub const fn new() -> Self {
        Self {
            regs: ptr::null(),
            channel: 0,
            invert: false,
            pin_output: false,
            output_enabled: false,
            irq: None,
            state: OpenState::Closed,
        }
    }

    fn feature(channel: u8) -> Feature {
        Feature::new(IpId::Acmp, 0, channel)
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

    /// Configures the channel and starts the comparator.
    ///
    /// The comparator inputs must already be routed by the application. Wait
    /// at least the stabilization time reported by [`Acmp::info_get`] before
    /// enabling output.
    pub fn open(&mut self, cfg: &AcmpConfig) -> Result<(), Error> {
        let feature = Self::feature(cfg.channel);
        let info = fmi::product_feature_get(&feature)?;
        let irq = fmi::event_info_get(&feature, Signal::AcmpInt);
        self.open_with(
            info.base as *const RegisterBlock,
            irq,
            AcmpVariant::decode(info.variant),
            cfg,
        )
    }

    pub(crate) fn open_with(
        &mut self,
        regs: *const RegisterBlock,
        irq: Option<Irq>,
        variant: AcmpVariant,
        cfg: &AcmpConfig,
    ) -> Result<(), Error> {
        if self.state == OpenState::Open {
            return Err(Error::InUse);
        }
        if cfg.channel >= CHANNELS {
            return Err(Error::ChannelNotPresent);
        }
        if cfg.mode == AcmpMode::Window && !variant.window {
            return Err(Error::Unsupported);
        }
        let fck = match cfg.filter {
            AcmpFilter::Off => acmp::FCK_OFF,
            AcmpFilter::Pclk1 => return Err(Error::InvalidArgument),
            AcmpFilter::Pclk8 => acmp::FCK_PCLK8,
            AcmpFilter::Pclk16 => {
                if !variant.extended_filter {
                    return Err(Error::Unsupported);
                }
                acmp::FCK_PCLK16
            }
            AcmpFilter::Pclk32 => acmp::FCK_PCLK32,
        };

        let feature = Self::feature(cfg.channel);
        lock::acquire(&feature)?;
        mstp::module_start(&feature);

        self.regs = regs;

        if let Some(irq) = irq {
            icu::irq_disable(irq);
            icu::irq_set_priority(irq, cfg.irq_priority);
            critical_section::with(|cs| {
                DISPATCH[cfg.channel as usize].borrow(cs).set(Some(IsrContext {
                    channel: cfg.channel,
                    callback: cfg.callback,
                    context: cfg.context,
                }));
            });
            icu::context_set(
                irq,
                &DISPATCH[cfg.channel as usize] as *const DispatchSlot as *const (),
            );
        }

        // Shared register bank: program this channel's nibbles atomically
        // with respect to the other channel's control paths.
        critical_section::with(|_| {
            let regs = self.regs();
            regs.channel_reset(cfg.channel);
            regs.compmdr_wde_set(cfg.channel, cfg.mode == AcmpMode::Window);
            regs.compocr_op_set(cfg.channel, cfg.invert);
            regs.compfir_edg_set(cfg.channel, edg_encoding(cfg.trigger));
            regs.compfir_fck_set(cfg.channel, fck);
            regs.compmdr_enb_set(cfg.channel, true);
        });

        self.channel = cfg.channel;
        self.invert = cfg.invert;
        self.pin_output = cfg.pin_output;
        self.output_enabled = false;
        self.irq = irq;
        self.state = OpenState::Open;
        Ok(())
    }

    /// Minimum stabilization wait in microseconds after open.
    pub fn info_get(&self) -> Result<u32, Error> {
        self.require_open()?;
        Ok(STABILIZATION_WAIT_US)
    }

    /// Enables pin output (as configured) and the edge interrupt.
    /// Re-enabling is a no-op success.
    pub fn output_enable(&mut self) -> Result<(), Error> {
        self.require_open()?;

        critical_section::with(|_| {
            self.regs().compocr_oe_set(self.channel, self.pin_output)
        });

        if let Some(irq) = self.irq {
            icu::irq_status_clear(irq);
            icu::irq_clear_pending(irq);
            icu::irq_enable(irq);
        }

        self.output_enabled = true;
        Ok(())
    }

    /// Disables pin output and the edge interrupt; the comparator keeps
    /// running and the configuration is retained.
    pub fn output_disable(&mut self) -> Result<(), Error> {
        self.require_open()?;

        critical_section::with(|_| self.regs().compocr_oe_set(self.channel, false));
        if let Some(irq) = self.irq {
            icu::irq_disable(irq);
        }

        self.output_enabled = false;
        Ok(())
    }

    /// Changes the event trigger edge. Takes effect on the next comparator
    /// edge, not retroactively.
    pub fn trigger_set(&mut self, trigger: Edge) -> Result<(), Error> {
        self.require_open()?;
        critical_section::with(|_| {
            self.regs().compfir_edg_set(self.channel, edg_encoding(trigger))
        });
        Ok(())
    }

    /// Current operating state of the comparator output.
    pub fn status_get(&self) -> Result<AcmpState, Error> {
        self.require_open()?;

        if !self.output_enabled {
            return Ok(AcmpState::OutputDisabled);
        }
        let mut high = self.regs().compmdr_mon(self.channel);
        if self.invert {
            high = !high;
        }
        Ok(if high {
            AcmpState::OutputHigh
        } else {
            AcmpState::OutputLow
        })
    }

    /// Stops the comparator and releases the hardware resource.
    pub fn close(&mut self) -> Result<(), Error> {
        self.require_open()?;

        self.state = OpenState::Closed;

        if let Some(irq) = self.irq {
            icu::irq_disable(irq);
            icu::context_clear(irq);
            critical_section::with(|cs| {
                DISPATCH[self.channel as usize].borrow(cs).set(None)
            });
        }

        critical_section::with(|_| {
            let regs = self.regs();
            regs.compmdr_enb_set(self.channel, false);
            regs.compocr_oe_set(self.channel, false);
        });

        self.output_enabled = false;

        let feature = Self::feature(self.channel);
        mstp::module_stop(&feature);
        lock::release(&feature);
        Ok(())
    }
}

fn edg_encoding(trigger: Edge) -> u8 {
    match trigger {
        Edge::Falling => acmp::EDG_FALLING,
        Edge::Rising => acmp::EDG_RISING,
        Edge::BothEdges => acmp::EDG_BOTH,
    }
}

/// Comparator interrupt service routine, shared by both channel vectors.
pub fn acmp_int_isr() {
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

    if let Some(callback) = context.callback {
        callback(&AcmpCallbackArgs {
            channel: context.channel,
            context: context.context,
        });
    }
}
