//! # 8-bit Digital-to-Analog Converter (DAC8)
//!
//! Each control block drives one converter channel. The control register is
//! shared by every channel, so enable and mode updates are performed inside
//! critical sections.

use core::ptr;

use crate::fmi::{self, Feature, IpId};
use crate::regs::dac8::RegisterBlock;
use crate::{lock, mstp, Error, OpenState, Version};

const VERSION: Version = Version {
    api_major: 2,
    api_minor: 0,
    code_major: 1,
    code_minor: 10,
};

/// Driver version.
pub fn version() -> Version {
    VERSION
}

/// Position of the sample within the 16-bit write value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataFormat {
    /// Sample in the low byte; values above 255 are rejected.
    FlushRight,
    /// Sample in the high byte; the low byte is discarded.
    FlushLeft,
}

/// Conversion timing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dac8Mode {
    /// Output updates as soon as the data register is written.
    Normal,
    /// Output updates on the real-time trigger event.
    RealTime,
}

/// Part-specific options.
#[derive(Debug, Clone, Copy)]
pub struct Dac8Extend {
    pub mode: Dac8Mode,
    pub enable_charge_pump: bool,
}

/// DAC8 channel configuration.
#[derive(Debug, Clone, Copy)]
pub struct Dac8Config {
    pub channel: u8,
    pub data_format: DataFormat,
    /// Synchronize conversions with the A/D converter to reduce interference.
    pub ad_da_synchronized: bool,
    pub extend: Option<Dac8Extend>,
}

/// Capability word decode for the detected part.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dac8Variant {
    channels: u8,
    real_time: bool,
    charge_pump: bool,
    ad_sync: bool,
}

impl Dac8Variant {
    pub(crate) fn decode(variant: u16) -> Self {
        let mut channels = (variant & 0b11) as u8;
        // The factory data encodes a channel count of zero as two channels.
        if channels == 0 {
            channels = 2;
        }
        Self {
            channels,
            real_time: variant & (1 << 2) != 0,
            charge_pump: variant & (1 << 3) != 0,
            ad_sync: variant & (1 << 4) != 0,
        }
    }
}

/// # DAC8 channel control block
///
/// ## Example
/// ```no_run
/// use vk55xx_hal::dac8::{Dac8, Dac8Config, DataFormat};
///
/// let mut dac = Dac8::new();
/// dac.open(&Dac8Config {
///     channel: 0,
///     data_format: DataFormat::FlushRight,
///     ad_da_synchronized: false,
///     extend: None,
/// })?;
/// dac.write(128)?; // mid-scale, conversion starts automatically
/// # Ok::<(), vk55xx_hal::Error>(())
/// ```
pub struct Dac8 {
    regs: *const RegisterBlock,
    channel: u8,
    started: bool,
    data_format: DataFormat,
    state: OpenState,
}

impl Dac8 {
    /// Creates a closed control block. [`Dac8::open`] is the only operation
    /// accepted in this state.
    pub const fn new() -> Self {
        Self {
            regs: ptr::null(),
            channel: 0,
            started: false,
            data_format: DataFormat::FlushRight,
            state: OpenState::Closed,
        }
    }

    fn feature(channel: u8) -> Feature {
        Feature::new(IpId::Dac8, 0, channel)
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

    /// Configures and opens one DAC channel.
    ///
    /// The channel is stopped after open; the first [`Dac8::write`] or an
    /// explicit [`Dac8::start`] begins conversion. Reentrant for different
    /// channels, not for the same channel.
    pub fn open(&mut self, cfg: &Dac8Config) -> Result<(), Error> {
        let info = fmi::product_feature_get(&Self::feature(cfg.channel))?;
        self.open_with(
            info.base as *const RegisterBlock,
            Dac8Variant::decode(info.variant),
            cfg,
        )
    }

    pub(crate) fn open_with(
        &mut self,
        regs: *const RegisterBlock,
        variant: Dac8Variant,
        cfg: &Dac8Config,
    ) -> Result<(), Error> {
        if self.state == OpenState::Open {
            return Err(Error::InUse);
        }
        validate_config(cfg, &variant)?;

        let feature = Self::feature(cfg.channel);
        lock::acquire(&feature)?;
        mstp::module_start(&feature);

        self.regs = regs;

        // Stop the channel before layering the configuration.
        critical_section::with(|_| self.regs().dacr_dace_set(cfg.channel, false));

        let (mode, charge_pump) = match cfg.extend {
            Some(extend) => (extend.mode, extend.enable_charge_pump),
            None => (Dac8Mode::Normal, false),
        };

        if variant.charge_pump {
            self.regs().dacpc_pumpen_set(charge_pump);
        }
        if variant.real_time {
            critical_section::with(|_| {
                self.regs()
                    .dacr_damd_set(cfg.channel, mode == Dac8Mode::RealTime)
            });
        }
        if variant.ad_sync {
            self.regs().dacadscr_dacadst_set(cfg.ad_da_synchronized);
        }

        self.channel = cfg.channel;
        self.started = false;
        self.data_format = cfg.data_format;
        self.state = OpenState::Open;
        Ok(())
    }

    /// Writes a sample and starts the converter if it was idle.
    pub fn write(&mut self, value: u16) -> Result<(), Error> {
        self.require_open()?;

        let sample = match self.data_format {
            DataFormat::FlushLeft => (value >> 8) as u8,
            DataFormat::FlushRight => {
                if value > 0xFF {
                    return Err(Error::Overflow);
                }
                value as u8
            }
        };

        self.regs().dadr_write(self.channel, sample);

        if !self.started {
            critical_section::with(|_| self.regs().dacr_dace_set(self.channel, true));
            self.started = true;
        }
        Ok(())
    }

    /// Starts conversion output. Starting an already started channel is a
    /// no-op success.
    pub fn start(&mut self) -> Result<(), Error> {
        self.require_open()?;
        critical_section::with(|_| self.regs().dacr_dace_set(self.channel, true));
        self.started = true;
        Ok(())
    }

    /// Stops conversion output without forgetting the configuration.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.require_open()?;
        critical_section::with(|_| self.regs().dacr_dace_set(self.channel, false));
        self.started = false;
        Ok(())
    }

    /// Resolution of the converter in bits.
    pub fn info_get(&self) -> Result<u8, Error> {
        self.require_open()?;
        Ok(8)
    }

    /// Stops the channel and releases the hardware resource.
    pub fn close(&mut self) -> Result<(), Error> {
        self.require_open()?;

        critical_section::with(|_| self.regs().dacr_dace_set(self.channel, false));

        self.state = OpenState::Closed;
        self.started = false;

        let feature = Self::feature(self.channel);
        mstp::module_stop(&feature);
        lock::release(&feature);
        Ok(())
    }
}

fn validate_config(cfg: &Dac8Config, variant: &Dac8Variant) -> Result<(), Error> {
    if cfg.channel >= variant.channels {
        return Err(Error::ChannelNotPresent);
    }
    if let Some(extend) = cfg.extend {
        if extend.mode == Dac8Mode::RealTime && !variant.real_time {
            return Err(Error::Unsupported);
        }
        if extend.enable_charge_pump && !variant.charge_pump {
            return Err(Error::Unsupported);
        }
    }
    if cfg.ad_da_synchronized && !variant.ad_sync {
        return Err(Error::Unsupported);
    }
    Ok(())
}
