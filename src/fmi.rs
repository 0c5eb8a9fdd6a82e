//! # Factory MCU Information (FMI)
//!
//! Registry mapping a logical peripheral identity to its register base
//! address, interrupt routing, and part-variant capability word. Drivers
//! query this module at `open` time instead of hard-coding addresses, so a
//! single driver source serves every part in the family.

use crate::icu::Irq;
use crate::Error;

/// Peripheral identity within the VK55xx family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpId {
    /// Low-power analog comparator.
    Acmp,
    /// 8-bit D/A converter.
    Dac8,
    /// Key-matrix interrupt controller.
    Kint,
    /// Low-voltage detection monitors.
    Lvd,
    /// Low-power timer (input capture).
    Agt,
    /// Parallel data capture unit.
    Pdc,
    /// PTP Ethernet DMA controller.
    Ptpedmac,
}

/// A concrete hardware resource: peripheral, unit, and channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Feature {
    pub id: IpId,
    pub unit: u8,
    pub channel: u8,
}

impl Feature {
    pub const fn new(id: IpId, unit: u8, channel: u8) -> Self {
        Self { id, unit, channel }
    }
}

/// Interrupt-generating signals of the supported peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    AcmpInt,
    KintInt,
    LvdMonitor,
    AgtInt,
    AgtCompareA,
    PdcInt,
    PdcFrameEnd,
    PtpedmacPint,
}

/// Result of a successful feature lookup.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInfo {
    /// Register block base address.
    pub base: usize,
    /// Packed variant capability word, decoded by the owning driver.
    pub variant: u16,
}

// Register block base addresses. LVD lives in the always-on system block.
const ACMP_BASE: usize = 0x4008_5E00;
const DAC8_BASE: usize = 0x4009_E000;
const KINT_BASE: usize = 0x4008_0000;
const LVD_BASE: usize = 0x4001_E000;
const AGT_BASE: [usize; AGT_UNITS] = [0x4008_4000, 0x4008_4100];
const PDC_BASE: usize = 0x4003_4000;
const PTPEDMAC_BASE: usize = 0x4006_4400;

/// Units of the AGT peripheral present on every part in the family.
pub const AGT_UNITS: usize = 2;

// Variant capability words. The bit assignments mirror the factory data of
// the silicon: each driver decodes only the bits it owns.
//
// ACMP:  bit0 window mode, bit1 extended filter dividers
// DAC8:  bits1:0 channel count (0 encodes two channels), bit2 real-time
//        mode, bit3 charge pump, bit4 A/D sync
// KINT:  bits3:0 key-return line count
// LVD:   bit0 digital filter present
#[cfg(not(feature = "variant-vk5520"))]
mod variant {
    pub const ACMP: u16 = 0x0003;
    pub const DAC8: u16 = 0x001F;
    pub const KINT: u16 = 0x0008;
    pub const LVD: u16 = 0x0001;
}
#[cfg(feature = "variant-vk5520")]
mod variant {
    pub const ACMP: u16 = 0x0000;
    pub const DAC8: u16 = 0x0000;
    pub const KINT: u16 = 0x0006;
    pub const LVD: u16 = 0x0000;
}

/// Looks up the register base address and variant data for a feature.
///
/// The channel is not range-checked here: channel validation is the owning
/// driver's job because the valid domain depends on the variant word.
pub fn product_feature_get(feature: &Feature) -> Result<FeatureInfo, Error> {
    let (base, variant) = match feature.id {
        IpId::Acmp => (ACMP_BASE, variant::ACMP),
        IpId::Dac8 => (DAC8_BASE, variant::DAC8),
        IpId::Kint => (KINT_BASE, variant::KINT),
        IpId::Lvd => (LVD_BASE, variant::LVD),
        IpId::Agt => {
            let unit = feature.unit as usize;
            if unit >= AGT_UNITS {
                return Err(Error::ChannelNotPresent);
            }
            (AGT_BASE[unit], 0)
        }
        IpId::Pdc => (PDC_BASE, 0),
        IpId::Ptpedmac => (PTPEDMAC_BASE, 0),
    };
    Ok(FeatureInfo { base, variant })
}

/// Resolves the interrupt number a signal is routed to, or `None` when the
/// signal is not wired into the vector table on this part.
pub fn event_info_get(feature: &Feature, signal: Signal) -> Option<Irq> {
    match (feature.id, signal) {
        (IpId::Acmp, Signal::AcmpInt) => match feature.channel {
            0 => Some(Irq::new(24)),
            1 => Some(Irq::new(25)),
            _ => None,
        },
        (IpId::Kint, Signal::KintInt) => Some(Irq::new(28)),
        (IpId::Lvd, Signal::LvdMonitor) => match feature.channel {
            0 => Some(Irq::new(30)),
            1 => Some(Irq::new(31)),
            _ => None,
        },
        (IpId::Agt, Signal::AgtInt) => match feature.unit {
            0 => Some(Irq::new(32)),
            1 => Some(Irq::new(34)),
            _ => None,
        },
        (IpId::Agt, Signal::AgtCompareA) => match feature.unit {
            0 => Some(Irq::new(33)),
            1 => Some(Irq::new(35)),
            _ => None,
        },
        (IpId::Pdc, Signal::PdcInt) => Some(Irq::new(40)),
        (IpId::Pdc, Signal::PdcFrameEnd) => Some(Irq::new(41)),
        (IpId::Ptpedmac, Signal::PtpedmacPint) => Some(Irq::new(44)),
        _ => None,
    }
}
