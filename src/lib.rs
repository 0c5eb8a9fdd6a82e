//! # Hardware Abstraction Layer for VK55xx Microcontrollers
//!
//! Peripheral drivers for the VK5500 and VK5520 parts. Every driver follows
//! the same lifecycle: a caller-allocated control block is initialized by
//! [`open`](acmp::Acmp::open)-style calls, armed with `enable`/`start`,
//! torn down with `close`. Interrupt-capable drivers expose a free ISR
//! function to be placed in the application's vector table.
#![cfg_attr(not(test), no_std)]

/// Entry point for the runtime application.
#[cfg(feature = "rt")]
pub use cortex_m_rt::entry;

pub mod acmp;
pub mod agt;
pub mod dac8;
pub mod fmi;
pub mod icu;
pub mod kint;
pub(crate) mod lock;
pub mod lvd;
pub(crate) mod mstp;
pub mod pdc;
pub mod ptpedmac;
pub mod regs;

/// Errors returned by every driver operation.
///
/// The taxonomy is closed: a driver either succeeds or fails synchronously
/// with one of these codes, leaving its control block in the state it had
/// before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The operation requires a prior successful `open`.
    NotOpen,
    /// The hardware resource is already owned by another control block.
    InUse,
    /// A configuration value is outside the enumerated domain.
    InvalidArgument,
    /// The requested channel does not exist on the detected part.
    ChannelNotPresent,
    /// The requested capability is absent on the detected part.
    Unsupported,
    /// A numeric value exceeds the peripheral's native bit width.
    Overflow,
    /// A required interrupt is not wired on this part.
    IrqNotAvailable,
    /// The peripheral has not been enabled for transfer.
    NotEnabled,
    /// A bounded wait on the hardware expired, or no data was available.
    Timeout,
    /// The configured count source clock is not running.
    ClockInactive,
}

/// Signal edge selection shared by the trigger-configurable drivers.
///
/// Not every peripheral accepts every edge: the key-matrix controller only
/// detects a single edge and rejects [`Edge::BothEdges`] with
/// [`Error::InvalidArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Trigger on the rising edge.
    Rising,
    /// Trigger on the falling edge.
    Falling,
    /// Trigger on both edges.
    BothEdges,
}

/// Driver version information, split into the stable API surface version and
/// the implementation code version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    pub api_major: u8,
    pub api_minor: u8,
    pub code_major: u8,
    pub code_minor: u8,
}

/// Liveness tag of a control block.
///
/// All control-mutating operations except `open` require [`OpenState::Open`];
/// `open` itself requires [`OpenState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenState {
    Closed,
    Open,
}
