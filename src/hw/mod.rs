//! # Hardware Seams
//!
//! Narrow trait abstractions over the physical pins and the I2C bus.
//!
//! Every component in this crate talks to hardware exclusively through these
//! traits, so the timing and protocol logic can be exercised in tests with
//! scripted fakes while production code binds to the Linux character-device
//! backends in [`linux`].
//!
//! This module handles:
//! - [`OutputPin`] / [`InputPin`]: single GPIO line access
//! - [`I2cBus`]: raw write transactions to one bus address
//! - [`timing`]: the precision-wait primitives and their accuracy contract

pub mod linux;
pub mod timing;

use crate::error::Result;

/// A single digital output line.
pub trait OutputPin: Send {
    /// Drive the line to the active (high) level.
    fn set_high(&mut self) -> Result<()>;

    /// Drive the line to the inactive (low) level.
    fn set_low(&mut self) -> Result<()>;
}

/// A single digital input line.
pub trait InputPin: Send {
    /// Read the current line level. `true` is high.
    fn is_high(&mut self) -> Result<bool>;
}

/// A write-only handle to one device address on an I2C bus.
///
/// The bus has no built-in arbitration; a handle must not be shared between
/// callers without external serialization.
#[cfg_attr(test, mockall::automock)]
pub trait I2cBus: Send {
    /// Write one transaction (register byte plus payload) to the device.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}
