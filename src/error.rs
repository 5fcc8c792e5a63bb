//! # Error Types
//!
//! Custom error types for Rover HAL using `thiserror`.
//!
//! The taxonomy mirrors how failures behave at the component boundaries:
//!
//! - [`RoverHalError::InvalidConfig`]: bad pin/frequency/array-length input.
//!   Fails fast at call time and is never retried.
//! - [`RoverHalError::Hardware`]: bus or pin I/O faults. Fatal during
//!   construction, retryable by the caller after initialization.
//! - [`RoverHalError::ControllerNotFound`]: no matching gamepad on the
//!   system. The input pipeline treats this as a connectivity state and
//!   retries on its next cycle.
//!
//! Timeouts (no echo pulse, no input event this cycle) are deliberately not
//! errors; they are reported as sentinel values or "no event this cycle".

use thiserror::Error;

/// Main error type for Rover HAL
#[derive(Debug, Error)]
pub enum RoverHalError {
    /// Invalid configuration value (bad pin, frequency, length mismatch)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file parse errors
    #[error("configuration error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// Bus or pin fault surfaced from the hardware layer
    #[error("hardware fault: {0}")]
    Hardware(String),

    /// No supported gamepad device found on the system
    #[error("no supported controller found")]
    ControllerNotFound,

    /// Controller device errors (open, read)
    #[error("controller error: {0}")]
    Controller(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rover HAL
pub type Result<T> = std::result::Result<T, RoverHalError>;
