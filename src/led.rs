//! # Bus LED Driver
//!
//! Driver for an SN3218-class 18-channel constant-current LED chip on a
//! shared I2C bus.
//!
//! ## Chip protocol
//!
//! The chip is register-addressed. Every data write must be followed by a
//! commit ("update") transaction before it takes effect:
//!
//! | Register | Purpose |
//! |----------|---------|
//! | 0x00 | Output enable (0x01 on, 0x00 off) |
//! | 0x01 | Start of the 18 per-channel PWM values |
//! | 0x13 | Channel enable mask, three 6-bit groups |
//! | 0x16 | Commit pending register writes |
//! | 0x17 | Reset all registers |
//!
//! [`LedDriver::output`] is the hot path: it gamma-corrects the raw frame,
//! sends the full 18-byte frame as one 19-byte transaction (register byte
//! plus values) and commits. There is no partial-frame protocol; every call
//! retransmits the whole frame.
//!
//! ## Concurrency
//!
//! The bus has no arbitration. A driver owns its bus handle exclusively and
//! must not be called concurrently without external serialization.

use tracing::debug;

use crate::error::{Result, RoverHalError};
use crate::hw::I2cBus;

/// Number of LED channels on the chip.
pub const LED_CHANNELS: usize = 18;

/// Number of entries in a gamma lookup table.
pub const GAMMA_ENTRIES: usize = 256;

/// Conventional I2C address of the chip.
pub const DEFAULT_ADDRESS: u16 = 0x54;

/// Mask with all 18 channels enabled.
pub const ALL_CHANNELS: u32 = (1 << LED_CHANNELS as u32) - 1;

const REG_ENABLE_OUTPUT: u8 = 0x00;
const REG_SET_PWM_VALUES: u8 = 0x01;
const REG_ENABLE_LEDS: u8 = 0x13;
const REG_UPDATE: u8 = 0x16;
const REG_RESET: u8 = 0x17;

/// One full frame of raw brightness values, one byte per channel.
///
/// Mutated in place via [`LedFrame::set`] or [`LedFrame::fill`] and
/// transmitted whole on every [`LedDriver::output`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedFrame([u8; LED_CHANNELS]);

impl Default for LedFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl LedFrame {
    /// Creates an all-off frame.
    #[must_use]
    pub fn new() -> Self {
        Self([0; LED_CHANNELS])
    }

    /// Builds a frame from a slice, rejecting any length other than 18.
    pub fn from_slice(values: &[u8]) -> Result<Self> {
        let values: [u8; LED_CHANNELS] = values.try_into().map_err(|_| {
            RoverHalError::InvalidConfig(format!(
                "LED frame must have exactly {} values, got {}",
                LED_CHANNELS,
                values.len()
            ))
        })?;
        Ok(Self(values))
    }

    /// Sets one channel's raw brightness. `channel` must be in 0..18.
    pub fn set(&mut self, channel: usize, value: u8) -> Result<()> {
        if channel >= LED_CHANNELS {
            return Err(RoverHalError::InvalidConfig(format!(
                "LED channel {} out of range 0..{}",
                channel, LED_CHANNELS
            )));
        }
        self.0[channel] = value;
        Ok(())
    }

    /// Sets every channel to the same raw brightness.
    pub fn fill(&mut self, value: u8) {
        self.0 = [value; LED_CHANNELS];
    }

    /// Raw channel values in channel order.
    #[must_use]
    pub fn values(&self) -> &[u8; LED_CHANNELS] {
        &self.0
    }
}

/// A 256-entry brightness lookup table applied to one channel before
/// transmission.
#[derive(Clone, Copy)]
pub struct GammaTable([u8; GAMMA_ENTRIES]);

impl std::fmt::Debug for GammaTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GammaTable").finish_non_exhaustive()
    }
}

impl Default for GammaTable {
    /// The default power-law curve: `round(255 * (i/255)^2.5)`.
    ///
    /// Compensates for the eye's non-linear brightness response so raw
    /// values look perceptually linear.
    fn default() -> Self {
        let mut table = [0u8; GAMMA_ENTRIES];
        for (i, entry) in table.iter_mut().enumerate() {
            let normalized = i as f64 / 255.0;
            *entry = (255.0 * normalized.powf(2.5)).round() as u8;
        }
        Self(table)
    }
}

impl GammaTable {
    /// An identity table (no correction).
    #[must_use]
    pub fn identity() -> Self {
        let mut table = [0u8; GAMMA_ENTRIES];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = i as u8;
        }
        Self(table)
    }

    /// Builds a table from a slice, rejecting any length other than 256.
    pub fn from_slice(entries: &[u8]) -> Result<Self> {
        let entries: [u8; GAMMA_ENTRIES] = entries.try_into().map_err(|_| {
            RoverHalError::InvalidConfig(format!(
                "gamma table must have exactly {} entries, got {}",
                GAMMA_ENTRIES,
                entries.len()
            ))
        })?;
        Ok(Self(entries))
    }

    /// Looks up the corrected value for a raw brightness.
    #[must_use]
    pub fn correct(&self, raw: u8) -> u8 {
        self.0[raw as usize]
    }
}

/// Driver for one SN3218-class chip on an I2C bus.
///
/// Generic over [`I2cBus`] so the byte-level protocol is testable without
/// hardware. Construction-time bus failures are fatal; a failed [`output`]
/// after successful initialization is recoverable and may be retried.
///
/// [`output`]: LedDriver::output
pub struct LedDriver<B: I2cBus> {
    bus: B,
    gamma: [GammaTable; LED_CHANNELS],
}

impl<B: I2cBus> LedDriver<B> {
    /// Creates a driver over an already-open bus handle with default gamma
    /// on every channel.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            gamma: [GammaTable::default(); LED_CHANNELS],
        }
    }

    /// Brings the chip from power-on state to Ready: reset, enable output,
    /// enable all 18 channels.
    pub fn initialize(&mut self) -> Result<()> {
        self.reset()?;
        self.enable_output()?;
        self.enable_channels(ALL_CHANNELS)?;
        debug!("LED driver initialized, all {} channels enabled", LED_CHANNELS);
        Ok(())
    }

    /// Resets all chip registers to their power-on defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.bus.write(&[REG_RESET, 0xFF])
    }

    /// Enables the chip's output stage.
    pub fn enable_output(&mut self) -> Result<()> {
        self.bus.write(&[REG_ENABLE_OUTPUT, 0x01])
    }

    /// Disables the chip's output stage. Register contents are retained.
    pub fn disable_output(&mut self) -> Result<()> {
        self.bus.write(&[REG_ENABLE_OUTPUT, 0x00])
    }

    /// Selects which channels are live via an 18-bit mask (bit 0 =
    /// channel 0). Bits above 17 are rejected before any bus I/O.
    pub fn enable_channels(&mut self, mask: u32) -> Result<()> {
        if mask > ALL_CHANNELS {
            return Err(RoverHalError::InvalidConfig(format!(
                "channel mask 0x{:x} exceeds {} channels",
                mask, LED_CHANNELS
            )));
        }
        // The chip groups the mask into three 6-bit enable registers.
        self.bus.write(&[
            REG_ENABLE_LEDS,
            (mask & 0x3F) as u8,
            ((mask >> 6) & 0x3F) as u8,
            ((mask >> 12) & 0x3F) as u8,
        ])?;
        self.commit()
    }

    /// Replaces the gamma table for one channel. `channel` must be in 0..18.
    pub fn set_channel_gamma(&mut self, channel: usize, table: GammaTable) -> Result<()> {
        if channel >= LED_CHANNELS {
            return Err(RoverHalError::InvalidConfig(format!(
                "LED channel {} out of range 0..{}",
                channel, LED_CHANNELS
            )));
        }
        self.gamma[channel] = table;
        Ok(())
    }

    /// Transmits a full frame: per-channel gamma correction, one 19-byte
    /// data transaction, then the commit transaction.
    ///
    /// Idempotent frame replacement; every call retransmits all 18 channels
    /// regardless of how many changed.
    pub fn output(&mut self, frame: &LedFrame) -> Result<()> {
        let mut payload = [0u8; LED_CHANNELS + 1];
        payload[0] = REG_SET_PWM_VALUES;
        for (channel, &raw) in frame.values().iter().enumerate() {
            payload[channel + 1] = self.gamma[channel].correct(raw);
        }
        self.bus.write(&payload)?;
        self.commit()
    }

    /// Sets every channel to `value` and transmits the frame.
    pub fn fill(&mut self, value: u8) -> Result<()> {
        let mut frame = LedFrame::new();
        frame.fill(value);
        self.output(&frame)
    }

    /// Commits pending register writes; the chip latches nothing without it.
    fn commit(&mut self) -> Result<()> {
        self.bus.write(&[REG_UPDATE, 0xFF])
    }
}
