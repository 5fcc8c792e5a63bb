//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Physical addressing — GPIO chip path, line offsets, I2C bus path and
//! device address, controller profile — is configuration data supplied by
//! the caller; the hardware core never negotiates it.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gpio: GpioConfig,
    pub led: LedConfig,
    pub ranger: RangerConfig,
    pub pwm: PwmConfig,
    pub controller: ControllerConfig,
}

/// GPIO chip configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpioConfig {
    #[serde(default = "default_gpio_chip")]
    pub chip: String,
}

/// LED driver bus configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LedConfig {
    #[serde(default = "default_i2c_bus")]
    pub bus: String,

    #[serde(default = "default_led_address")]
    pub address: u16,
}

/// Range finder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RangerConfig {
    pub trigger_pin: u32,

    pub echo_pin: u32,

    #[serde(default = "default_ranger_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_ranger_samples")]
    pub samples: u32,
}

/// Software PWM configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PwmConfig {
    pub pin: u32,

    #[serde(default = "default_pwm_frequency_hz")]
    pub frequency_hz: u32,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    #[serde(default = "default_controller_profile")]
    pub profile: String,

    #[serde(default = "default_dead_zone")]
    pub dead_zone: f64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

// Default value functions
fn default_gpio_chip() -> String { "/dev/gpiochip0".to_string() }

fn default_i2c_bus() -> String { "/dev/i2c-1".to_string() }
fn default_led_address() -> u16 { 0x54 }

fn default_ranger_timeout_ms() -> u64 { 50 }
fn default_ranger_samples() -> u32 { 3 }

fn default_pwm_frequency_hz() -> u32 { 50 }

fn default_controller_profile() -> String { "xbox360".to_string() }
fn default_dead_zone() -> f64 { 0.10 }
fn default_poll_interval_ms() -> u64 { 10 }
fn default_reconnect_interval_ms() -> u64 { 500 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.gpio.chip.is_empty() {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("gpio chip path cannot be empty")
            ));
        }

        if self.led.bus.is_empty() {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("led bus path cannot be empty")
            ));
        }

        // 7-bit I2C addressing
        if self.led.address > 0x7F {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("led address must be a 7-bit I2C address")
            ));
        }

        if self.ranger.trigger_pin == self.ranger.echo_pin {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("ranger trigger and echo pins must differ")
            ));
        }

        if self.ranger.timeout_ms == 0 || self.ranger.timeout_ms > 1000 {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("ranger timeout_ms must be between 1 and 1000")
            ));
        }

        if self.ranger.samples == 0 || self.ranger.samples > 100 {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("ranger samples must be between 1 and 100")
            ));
        }

        if self.pwm.frequency_hz == 0 || self.pwm.frequency_hz > 10_000 {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("pwm frequency_hz must be between 1 and 10000")
            ));
        }

        if crate::controller::profile::Profile::from_name(&self.controller.profile).is_none() {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("controller profile must be 'xbox360' or 'xboxone'")
            ));
        }

        if !(0.0..=0.5).contains(&self.controller.dead_zone) {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("controller dead_zone must be between 0.0 and 0.5")
            ));
        }

        if self.controller.poll_interval_ms == 0 || self.controller.poll_interval_ms > 1000 {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("controller poll_interval_ms must be between 1 and 1000")
            ));
        }

        if self.controller.reconnect_interval_ms == 0
            || self.controller.reconnect_interval_ms > 60_000
        {
            return Err(crate::error::RoverHalError::ConfigFile(
                toml::de::Error::custom("controller reconnect_interval_ms must be between 1 and 60000")
            ));
        }

        Ok(())
    }
}
