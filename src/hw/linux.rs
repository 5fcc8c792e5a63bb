//! Linux character-device backends for the hardware seams.
//!
//! GPIO lines are requested through `/dev/gpiochipN` via `gpio-cdev`; the
//! I2C bus is opened through `/dev/i2c-N` via `i2cdev`. All platform errors
//! are translated into the crate taxonomy here so nothing above this module
//! sees a raw OS error.

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use tracing::debug;

use super::{I2cBus, InputPin, OutputPin};
use crate::error::{Result, RoverHalError};

/// Consumer label reported to the kernel for requested GPIO lines.
const LINE_CONSUMER: &str = "rover-hal";

/// A GPIO line requested for output.
pub struct CdevOutputPin {
    handle: LineHandle,
    offset: u32,
}

/// A GPIO line requested for input.
pub struct CdevInputPin {
    handle: LineHandle,
    offset: u32,
}

/// One device address on a Linux I2C bus.
pub struct LinuxI2c {
    device: LinuxI2CDevice,
    path: String,
    address: u16,
}

/// Request a GPIO line for output, initially low.
///
/// A line that cannot be requested for output is a fatal configuration
/// fault for the component that needs it.
pub fn request_output(chip_path: &str, offset: u32) -> Result<CdevOutputPin> {
    let mut chip = Chip::new(chip_path)
        .map_err(|e| RoverHalError::Hardware(format!("failed to open {}: {}", chip_path, e)))?;
    let handle = chip
        .get_line(offset)
        .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, LINE_CONSUMER))
        .map_err(|e| {
            RoverHalError::Hardware(format!(
                "line {} on {} does not support output: {}",
                offset, chip_path, e
            ))
        })?;
    debug!("Requested output line {} on {}", offset, chip_path);
    Ok(CdevOutputPin { handle, offset })
}

/// Request a GPIO line for input.
pub fn request_input(chip_path: &str, offset: u32) -> Result<CdevInputPin> {
    let mut chip = Chip::new(chip_path)
        .map_err(|e| RoverHalError::Hardware(format!("failed to open {}: {}", chip_path, e)))?;
    let handle = chip
        .get_line(offset)
        .and_then(|line| line.request(LineRequestFlags::INPUT, 0, LINE_CONSUMER))
        .map_err(|e| {
            RoverHalError::Hardware(format!(
                "line {} on {} does not support input: {}",
                offset, chip_path, e
            ))
        })?;
    debug!("Requested input line {} on {}", offset, chip_path);
    Ok(CdevInputPin { handle, offset })
}

/// Open one device address on an I2C bus (e.g. `/dev/i2c-1`, `0x54`).
///
/// Failure here is fatal for the owning driver; it cannot operate without a
/// bus.
pub fn open_i2c(bus_path: &str, address: u16) -> Result<LinuxI2c> {
    let device = LinuxI2CDevice::new(bus_path, address).map_err(|e| {
        RoverHalError::Hardware(format!(
            "failed to open {} at address 0x{:02x}: {}",
            bus_path, address, e
        ))
    })?;
    debug!("Opened I2C device {} at 0x{:02x}", bus_path, address);
    Ok(LinuxI2c {
        device,
        path: bus_path.to_string(),
        address,
    })
}

impl OutputPin for CdevOutputPin {
    fn set_high(&mut self) -> Result<()> {
        self.handle
            .set_value(1)
            .map_err(|e| RoverHalError::Hardware(format!("line {} write failed: {}", self.offset, e)))
    }

    fn set_low(&mut self) -> Result<()> {
        self.handle
            .set_value(0)
            .map_err(|e| RoverHalError::Hardware(format!("line {} write failed: {}", self.offset, e)))
    }
}

impl InputPin for CdevInputPin {
    fn is_high(&mut self) -> Result<bool> {
        let value = self
            .handle
            .get_value()
            .map_err(|e| RoverHalError::Hardware(format!("line {} read failed: {}", self.offset, e)))?;
        Ok(value != 0)
    }
}

impl I2cBus for LinuxI2c {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.device.write(bytes).map_err(|e| {
            RoverHalError::Hardware(format!(
                "I2C write to {} at 0x{:02x} failed: {}",
                self.path, self.address, e
            ))
        })
    }
}
