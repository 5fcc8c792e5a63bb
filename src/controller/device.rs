//! # Gamepad Device Discovery
//!
//! Finds and opens the rover's gamepad through the Linux evdev interface.
//!
//! ## Identification
//!
//! Devices under `/dev/input/event*` are scanned in path order (so device
//! selection is deterministic when several pads are plugged in). For each
//! candidate two strategies run in order, and the first match wins:
//!
//! 1. The human-readable device name contains one of the known substrings
//!    for the Xbox pad family.
//! 2. The hardware vendor/product id pair matches a known pad.
//!
//! If nothing matches, discovery fails with `ControllerNotFound`; the pad
//! may simply not be plugged in yet, and the input pipeline retries on its
//! next cycle.

use evdev::Device;
use std::path::Path;
use tracing::{debug, info};

use super::RawInputEvent;
use crate::error::{Result, RoverHalError};

/// Name substrings identifying the supported pad family.
const DEVICE_NAME_HINTS: &[&str] = &["x-box", "xbox"];

/// Known (vendor, product) id pairs.
///
/// The Microsoft ids are documented; the third-party entries are
/// calibration values accumulated from pads seen in the field rather than
/// any protocol guarantee, and should be re-verified when hardware changes.
const KNOWN_IDS: &[(u16, u16)] = &[
    (0x045e, 0x028e), // Microsoft Xbox 360 (wired)
    (0x045e, 0x02ea), // Microsoft Xbox One S
    (0x045e, 0x0b12), // Microsoft Xbox Series
    (0x0e6f, 0x0213), // PDP Afterglow
    (0x24c6, 0x541a), // PowerA
];

/// An open gamepad character device.
///
/// Wraps the evdev handle and translates its events into
/// [`RawInputEvent`]s so nothing above this module touches platform types.
pub struct GamepadDevice {
    device: Device,
    device_path: String,
}

impl GamepadDevice {
    /// Discovers and opens the first matching gamepad.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no matching pad on the system
    /// - `Controller`: `/dev/input` unreadable
    pub fn open() -> Result<Self> {
        Self::open_in(Path::new("/dev/input"))
    }

    /// Discovery against an arbitrary input directory (exposed for tests).
    fn open_in(input_dir: &Path) -> Result<Self> {
        if !input_dir.exists() {
            return Err(RoverHalError::Controller(format!(
                "{} directory not found",
                input_dir.display()
            )));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| {
                RoverHalError::Controller(format!(
                    "failed to read {}: {}",
                    input_dir.display(),
                    e
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RoverHalError::Controller(format!("failed to read directory entry: {}", e)))?;

        // Sorted scan keeps device selection deterministic with several pads
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let Some(filename) = path.file_name() else {
                continue;
            };
            if !filename.to_string_lossy().starts_with("event") {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (name: {:?}, vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        device.name(),
                        id.vendor(),
                        id.product()
                    );

                    if matches_name(device.name()) || matches_id(id.vendor(), id.product()) {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Found gamepad at: {}", device_path);
                        return Ok(GamepadDevice {
                            device,
                            device_path,
                        });
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(RoverHalError::ControllerNotFound)
    }

    /// The `/dev/input/eventX` path this pad was opened from.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// The human-readable device name, if the kernel reports one.
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    /// Reads pending events, blocking until at least one arrives.
    ///
    /// Kernel events that are neither buttons nor absolute axes (sync,
    /// etc.) are filtered out here.
    ///
    /// # Errors
    ///
    /// `Controller` when the read fails — typically unplug or permission
    /// revocation. The caller should drop this handle and rediscover.
    pub fn fetch_events(&mut self) -> Result<Vec<RawInputEvent>> {
        let events = self
            .device
            .fetch_events()
            .map_err(|e| RoverHalError::Controller(format!("failed to fetch events: {}", e)))?;
        Ok(events.filter_map(|event| translate(&event)).collect())
    }
}

/// First identification strategy: name substring match, case-insensitive.
fn matches_name(name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    let lowered = name.to_ascii_lowercase();
    DEVICE_NAME_HINTS.iter().any(|hint| lowered.contains(hint))
}

/// Second identification strategy: vendor/product id match.
fn matches_id(vendor: u16, product: u16) -> bool {
    KNOWN_IDS.contains(&(vendor, product))
}

/// Translates one kernel event into the crate's raw event form.
fn translate(event: &evdev::InputEvent) -> Option<RawInputEvent> {
    match event.kind() {
        evdev::InputEventKind::Key(key) => Some(RawInputEvent::Button {
            code: key.code(),
            pressed: event.value() != 0,
        }),
        evdev::InputEventKind::AbsAxis(axis) => Some(RawInputEvent::Axis {
            code: axis.0,
            value: event.value(),
        }),
        _ => None,
    }
}
