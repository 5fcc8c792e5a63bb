//! # Range Finder
//!
//! HC-SR04-class ultrasonic distance measurement over a trigger/echo pin
//! pair.
//!
//! A reading is the mean of up to N round-trip samples collected within one
//! time budget. Each sample raises the trigger line for ~10 µs, then
//! busy-polls the echo line for the rising and falling edges of the return
//! pulse. The pulse width, minus a fixed sensor-latency offset, is
//! proportional to twice the obstacle distance.
//!
//! Edge waits are deliberately busy-polled: the required resolution sits
//! below practical sleep granularity. They are always deadline-bounded, so
//! a stuck echo line degrades to a timed-out sample and never blocks the
//! caller — the monitoring loop above this component must stay responsive.
//!
//! A reading of `0.0` cm is the sentinel for "no valid sample obtained";
//! timeouts are normal outcomes, not errors.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Result, RoverHalError};
use crate::hw::timing;
use crate::hw::{InputPin, OutputPin};

/// Width of the trigger pulse sent to start a measurement.
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Fixed sensor latency between the trigger pulse and the start of the echo
/// pulse, subtracted from every sample.
///
/// Calibration value, determined empirically for this sensor family rather
/// than taken from a datasheet guarantee. Re-tune when changing hardware.
pub const ECHO_LATENCY_OFFSET_NS: u64 = 190_000;

/// Speed of sound in centimeters per nanosecond at room temperature.
pub const SOUND_CM_PER_NS: f64 = 0.000_034_3;

/// Ultrasonic range finder over one trigger/echo pin pair.
///
/// Synchronous, call-and-return. The instance owns its pins exclusively;
/// concurrent callers must serialize externally.
pub struct Ranger<T: OutputPin, E: InputPin> {
    trigger: T,
    echo: E,
}

impl<T: OutputPin, E: InputPin> Ranger<T, E> {
    /// Creates a range finder over an output trigger pin and an input echo
    /// pin.
    pub fn new(trigger: T, echo: E) -> Self {
        Self { trigger, echo }
    }

    /// Measures distance in centimeters, rounded to one decimal place.
    ///
    /// Takes up to `samples` round trips, stopping early once the total
    /// elapsed time exceeds `timeout`, and returns the mean over the valid
    /// ones. Returns `0.0` when no valid sample was obtained within the
    /// budget.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `samples` is zero or `timeout` is zero
    /// - `Hardware` if a pin read/write fails
    pub fn read_distance(&mut self, timeout: Duration, samples: u32) -> Result<f64> {
        if samples == 0 {
            return Err(RoverHalError::InvalidConfig(
                "sample count must be at least 1".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(RoverHalError::InvalidConfig(
                "timeout must be non-zero".to_string(),
            ));
        }

        let budget_start = Instant::now();
        let mut valid: Vec<u64> = Vec::with_capacity(samples as usize);

        for attempt in 0..samples {
            if budget_start.elapsed() > timeout {
                debug!(
                    "Range budget exhausted after {} of {} samples",
                    attempt, samples
                );
                break;
            }
            if let Some(duration_ns) = self.sample_once(timeout)? {
                valid.push(duration_ns);
            }
        }

        let distance = mean_distance_cm(&valid);
        trace!(
            "Range reading: {:.1} cm from {} valid samples",
            distance,
            valid.len()
        );
        Ok(distance)
    }

    /// Performs one trigger/echo round trip.
    ///
    /// Returns the corrected pulse duration in nanoseconds, or `None` when
    /// the sample timed out or was implausible.
    fn sample_once(&mut self, timeout: Duration) -> Result<Option<u64>> {
        // ~10us trigger pulse; the hold is too short to sleep through
        self.trigger.set_high()?;
        timing::spin_for(TRIGGER_PULSE);
        self.trigger.set_low()?;

        let rise_deadline = Instant::now() + timeout;
        let rise = match timing::wait_for_level(&mut self.echo, true, rise_deadline)? {
            Some(instant) => instant,
            None => {
                // No pulse: nothing in range, or a sensor fault
                trace!("No echo rising edge within {:?}", timeout);
                return Ok(None);
            }
        };

        let fall_deadline = rise + timeout;
        let fall = match timing::wait_for_level(&mut self.echo, false, fall_deadline)? {
            Some(instant) => instant,
            None => {
                trace!("No echo falling edge within {:?}", timeout);
                return Ok(None);
            }
        };

        Ok(corrected_duration_ns(
            fall.duration_since(rise).as_nanos(),
            timeout.as_nanos(),
        ))
    }
}

/// Subtracts the sensor-latency offset and filters implausible samples.
///
/// A pulse shorter than the offset clamps negative and is invalid; a
/// corrected pulse longer than the timeout-equivalent duration is noise and
/// is discarded.
fn corrected_duration_ns(raw_ns: u128, timeout_ns: u128) -> Option<u64> {
    let corrected = raw_ns.checked_sub(ECHO_LATENCY_OFFSET_NS as u128)?;
    if corrected > timeout_ns {
        return None;
    }
    Some(corrected as u64)
}

/// Mean distance over corrected pulse durations, in centimeters rounded to
/// one decimal place. Empty input yields the `0.0` sentinel.
fn mean_distance_cm(durations_ns: &[u64]) -> f64 {
    if durations_ns.is_empty() {
        return 0.0;
    }
    let mean_ns = durations_ns.iter().map(|&d| d as f64).sum::<f64>() / durations_ns.len() as f64;
    // Round trip: the pulse covers the distance twice
    let cm = mean_ns * SOUND_CM_PER_NS / 2.0;
    (cm * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mocks::{RecordingPin, ScriptedPin};

    // ==================== Conversion Tests ====================

    #[test]
    fn test_known_pulse_yields_expected_distance() {
        // 1,000,000 ns raw pulse, 190,000 ns offset:
        // (810,000 * 0.0000343) / 2 = 13.89 -> 13.9 cm
        let corrected = corrected_duration_ns(1_000_000, 50_000_000).unwrap();
        assert_eq!(corrected, 810_000);
        assert_eq!(mean_distance_cm(&[corrected]), 13.9);
    }

    #[test]
    fn test_pulse_shorter_than_offset_is_invalid() {
        assert_eq!(corrected_duration_ns(100_000, 50_000_000), None);
        assert_eq!(corrected_duration_ns(189_999, 50_000_000), None);
    }

    #[test]
    fn test_pulse_exceeding_timeout_is_discarded() {
        let timeout_ns = 1_000_000;
        assert_eq!(corrected_duration_ns(1_200_000 + 1, timeout_ns), None);
        assert!(corrected_duration_ns(1_000_000, timeout_ns).is_some());
    }

    #[test]
    fn test_no_valid_samples_yields_sentinel() {
        assert_eq!(mean_distance_cm(&[]), 0.0);
    }

    #[test]
    fn test_mean_over_multiple_samples() {
        // Mean of 810,000 and 1,010,000 is 910,000 ns:
        // (910,000 * 0.0000343) / 2 = 15.6065 -> 15.6 cm
        assert_eq!(mean_distance_cm(&[810_000, 1_010_000]), 15.6);
    }

    #[test]
    fn test_rounding_to_one_decimal() {
        // 500,000 ns -> 8.575 cm -> 8.6
        assert_eq!(mean_distance_cm(&[500_000]), 8.6);
    }

    // ==================== Edge-timing Tests ====================

    #[test]
    fn test_simulated_echo_produces_plausible_distance() {
        let trigger = RecordingPin::new();
        // Echo low for 2ms, high for 5ms, then low again
        let echo = ScriptedPin::new(
            vec![
                (Duration::from_millis(2), false),
                (Duration::from_millis(5), true),
            ],
            false,
        );
        let mut ranger = Ranger::new(trigger.clone(), echo);

        let distance = ranger
            .read_distance(Duration::from_millis(100), 1)
            .unwrap();

        // 5ms pulse minus offset: (4,810,000 * 0.0000343) / 2 = 82.5 cm,
        // with some slack for host scheduling jitter
        assert!(
            (distance - 82.5).abs() < 3.0,
            "distance {} outside expected band",
            distance
        );
        // Trigger pulsed high then low
        assert_eq!(trigger.recorded_levels(), vec![true, false]);
    }

    #[test]
    fn test_stuck_low_echo_times_out_with_sentinel() {
        let trigger = RecordingPin::new();
        let echo = ScriptedPin::stuck(false);
        let mut ranger = Ranger::new(trigger, echo);

        let start = Instant::now();
        let distance = ranger.read_distance(Duration::from_millis(20), 3).unwrap();

        assert_eq!(distance, 0.0);
        // Bounded: first sample eats the budget, later attempts are skipped
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_stuck_high_echo_times_out_with_sentinel() {
        let trigger = RecordingPin::new();
        let echo = ScriptedPin::stuck(true);
        let mut ranger = Ranger::new(trigger, echo);

        let start = Instant::now();
        let distance = ranger.read_distance(Duration::from_millis(20), 2).unwrap();

        assert_eq!(distance, 0.0);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_zero_samples_is_config_error() {
        let mut ranger = Ranger::new(RecordingPin::new(), ScriptedPin::stuck(false));
        assert!(matches!(
            ranger.read_distance(Duration::from_millis(10), 0),
            Err(RoverHalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_timeout_is_config_error() {
        let mut ranger = Ranger::new(RecordingPin::new(), ScriptedPin::stuck(false));
        assert!(matches!(
            ranger.read_distance(Duration::ZERO, 1),
            Err(RoverHalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pin_fault_is_surfaced() {
        let trigger = RecordingPin::new();
        trigger.set_fail(true);
        let mut ranger = Ranger::new(trigger, ScriptedPin::stuck(false));
        assert!(matches!(
            ranger.read_distance(Duration::from_millis(10), 1),
            Err(RoverHalError::Hardware(_))
        ));
    }
}
