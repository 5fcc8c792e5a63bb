//! # Precision Waits
//!
//! The single seam through which components wait for physical time.
//!
//! ## Accuracy contract
//!
//! This crate runs as an ordinary process under a general-purpose scheduler,
//! so every wait here is best-effort soft real time:
//!
//! - [`hold`] is a timed suspension (`std::thread::sleep`). It never wakes
//!   early but may wake late by the scheduler's jitter, typically tens to
//!   hundreds of microseconds on a loaded system. Use it for per-cycle PWM
//!   holds where the error averages out over the waveform.
//! - [`spin_for`] busy-polls a monotonic clock. It burns CPU but resolves
//!   below practical sleep granularity. Use it only for very short pulses
//!   (the ~10 µs ultrasonic trigger).
//! - [`wait_for_level`] busy-polls an input pin up to a deadline. It is the
//!   only way to catch sub-millisecond echo edges; the deadline bound is a
//!   hard invariant so a stuck pin can never block a caller indefinitely.
//!
//! No function here guarantees microsecond accuracy and nothing in this
//! crate pretends otherwise.

use std::time::{Duration, Instant};

use super::InputPin;
use crate::error::Result;

/// Suspend the current thread for `duration`.
///
/// Timed suspension, not a spin-wait; accuracy is bounded by the scheduler.
pub fn hold(duration: Duration) {
    std::thread::sleep(duration);
}

/// Busy-poll the monotonic clock for `duration`.
///
/// Only suitable for waits shorter than practical sleep granularity.
pub fn spin_for(duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Busy-poll `pin` until it reads `level`, or until `deadline` passes.
///
/// Returns the instant the level was observed, or `None` on timeout. Pin
/// read faults propagate; a pin that never transitions is handled purely by
/// the deadline.
pub fn wait_for_level<P: InputPin + ?Sized>(
    pin: &mut P,
    level: bool,
    deadline: Instant,
) -> Result<Option<Instant>> {
    loop {
        if pin.is_high()? == level {
            return Ok(Some(Instant::now()));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mocks::ScriptedPin;

    #[test]
    fn test_hold_sleeps_at_least_requested() {
        let start = Instant::now();
        hold(Duration::from_millis(10));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_spin_for_waits_at_least_requested() {
        let start = Instant::now();
        spin_for(Duration::from_micros(200));
        assert!(start.elapsed() >= Duration::from_micros(200));
    }

    #[test]
    fn test_wait_for_level_observes_transition() {
        // Low for 2ms, then high
        let mut pin = ScriptedPin::new(vec![(Duration::from_millis(2), false)], true);
        let deadline = Instant::now() + Duration::from_millis(100);
        let observed = wait_for_level(&mut pin, true, deadline).unwrap();
        assert!(observed.is_some());
    }

    #[test]
    fn test_wait_for_level_times_out_on_stuck_pin() {
        let mut pin = ScriptedPin::stuck(false);
        let start = Instant::now();
        let deadline = start + Duration::from_millis(20);
        let observed = wait_for_level(&mut pin, true, deadline).unwrap();
        assert!(observed.is_none());
        // Must return promptly after the deadline, never block
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
