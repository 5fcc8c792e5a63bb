//! # Signal Generator (software PWM)
//!
//! Approximates a duty-cycle waveform on one digital output pin with a
//! tight timed loop. Used beneath motor speed and LED brightness control
//! where no hardware PWM peripheral is available to the process.
//!
//! ## Timing accuracy
//!
//! The per-cycle holds are timed suspensions through [`timing::hold`], not
//! spin-waits, so the loop does not starve other work. That makes accuracy
//! best-effort soft real time: each edge lands late by whatever jitter the
//! host scheduler adds. This is an accepted limitation of driving PWM from
//! a general-purpose process; it is documented here rather than hidden.
//!
//! ## Fail-safe
//!
//! On cancellation the loop completes its current cycle and forces the pin
//! low before exiting — an actuator must never be left mid-waveform on
//! shutdown.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, RoverHalError};
use crate::hw::timing;
use crate::hw::OutputPin;

/// How long the loop parks the pin between re-checks when the duty cycle is
/// pinned at 0 or 100 and there is no edge to generate.
const IDLE_TICK: Duration = Duration::from_millis(10);

/// Bounded wait for the timing loop to acknowledge cancellation.
const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Handle to a continuously-running software PWM channel.
///
/// The timing loop starts at construction and runs for the handle's entire
/// lifetime. Dropping the handle signals cancellation; [`SoftPwm::stop`]
/// additionally waits (bounded) for the loop to park the pin low.
pub struct SoftPwm {
    duty: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    frequency_hz: u32,
}

impl SoftPwm {
    /// Starts a PWM timing loop on `pin` at `frequency_hz`, initially at 0%
    /// duty.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `frequency_hz` is zero. A pin that cannot be
    /// driven is a fatal construction error at the hardware layer, before
    /// this call.
    pub fn spawn<P>(pin: P, frequency_hz: u32) -> Result<Self>
    where
        P: OutputPin + 'static,
    {
        if frequency_hz == 0 {
            return Err(RoverHalError::InvalidConfig(
                "PWM frequency must be greater than 0 Hz".to_string(),
            ));
        }

        let duty = Arc::new(AtomicU8::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let period_us = 1_000_000 / u64::from(frequency_hz);

        let loop_duty = Arc::clone(&duty);
        let loop_running = Arc::clone(&running);
        // Blocking worker: the holds are far below tokio's timer granularity
        let task = tokio::task::spawn_blocking(move || {
            timing_loop(pin, period_us, loop_duty, loop_running);
        });

        debug!(
            "Software PWM started at {} Hz (period {} us)",
            frequency_hz, period_us
        );
        Ok(Self {
            duty,
            running,
            task: Some(task),
            frequency_hz,
        })
    }

    /// Updates the target duty cycle, clamped to 0..=100.
    ///
    /// Takes effect on the loop's next cycle; the loop reads the value once
    /// per cycle so a waveform is never torn mid-period.
    pub fn set_duty_cycle(&self, percent: u8) {
        self.duty.store(percent.min(100), Ordering::Relaxed);
    }

    /// The configured output frequency.
    #[must_use]
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// The currently targeted duty cycle.
    #[must_use]
    pub fn duty_cycle(&self) -> u8 {
        self.duty.load(Ordering::Relaxed)
    }

    /// Cancels the timing loop and waits (bounded) for it to park the pin
    /// low.
    ///
    /// If the loop does not acknowledge within a few seconds the wait is
    /// abandoned with a warning — shutdown never blocks indefinitely.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            match tokio::time::timeout(STOP_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("PWM loop stopped, pin parked low"),
                Ok(Err(e)) => warn!("PWM loop panicked during shutdown: {}", e),
                Err(_) => warn!(
                    "PWM loop did not stop within {:?}, proceeding with shutdown",
                    STOP_TIMEOUT
                ),
            }
        }
    }
}

impl Drop for SoftPwm {
    fn drop(&mut self) {
        // Best effort: signal the loop; it parks the pin low on exit
        self.running.store(false, Ordering::Relaxed);
    }
}

/// The PWM timing loop. Runs until cancellation is observed, then forces
/// the pin to the inactive level.
fn timing_loop<P: OutputPin>(
    mut pin: P,
    period_us: u64,
    duty: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        // One read per cycle so the waveform can't tear mid-period
        let duty_now = duty.load(Ordering::Relaxed);

        if duty_now == 0 {
            drive(&mut pin, false);
            timing::hold(IDLE_TICK);
            continue;
        }
        if duty_now >= 100 {
            drive(&mut pin, true);
            timing::hold(IDLE_TICK);
            continue;
        }

        let (high_us, low_us) = split_period(period_us, duty_now);
        drive(&mut pin, true);
        timing::hold(Duration::from_micros(high_us));
        drive(&mut pin, false);
        timing::hold(Duration::from_micros(low_us));
    }

    // Fail-safe: never leave the actuator mid-waveform
    drive(&mut pin, false);
}

/// Splits one period into (high, low) hold times for a duty cycle in 1..100.
fn split_period(period_us: u64, duty: u8) -> (u64, u64) {
    let high = period_us * u64::from(duty) / 100;
    (high, period_us - high)
}

/// Drives the pin, logging rather than terminating the loop on a fault.
fn drive<P: OutputPin>(pin: &mut P, high: bool) {
    let result = if high { pin.set_high() } else { pin.set_low() };
    if let Err(e) = result {
        warn!("PWM pin write failed: {}", e);
    }
}
