//! # Input Pipeline
//!
//! Owns the controller polling loop: reads the raw event stream, maintains
//! a [`ControllerSnapshot`], and emits normalized motion values and
//! edge-triggered button presses over tokio channels.
//!
//! ## Emission rules
//!
//! - **Horizontal movement**: the normalized stick-X value, emitted
//!   whenever it moves more than the emission threshold away from the last
//!   emitted value.
//! - **Vertical movement**: right trigger minus left trigger, same
//!   threshold rule.
//! - **Button presses**: one event per released→pressed transition; holds
//!   and releases emit nothing.
//!
//! ## Connection model
//!
//! The loop runs for the pipeline's lifetime. While no pad is connected it
//! retries discovery every cycle; a read error (unplug, permission
//! revocation) closes the handle and flips back to the disconnected state.
//! Callers observe [`InputPipeline::is_connected`] — there is no error
//! storm and no thread termination on unplug.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::device::GamepadDevice;
use super::profile::{normalize_stick, DeadZone, Profile, SemanticAxis, TriggerRange};
use super::{Button, RawInputEvent};

/// Minimum change from the last emitted motion value before a new value is
/// emitted.
pub const EMIT_THRESHOLD: f64 = 0.05;

/// Capacity of each emission channel; stale values are dropped when a
/// consumer lags rather than blocking the read loop.
const CHANNEL_CAPACITY: usize = 32;

/// Bounded wait for the polling loop to acknowledge cancellation.
const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Current interpreted state of the pad.
///
/// Mutated continuously by the read loop; read once per poll cycle by the
/// emission logic.
#[derive(Debug, Clone, Default)]
pub struct ControllerSnapshot {
    /// Stick X after normalization and dead zone, in [-1, 1].
    pub stick_x: f64,
    /// Left trigger after normalization and dead zone, in [0, 1].
    pub left_trigger: f64,
    /// Right trigger after normalization and dead zone, in [0, 1].
    pub right_trigger: f64,
    /// Buttons currently held.
    pub held: HashSet<Button>,
}

/// Tuning knobs for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Dead-zone radius applied to stick and triggers.
    pub dead_zone: f64,
    /// Sleep between poll cycles, capping the polling rate.
    pub poll_interval: Duration,
    /// Sleep between discovery attempts while disconnected.
    pub reconnect_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dead_zone: 0.10,
            poll_interval: Duration::from_millis(10),
            reconnect_interval: Duration::from_millis(500),
        }
    }
}

/// What one poll cycle decided to emit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleOutput {
    /// New horizontal movement value, if it crossed the threshold.
    pub horizontal: Option<f64>,
    /// New vertical movement value, if it crossed the threshold.
    pub vertical: Option<f64>,
    /// Buttons that transitioned released→pressed this cycle.
    pub presses: Vec<Button>,
}

/// Pure interpretation and emission state machine.
///
/// Everything the pipeline does between "bytes in" and "values out" lives
/// here, with no I/O, so the protocol logic is fully unit-testable. The
/// adaptive trigger ranges are per-instance state: independent controller
/// sessions never share them.
#[derive(Debug)]
pub struct Tracker {
    profile: Profile,
    dead_zone: DeadZone,
    left_range: TriggerRange,
    right_range: TriggerRange,
    snapshot: ControllerSnapshot,
    previous_held: HashSet<Button>,
    last_horizontal: f64,
    last_vertical: f64,
}

impl Tracker {
    /// Creates a tracker for one controller session.
    #[must_use]
    pub fn new(profile: Profile, dead_zone: DeadZone) -> Self {
        let initial_max = profile.initial_trigger_max();
        Self {
            profile,
            dead_zone,
            left_range: TriggerRange::new(initial_max),
            right_range: TriggerRange::new(initial_max),
            snapshot: ControllerSnapshot::default(),
            previous_held: HashSet::new(),
            last_horizontal: 0.0,
            last_vertical: 0.0,
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &ControllerSnapshot {
        &self.snapshot
    }

    /// Applies one raw event to the snapshot.
    pub fn apply(&mut self, event: RawInputEvent) {
        match event {
            RawInputEvent::Button { code, pressed } => {
                if pressed {
                    self.snapshot.held.insert(Button(code));
                } else {
                    self.snapshot.held.remove(&Button(code));
                }
            }
            RawInputEvent::Axis { code, value } => {
                let Some((axis, raw)) = self.profile.interpret(code, value) else {
                    return;
                };
                match axis {
                    SemanticAxis::StickX => {
                        self.snapshot.stick_x = self.dead_zone.apply(normalize_stick(raw));
                    }
                    SemanticAxis::LeftTrigger => {
                        self.snapshot.left_trigger =
                            self.dead_zone.apply(self.left_range.normalize(raw));
                    }
                    SemanticAxis::RightTrigger => {
                        self.snapshot.right_trigger =
                            self.dead_zone.apply(self.right_range.normalize(raw));
                    }
                }
            }
        }
    }

    /// Runs the emission rules once over the current snapshot.
    pub fn emit_cycle(&mut self) -> CycleOutput {
        let mut output = CycleOutput::default();

        let horizontal = self.snapshot.stick_x;
        if (horizontal - self.last_horizontal).abs() > EMIT_THRESHOLD {
            self.last_horizontal = horizontal;
            output.horizontal = Some(horizontal);
        }

        let vertical =
            (self.snapshot.right_trigger - self.snapshot.left_trigger).clamp(-1.0, 1.0);
        if (vertical - self.last_vertical).abs() > EMIT_THRESHOLD {
            self.last_vertical = vertical;
            output.vertical = Some(vertical);
        }

        // Edge-triggered: only the released->pressed transition fires
        let mut presses: Vec<Button> = self
            .snapshot
            .held
            .difference(&self.previous_held)
            .copied()
            .collect();
        presses.sort();
        output.presses = presses;
        self.previous_held = self.snapshot.held.clone();

        output
    }
}

/// Receiving ends of the pipeline's emission streams.
pub struct InputEvents {
    /// Normalized horizontal movement values in [-1, 1].
    pub horizontal: mpsc::Receiver<f64>,
    /// Normalized vertical movement values in [-1, 1].
    pub vertical: mpsc::Receiver<f64>,
    /// Edge-triggered button presses.
    pub button: mpsc::Receiver<Button>,
}

/// Handle to the running controller polling loop.
pub struct InputPipeline {
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl InputPipeline {
    /// Starts the polling loop for one controller session.
    ///
    /// Discovery happens inside the loop, so this never fails at start: a
    /// pad that is not yet plugged in is simply a disconnected state until
    /// it appears.
    pub fn start(profile: Profile, config: PipelineConfig) -> (Self, InputEvents) {
        let (horizontal_tx, horizontal) = mpsc::channel(CHANNEL_CAPACITY);
        let (vertical_tx, vertical) = mpsc::channel(CHANNEL_CAPACITY);
        let (button_tx, button) = mpsc::channel(CHANNEL_CAPACITY);

        let connected = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let loop_connected = Arc::clone(&connected);
        let loop_running = Arc::clone(&running);
        // Blocking worker: each cycle blocks on one device read
        let task = tokio::task::spawn_blocking(move || {
            polling_loop(
                profile,
                config,
                loop_connected,
                loop_running,
                horizontal_tx,
                vertical_tx,
                button_tx,
            );
        });

        (
            Self {
                connected,
                running,
                task: Some(task),
            },
            InputEvents {
                horizontal,
                vertical,
                button,
            },
        )
    }

    /// Whether a pad is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Cancels the polling loop and waits (bounded) for it to exit.
    ///
    /// The loop may be parked in a blocking device read; if it does not
    /// acknowledge within a few seconds the wait is abandoned with a
    /// warning rather than blocking process exit.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            match tokio::time::timeout(STOP_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Controller polling loop stopped"),
                Ok(Err(e)) => warn!("Controller polling loop panicked during shutdown: {}", e),
                Err(_) => warn!(
                    "Controller polling loop did not stop within {:?}, proceeding",
                    STOP_TIMEOUT
                ),
            }
        }
    }
}

impl Drop for InputPipeline {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// The controller polling loop.
///
/// One blocking read per cycle, a short sleep to cap the polling rate, and
/// transparent rediscovery whenever the device goes away.
fn polling_loop(
    profile: Profile,
    config: PipelineConfig,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    horizontal_tx: mpsc::Sender<f64>,
    vertical_tx: mpsc::Sender<f64>,
    button_tx: mpsc::Sender<Button>,
) {
    let dead_zone = DeadZone::new(config.dead_zone);
    let mut device: Option<GamepadDevice> = None;
    let mut tracker = Tracker::new(profile, dead_zone);

    while running.load(Ordering::Relaxed) {
        let Some(pad) = device.as_mut() else {
            match GamepadDevice::open() {
                Ok(pad) => {
                    info!(
                        "Controller connected: {} at {}",
                        pad.name().unwrap_or("<unnamed>"),
                        pad.device_path()
                    );
                    // Fresh session: previous axis/button state is stale
                    tracker = Tracker::new(profile, dead_zone);
                    device = Some(pad);
                    connected.store(true, Ordering::Relaxed);
                }
                Err(e) => {
                    trace!("Controller discovery failed: {}", e);
                    connected.store(false, Ordering::Relaxed);
                    crate::hw::timing::hold(config.reconnect_interval);
                }
            }
            continue;
        };

        match pad.fetch_events() {
            Ok(events) => {
                for event in events {
                    tracker.apply(event);
                }
                let output = tracker.emit_cycle();
                forward(&output, &horizontal_tx, &vertical_tx, &button_tx);
            }
            Err(e) => {
                warn!("Controller read failed, reconnecting: {}", e);
                device = None;
                connected.store(false, Ordering::Relaxed);
                continue;
            }
        }

        crate::hw::timing::hold(config.poll_interval);
    }

    connected.store(false, Ordering::Relaxed);
    debug!("Controller polling loop exited");
}

/// Pushes one cycle's output into the emission channels.
///
/// A lagging consumer drops values instead of stalling the read loop; a
/// closed channel just means nobody is listening to that stream.
fn forward(
    output: &CycleOutput,
    horizontal_tx: &mpsc::Sender<f64>,
    vertical_tx: &mpsc::Sender<f64>,
    button_tx: &mpsc::Sender<Button>,
) {
    if let Some(value) = output.horizontal {
        if horizontal_tx.try_send(value).is_err() {
            trace!("Dropped horizontal movement value {}", value);
        }
    }
    if let Some(value) = output.vertical {
        if vertical_tx.try_send(value).is_err() {
            trace!("Dropped vertical movement value {}", value);
        }
    }
    for &press in &output.presses {
        if button_tx.try_send(press).is_err() {
            trace!("Dropped button press {:?}", press);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABS_X: u16 = 0;
    const ABS_Z: u16 = 2;
    const ABS_RZ: u16 = 5;

    fn tracker() -> Tracker {
        Tracker::new(Profile::Xbox360, DeadZone::new(0.10))
    }

    fn axis(code: u16, value: i32) -> RawInputEvent {
        RawInputEvent::Axis { code, value }
    }

    fn press(code: u16) -> RawInputEvent {
        RawInputEvent::Button {
            code,
            pressed: true,
        }
    }

    fn release(code: u16) -> RawInputEvent {
        RawInputEvent::Button {
            code,
            pressed: false,
        }
    }

    // ==================== Snapshot Tests ====================

    #[test]
    fn test_snapshot_starts_neutral() {
        let t = tracker();
        assert_eq!(t.snapshot().stick_x, 0.0);
        assert_eq!(t.snapshot().left_trigger, 0.0);
        assert_eq!(t.snapshot().right_trigger, 0.0);
        assert!(t.snapshot().held.is_empty());
    }

    #[test]
    fn test_stick_event_updates_snapshot() {
        let mut t = tracker();
        t.apply(axis(ABS_X, 32_767));
        assert!((t.snapshot().stick_x - 1.0).abs() < 1e-9);

        t.apply(axis(ABS_X, -32_767));
        assert!((t.snapshot().stick_x - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_stick_dead_zone_suppresses_drift() {
        let mut t = tracker();
        // ~2% deflection sits inside the 10% dead zone
        t.apply(axis(ABS_X, 700));
        assert_eq!(t.snapshot().stick_x, 0.0);
    }

    #[test]
    fn test_trigger_events_update_snapshot() {
        let mut t = tracker();
        t.apply(axis(ABS_Z, 255));
        t.apply(axis(ABS_RZ, 128));
        assert!((t.snapshot().left_trigger - 1.0).abs() < 1e-9);
        assert!(t.snapshot().right_trigger > 0.0 && t.snapshot().right_trigger < 1.0);
    }

    #[test]
    fn test_unmapped_axis_leaves_snapshot_unchanged() {
        let mut t = tracker();
        t.apply(axis(16, 1)); // d-pad
        assert_eq!(t.snapshot().stick_x, 0.0);
    }

    #[test]
    fn test_buttons_tracked_in_held_set() {
        let mut t = tracker();
        t.apply(press(Button::SOUTH.0));
        t.apply(press(Button::EAST.0));
        assert_eq!(t.snapshot().held.len(), 2);

        t.apply(release(Button::SOUTH.0));
        assert!(!t.snapshot().held.contains(&Button::SOUTH));
        assert!(t.snapshot().held.contains(&Button::EAST));
    }

    // ==================== Adaptive Range Integration ====================

    #[test]
    fn test_oversized_trigger_value_snaps_range_tier() {
        let mut t = tracker();
        // 360 profile assumes 255; a 600 report snaps the max to 1023
        t.apply(axis(ABS_Z, 600));
        let after_snap = t.snapshot().left_trigger;
        assert!(after_snap < 1.0, "600/1023 must not normalize as full press");

        // The right trigger keeps its own independent range
        t.apply(axis(ABS_RZ, 255));
        assert!((t.snapshot().right_trigger - 1.0).abs() < 1e-9);
    }

    // ==================== Emission Threshold Tests ====================

    #[test]
    fn test_first_cycle_with_neutral_state_emits_nothing() {
        let mut t = tracker();
        assert_eq!(t.emit_cycle(), CycleOutput::default());
    }

    #[test]
    fn test_horizontal_emitted_only_past_threshold() {
        let mut t = tracker();
        t.apply(axis(ABS_X, 32_767));
        let out = t.emit_cycle();
        assert_eq!(out.horizontal, Some(t.snapshot().stick_x));

        // A tiny wiggle below the threshold emits nothing
        t.apply(axis(ABS_X, 32_000));
        assert_eq!(t.emit_cycle().horizontal, None);

        // Returning to center crosses the threshold again
        t.apply(axis(ABS_X, 0));
        assert_eq!(t.emit_cycle().horizontal, Some(0.0));
    }

    #[test]
    fn test_vertical_is_right_minus_left() {
        let mut t = tracker();
        t.apply(axis(ABS_RZ, 255));
        let out = t.emit_cycle();
        assert!((out.vertical.unwrap() - 1.0).abs() < 1e-9);

        t.apply(axis(ABS_Z, 255));
        let out = t.emit_cycle();
        assert!((out.vertical.unwrap() - 0.0).abs() < 1e-9, "full both = no net motion");
    }

    #[test]
    fn test_vertical_not_reemitted_below_threshold() {
        let mut t = tracker();
        t.apply(axis(ABS_RZ, 255));
        assert!(t.emit_cycle().vertical.is_some());
        // No change: nothing new to emit
        assert_eq!(t.emit_cycle().vertical, None);
    }

    // ==================== Button Edge Tests ====================

    #[test]
    fn test_button_held_across_cycles_emits_once() {
        let mut t = tracker();
        t.apply(press(Button::SOUTH.0));

        let first = t.emit_cycle();
        assert_eq!(first.presses, vec![Button::SOUTH]);

        // Still held on the next poll: no second event
        let second = t.emit_cycle();
        assert!(second.presses.is_empty());
    }

    #[test]
    fn test_release_emits_nothing() {
        let mut t = tracker();
        t.apply(press(Button::SOUTH.0));
        t.emit_cycle();

        t.apply(release(Button::SOUTH.0));
        let out = t.emit_cycle();
        assert!(out.presses.is_empty());
    }

    #[test]
    fn test_repress_after_release_emits_again() {
        let mut t = tracker();
        t.apply(press(Button::SOUTH.0));
        t.emit_cycle();
        t.apply(release(Button::SOUTH.0));
        t.emit_cycle();

        t.apply(press(Button::SOUTH.0));
        assert_eq!(t.emit_cycle().presses, vec![Button::SOUTH]);
    }

    #[test]
    fn test_press_and_release_within_one_cycle_is_missed() {
        // The snapshot is sampled once per cycle; a sub-cycle tap that is
        // already released at sampling time produces no event.
        let mut t = tracker();
        t.apply(press(Button::SOUTH.0));
        t.apply(release(Button::SOUTH.0));
        assert!(t.emit_cycle().presses.is_empty());
    }

    #[test]
    fn test_multiple_new_presses_in_one_cycle() {
        let mut t = tracker();
        t.apply(press(Button::SOUTH.0));
        t.apply(press(Button::START.0));
        let out = t.emit_cycle();
        assert_eq!(out.presses, vec![Button::SOUTH, Button::START]);
    }

    // ==================== Pipeline Lifecycle Tests ====================

    #[tokio::test]
    async fn test_pipeline_starts_disconnected_and_stops_bounded() {
        let (pipeline, _events) =
            InputPipeline::start(Profile::Xbox360, PipelineConfig::default());

        // No pad in the test environment: stays a polled disconnected state
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pipeline.is_connected());

        let start = std::time::Instant::now();
        pipeline.stop().await;
        assert!(start.elapsed() < STOP_TIMEOUT + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_forward_drops_when_receivers_closed() {
        let (horizontal_tx, horizontal_rx) = mpsc::channel(1);
        let (vertical_tx, vertical_rx) = mpsc::channel(1);
        let (button_tx, button_rx) = mpsc::channel(1);
        drop(horizontal_rx);
        drop(vertical_rx);
        drop(button_rx);

        let output = CycleOutput {
            horizontal: Some(0.5),
            vertical: Some(-0.5),
            presses: vec![Button::SOUTH],
        };
        // Must not panic or block with closed receivers
        forward(&output, &horizontal_tx, &vertical_tx, &button_tx);
    }
}
