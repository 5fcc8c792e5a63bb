//! # Rover HAL
//!
//! Demo binary wiring the four hardware subsystems together: gamepad
//! motion drives the PWM channel and the LED bar, while the range finder
//! is polled for obstacle distance.
//!
//! This binary is a thin consumer of the library core; all command logic
//! beyond "show that the hardware works" belongs to higher layers.

use anyhow::Result;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use rover_hal::config::Config;
use rover_hal::controller::pipeline::{InputPipeline, PipelineConfig};
use rover_hal::controller::profile::Profile;
use rover_hal::hw::linux;
use rover_hal::led::{LedDriver, LedFrame, LED_CHANNELS};
use rover_hal::pwm::SoftPwm;
use rover_hal::ranger::Ranger;

/// How often the range finder is polled.
const RANGE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Main entry point for the Rover HAL demo
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (path from the first argument, or
///      `config/default.toml`)
///    - Request GPIO lines, open the I2C bus, start the PWM loop and the
///      controller pipeline
///
/// 2. **Main Loop**
///    - Map horizontal/vertical motion values to PWM duty and LED level
///    - Log button presses and periodic distance readings
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop the PWM and controller loops (bounded waits)
///    - Disable the LED output stage
///
/// # Errors
///
/// Returns error if configuration is invalid or any hardware resource
/// cannot be acquired at startup.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("Rover HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    // Hardware resources: construction-time faults are fatal
    let trigger = linux::request_output(&config.gpio.chip, config.ranger.trigger_pin)?;
    let echo = linux::request_input(&config.gpio.chip, config.ranger.echo_pin)?;
    let mut ranger = Ranger::new(trigger, echo);
    let range_timeout = Duration::from_millis(config.ranger.timeout_ms);
    let range_samples = config.ranger.samples;

    let bus = linux::open_i2c(&config.led.bus, config.led.address)?;
    let mut leds = LedDriver::new(bus);
    leds.initialize()?;

    let pwm_pin = linux::request_output(&config.gpio.chip, config.pwm.pin)?;
    let pwm = SoftPwm::spawn(pwm_pin, config.pwm.frequency_hz)?;

    let profile = Profile::from_name(&config.controller.profile)
        .ok_or_else(|| anyhow::anyhow!("unknown controller profile: {}", config.controller.profile))?;
    let (pipeline, mut events) = InputPipeline::start(
        profile,
        PipelineConfig {
            dead_zone: config.controller.dead_zone,
            poll_interval: Duration::from_millis(config.controller.poll_interval_ms),
            reconnect_interval: Duration::from_millis(config.controller.reconnect_interval_ms),
        },
    );

    let mut range_tick = interval(RANGE_POLL_INTERVAL);
    info!("Hardware core running; press Ctrl+C to exit");

    // Main control loop
    loop {
        tokio::select! {
            Some(horizontal) = events.horizontal.recv() => {
                info!("Horizontal movement: {:+.2}", horizontal);
            }

            Some(vertical) = events.vertical.recv() => {
                // Motion magnitude drives the demo actuator and the LEDs
                let duty = (vertical.abs() * 100.0).round() as u8;
                pwm.set_duty_cycle(duty);

                let mut frame = LedFrame::new();
                frame.fill((vertical.abs() * 255.0).round() as u8);
                if let Err(e) = leds.output(&frame) {
                    // Post-init bus faults are retryable; next update retries
                    warn!("LED update failed: {}", e);
                }
                info!("Vertical movement: {:+.2} -> duty {}%", vertical, duty);
            }

            Some(button) = events.button.recv() => {
                info!("Button pressed: {:?}", button);
            }

            _ = range_tick.tick() => {
                // The edge waits busy-poll; keep them off the async workers
                let distance = tokio::task::block_in_place(|| {
                    ranger.read_distance(range_timeout, range_samples)
                })?;
                if distance > 0.0 {
                    info!("Obstacle at {:.1} cm (connected: {})", distance, pipeline.is_connected());
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    // Bounded stops; outputs are forced to their safe level
    pwm.stop().await;
    pipeline.stop().await;
    if let Err(e) = leds.fill(0) {
        warn!("Failed to blank LEDs on shutdown: {}", e);
    }
    if let Err(e) = leds.disable_output() {
        warn!("Failed to disable LED output on shutdown: {}", e);
    }

    info!("Shutdown complete ({} LED channels parked)", LED_CHANNELS);
    Ok(())
}
