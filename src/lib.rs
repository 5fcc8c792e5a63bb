//! # Rover HAL Library
//!
//! Real-time hardware I/O core for a small wheeled robot controller.
//!
//! This library provides the four hardware-facing subsystems the rest of
//! the robot builds on: a software PWM signal generator, an 18-channel I2C
//! LED driver, an ultrasonic range finder, and a gamepad input pipeline.
//! Higher layers (remote control, command façades) are thin consumers of
//! these components and live elsewhere.
//!
//! All timing here is best-effort soft real time: the crate runs as an
//! ordinary process with no hardware interrupts, and the accuracy contract
//! is documented at the [`hw::timing`] seam.

pub mod config;
pub mod controller;
pub mod error;
pub mod hw;
pub mod led;
pub mod pwm;
pub mod ranger;
