//! # Controller Input Pipeline
//!
//! Gamepad input handling for the rover.
//!
//! This module handles:
//! - Gamepad discovery and connection via evdev
//! - Reading the raw binary event stream
//! - Per-generation axis interpretation ([`profile`])
//! - Adaptive trigger ranges, dead-zone filtering and normalization
//! - Emitting motion values and edge-triggered button presses ([`pipeline`])
//! - Transparent reconnection when the device disappears

pub mod device;
pub mod pipeline;
pub mod profile;

/// One parsed record from the device's binary event stream.
///
/// The evdev boundary translates kernel events into this form so everything
/// above it is independent of the platform input API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInputEvent {
    /// A digital button changed state.
    Button {
        /// evdev key code (e.g. 304 for BTN_SOUTH).
        code: u16,
        /// `true` on press, `false` on release.
        pressed: bool,
    },
    /// An absolute axis reported a new position.
    Axis {
        /// evdev absolute-axis code (e.g. 0 for ABS_X).
        code: u16,
        /// Raw axis value in the device's native range.
        value: i32,
    },
}

/// Identifier of one gamepad button, by evdev key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Button(pub u16);

impl Button {
    /// BTN_SOUTH — the "A" button on Xbox-family pads.
    pub const SOUTH: Button = Button(304);
    /// BTN_EAST — the "B" button.
    pub const EAST: Button = Button(305);
    /// BTN_NORTH — the "X" button (xpad ordering).
    pub const NORTH: Button = Button(307);
    /// BTN_WEST — the "Y" button (xpad ordering).
    pub const WEST: Button = Button(308);
    /// BTN_START.
    pub const START: Button = Button(315);
}
