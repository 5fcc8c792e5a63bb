//! # Controller Profiles
//!
//! Per-hardware-generation interpretation of raw axis codes, plus the
//! normalization and dead-zone machinery shared by all generations.
//!
//! ## Axis layouts
//!
//! | Generation | Stick X | Left trigger | Right trigger | Trigger range |
//! |------------|---------|--------------|---------------|---------------|
//! | Xbox 360 (xpad) | ABS_X (0) | ABS_Z (2) | ABS_RZ (5) | 0..255 |
//! | Xbox One | ABS_X (0) | ABS_BRAKE (10) | ABS_GAS (9) | 0..1023 |
//!
//! Some Xbox One firmware/transport combinations report the triggers on the
//! 360 axis codes, sometimes with a wider range, so that profile accepts
//! both code sets and leans on [`TriggerRange`] to adapt.
//!
//! ## Adaptive trigger range
//!
//! When an observed raw value exceeds the assumed maximum, the maximum
//! snaps up to the next known tier (255 → 1023 → 65535) instead of growing
//! continuously. Snapping avoids oscillating normalization while new peak
//! values arrive during the first few presses. The range state lives per
//! pipeline instance, so independent controller sessions never interfere.

/// Semantic channels a profile can map an axis code onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticAxis {
    /// Horizontal stick deflection, normalized to [-1, 1].
    StickX,
    /// Left analog trigger, normalized to [0, 1].
    LeftTrigger,
    /// Right analog trigger, normalized to [0, 1].
    RightTrigger,
}

/// Closed set of supported controller hardware generations.
///
/// Selected by configuration, never auto-detected. Adding a generation
/// means adding a variant here, not editing a shared branch elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Xbox 360 pads via the kernel xpad driver: 8-bit triggers.
    Xbox360,
    /// Xbox One pads: 10-bit triggers, tolerant of 360-style reporting.
    XboxOne,
}

// evdev absolute-axis codes
const ABS_X: u16 = 0;
const ABS_Z: u16 = 2;
const ABS_RZ: u16 = 5;
const ABS_GAS: u16 = 9;
const ABS_BRAKE: u16 = 10;

/// Full deflection of an xpad stick axis.
pub const STICK_RAW_MAX: i32 = 32_767;

/// Known trigger maxima, from 8-bit through 16-bit reporting.
pub const TRIGGER_TIERS: [i32; 3] = [255, 1023, 65_535];

impl Profile {
    /// Parses a profile name from configuration (`"xbox360"` / `"xboxone"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "xbox360" => Some(Self::Xbox360),
            "xboxone" => Some(Self::XboxOne),
            _ => None,
        }
    }

    /// Maps one raw axis event onto a semantic channel.
    ///
    /// Pure: no state is read or written. Returns `None` for axis codes the
    /// profile does not use (d-pad, gyro and the like).
    #[must_use]
    pub fn interpret(&self, code: u16, value: i32) -> Option<(SemanticAxis, i32)> {
        match (self, code) {
            (_, ABS_X) => Some((SemanticAxis::StickX, value)),
            (Profile::Xbox360, ABS_Z) => Some((SemanticAxis::LeftTrigger, value)),
            (Profile::Xbox360, ABS_RZ) => Some((SemanticAxis::RightTrigger, value)),
            (Profile::XboxOne, ABS_BRAKE | ABS_Z) => Some((SemanticAxis::LeftTrigger, value)),
            (Profile::XboxOne, ABS_GAS | ABS_RZ) => Some((SemanticAxis::RightTrigger, value)),
            _ => None,
        }
    }

    /// The trigger maximum this generation nominally reports.
    #[must_use]
    pub fn initial_trigger_max(&self) -> i32 {
        match self {
            Profile::Xbox360 => 255,
            Profile::XboxOne => 1023,
        }
    }
}

/// Adaptive maximum for one analog trigger.
#[derive(Debug, Clone, Copy)]
pub struct TriggerRange {
    assumed_max: i32,
}

impl TriggerRange {
    /// Starts from the profile's nominal maximum.
    #[must_use]
    pub fn new(initial_max: i32) -> Self {
        Self {
            assumed_max: initial_max.max(1),
        }
    }

    /// The currently assumed raw maximum.
    #[must_use]
    pub fn assumed_max(&self) -> i32 {
        self.assumed_max
    }

    /// Normalizes a raw trigger value into [0, 1], snapping the assumed
    /// maximum up a tier first when the value exceeds it.
    pub fn normalize(&mut self, raw: i32) -> f64 {
        if raw > self.assumed_max {
            self.assumed_max = TRIGGER_TIERS
                .iter()
                .copied()
                .find(|&tier| tier >= raw)
                .unwrap_or(TRIGGER_TIERS[TRIGGER_TIERS.len() - 1]);
        }
        (f64::from(raw.max(0)) / f64::from(self.assumed_max)).clamp(0.0, 1.0)
    }
}

/// Normalizes a signed stick axis value into [-1, 1].
#[must_use]
pub fn normalize_stick(raw: i32) -> f64 {
    (f64::from(raw) / f64::from(STICK_RAW_MAX)).clamp(-1.0, 1.0)
}

/// Dead-zone filter with boundary rescaling.
///
/// Magnitudes below the radius snap to zero; magnitudes above it are
/// rescaled so the remaining travel still spans the full output range —
/// the output is continuous at the boundary instead of jumping.
#[derive(Debug, Clone, Copy)]
pub struct DeadZone {
    radius: f64,
}

impl Default for DeadZone {
    fn default() -> Self {
        Self::new(0.10)
    }
}

impl DeadZone {
    /// Creates a dead zone with the given radius, clamped to [0, 0.5].
    #[must_use]
    pub fn new(radius: f64) -> Self {
        Self {
            radius: radius.clamp(0.0, 0.5),
        }
    }

    /// The configured radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Applies the dead zone to a normalized value in [-1, 1] (or [0, 1]).
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        let magnitude = value.abs();
        if magnitude <= self.radius {
            return 0.0;
        }
        let rescaled = (magnitude - self.radius) / (1.0 - self.radius);
        rescaled.min(1.0) * value.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Profile Interpretation Tests ====================

    #[test]
    fn test_stick_x_mapped_on_both_profiles() {
        for profile in [Profile::Xbox360, Profile::XboxOne] {
            assert_eq!(
                profile.interpret(ABS_X, 1000),
                Some((SemanticAxis::StickX, 1000))
            );
        }
    }

    #[test]
    fn test_xbox360_trigger_codes() {
        let p = Profile::Xbox360;
        assert_eq!(p.interpret(ABS_Z, 200), Some((SemanticAxis::LeftTrigger, 200)));
        assert_eq!(p.interpret(ABS_RZ, 50), Some((SemanticAxis::RightTrigger, 50)));
        // Xbox One trigger codes are not part of this generation
        assert_eq!(p.interpret(ABS_GAS, 50), None);
        assert_eq!(p.interpret(ABS_BRAKE, 50), None);
    }

    #[test]
    fn test_xboxone_accepts_both_trigger_code_sets() {
        let p = Profile::XboxOne;
        assert_eq!(p.interpret(ABS_BRAKE, 512), Some((SemanticAxis::LeftTrigger, 512)));
        assert_eq!(p.interpret(ABS_GAS, 512), Some((SemanticAxis::RightTrigger, 512)));
        assert_eq!(p.interpret(ABS_Z, 512), Some((SemanticAxis::LeftTrigger, 512)));
        assert_eq!(p.interpret(ABS_RZ, 512), Some((SemanticAxis::RightTrigger, 512)));
    }

    #[test]
    fn test_unmapped_axes_ignored() {
        // ABS_HAT0X (d-pad) is 16
        assert_eq!(Profile::Xbox360.interpret(16, 1), None);
        assert_eq!(Profile::XboxOne.interpret(16, -1), None);
    }

    #[test]
    fn test_profile_from_name() {
        assert_eq!(Profile::from_name("xbox360"), Some(Profile::Xbox360));
        assert_eq!(Profile::from_name("XboxOne"), Some(Profile::XboxOne));
        assert_eq!(Profile::from_name("dualsense"), None);
    }

    #[test]
    fn test_initial_trigger_max_per_generation() {
        assert_eq!(Profile::Xbox360.initial_trigger_max(), 255);
        assert_eq!(Profile::XboxOne.initial_trigger_max(), 1023);
    }

    // ==================== Adaptive Range Tests ====================

    #[test]
    fn test_adaptive_max_snaps_to_tier_not_observed_value() {
        let mut range = TriggerRange::new(255);
        range.normalize(600);
        assert_eq!(range.assumed_max(), 1023, "snaps to the tier, not to 600");
    }

    #[test]
    fn test_adaptive_max_snaps_through_all_tiers() {
        let mut range = TriggerRange::new(255);
        range.normalize(300);
        assert_eq!(range.assumed_max(), 1023);
        range.normalize(40_000);
        assert_eq!(range.assumed_max(), 65_535);
    }

    #[test]
    fn test_adaptive_max_never_shrinks() {
        let mut range = TriggerRange::new(255);
        range.normalize(600);
        range.normalize(10);
        assert_eq!(range.assumed_max(), 1023);
    }

    #[test]
    fn test_value_beyond_top_tier_is_clamped() {
        let mut range = TriggerRange::new(255);
        let value = range.normalize(70_000);
        assert_eq!(range.assumed_max(), 65_535);
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_normalize_within_assumed_max() {
        let mut range = TriggerRange::new(255);
        assert!((range.normalize(255) - 1.0).abs() < 1e-9);
        assert!((range.normalize(128) - 128.0 / 255.0).abs() < 1e-9);
        assert_eq!(range.normalize(0), 0.0);
    }

    #[test]
    fn test_negative_raw_clamps_to_zero() {
        let mut range = TriggerRange::new(255);
        assert_eq!(range.normalize(-5), 0.0);
    }

    // ==================== Stick Normalization Tests ====================

    #[test]
    fn test_normalize_stick_endpoints() {
        assert!((normalize_stick(32_767) - 1.0).abs() < 1e-9);
        assert!((normalize_stick(-32_768) - (-1.0)).abs() < 1e-3);
        assert_eq!(normalize_stick(0), 0.0);
    }

    #[test]
    fn test_normalize_stick_clamps() {
        assert_eq!(normalize_stick(40_000), 1.0);
    }

    // ==================== Dead Zone Tests ====================

    #[test]
    fn test_dead_zone_inside_radius_is_exactly_zero() {
        let dz = DeadZone::new(0.1);
        assert_eq!(dz.apply(0.05), 0.0);
        assert_eq!(dz.apply(-0.05), 0.0);
        assert_eq!(dz.apply(0.1), 0.0);
    }

    #[test]
    fn test_dead_zone_continuous_at_boundary() {
        let dz = DeadZone::new(0.1);
        // Just past the boundary the output is barely above zero, not a jump
        let just_outside = dz.apply(0.1 + 1e-6);
        assert!(just_outside > 0.0 && just_outside < 1e-4);
    }

    #[test]
    fn test_dead_zone_preserves_full_deflection() {
        let dz = DeadZone::new(0.1);
        assert!((dz.apply(1.0) - 1.0).abs() < 1e-9);
        assert!((dz.apply(-1.0) - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_dead_zone_rescales_remaining_range() {
        let dz = DeadZone::new(0.1);
        // Halfway between radius and full deflection maps to 0.5
        assert!((dz.apply(0.55) - 0.5).abs() < 1e-9);
        assert!((dz.apply(-0.55) - (-0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_dead_zone_radius_clamped() {
        assert_eq!(DeadZone::new(0.9).radius(), 0.5);
        assert_eq!(DeadZone::new(-0.1).radius(), 0.0);
    }
}
