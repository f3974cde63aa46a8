//! Thresholds for keyframe selection.

use scan_types::PoseAccuracy;
use serde::{Deserialize, Serialize};

use crate::error::{KeyframeError, Result};

/// Thresholds that decide whether a tracked frame becomes a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyframePolicy {
    /// A candidate is "too similar" to a keyframe when it is within this
    /// rotation (degrees) and within `max_delta_translation_m`. Default: 20
    pub max_delta_rotation_deg: f32,

    /// Translation half of the similarity test, in meters. Default: 0.3
    pub max_delta_translation_m: f32,

    /// Candidates moving at or above this angular speed are rejected as
    /// blurry. Default: 3 deg/s
    pub max_angular_speed_deg_per_sec: f32,

    /// Minimum tracker accuracy for a candidate. Default: `Approximate`
    pub min_accuracy: PoseAccuracy,

    /// Keyframe store capacity. Default: 48
    pub max_keyframes: usize,
}

impl Default for KeyframePolicy {
    fn default() -> Self {
        Self {
            max_delta_rotation_deg: 20.0,
            max_delta_translation_m: 0.3,
            max_angular_speed_deg_per_sec: 3.0,
            min_accuracy: PoseAccuracy::Approximate,
            max_keyframes: 48,
        }
    }
}

impl KeyframePolicy {
    /// Dense coverage: smaller spacing between keyframes and a larger store.
    #[must_use]
    pub fn dense() -> Self {
        Self {
            max_delta_rotation_deg: 10.0,
            max_delta_translation_m: 0.15,
            max_keyframes: 96,
            ..Self::default()
        }
    }

    /// Set the similarity rotation threshold.
    #[must_use]
    pub const fn with_max_delta_rotation_deg(mut self, degrees: f32) -> Self {
        self.max_delta_rotation_deg = degrees;
        self
    }

    /// Set the similarity translation threshold.
    #[must_use]
    pub const fn with_max_delta_translation_m(mut self, meters: f32) -> Self {
        self.max_delta_translation_m = meters;
        self
    }

    /// Set the angular speed limit.
    #[must_use]
    pub const fn with_max_angular_speed(mut self, deg_per_sec: f32) -> Self {
        self.max_angular_speed_deg_per_sec = deg_per_sec;
        self
    }

    /// Set the minimum accuracy.
    #[must_use]
    pub const fn with_min_accuracy(mut self, accuracy: PoseAccuracy) -> Self {
        self.min_accuracy = accuracy;
        self
    }

    /// Set the keyframe store capacity.
    #[must_use]
    pub const fn with_max_keyframes(mut self, count: usize) -> Self {
        self.max_keyframes = count;
        self
    }

    /// Check that every threshold is finite and positive.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::InvalidPolicy`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("max_delta_rotation_deg", self.max_delta_rotation_deg),
            ("max_delta_translation_m", self.max_delta_translation_m),
            (
                "max_angular_speed_deg_per_sec",
                self.max_angular_speed_deg_per_sec,
            ),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(KeyframeError::invalid_policy(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if self.max_keyframes == 0 {
            return Err(KeyframeError::invalid_policy(
                "max_keyframes must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = KeyframePolicy::default();
        assert_eq!(policy.max_delta_rotation_deg, 20.0);
        assert_eq!(policy.max_delta_translation_m, 0.3);
        assert_eq!(policy.max_angular_speed_deg_per_sec, 3.0);
        assert_eq!(policy.min_accuracy, PoseAccuracy::Approximate);
        assert_eq!(policy.max_keyframes, 48);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn builders() {
        let policy = KeyframePolicy::default()
            .with_max_angular_speed(6.0)
            .with_max_keyframes(10)
            .with_min_accuracy(PoseAccuracy::High);
        assert_eq!(policy.max_angular_speed_deg_per_sec, 6.0);
        assert_eq!(policy.max_keyframes, 10);
        assert_eq!(policy.min_accuracy, PoseAccuracy::High);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(
            KeyframePolicy::default()
                .with_max_delta_rotation_deg(f32::NAN)
                .validate()
                .is_err()
        );
        assert!(
            KeyframePolicy::default()
                .with_max_angular_speed(0.0)
                .validate()
                .is_err()
        );
        assert!(
            KeyframePolicy::default()
                .with_max_keyframes(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let policy: KeyframePolicy =
            serde_json::from_str(r#"{ "max_keyframes": 12 }"#).unwrap();
        assert_eq!(policy.max_keyframes, 12);
        assert_eq!(policy.max_delta_rotation_deg, 20.0);
    }
}
