//! Tracker quality and hints.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::CameraPose;

/// Tracker confidence in the reported pose, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PoseAccuracy {
    /// No pose could be computed.
    #[default]
    NotAvailable,
    /// Pose is barely usable.
    VeryLow,
    /// Pose is unreliable.
    Low,
    /// Pose is good enough for keyframes.
    Approximate,
    /// Pose is good enough for volume integration.
    High,
}

impl PoseAccuracy {
    /// Whether this accuracy meets `threshold`.
    #[must_use]
    pub fn is_at_least(self, threshold: Self) -> bool {
        self >= threshold
    }

    /// Opacity used to render the live mesh at this accuracy.
    #[must_use]
    pub const fn mesh_alpha(self) -> f32 {
        match self {
            Self::High | Self::Approximate => 0.8,
            Self::Low => 0.4,
            Self::VeryLow | Self::NotAvailable => 0.1,
        }
    }
}

/// Problems the tracker noticed on the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackerHints {
    /// Tracking failed; the user has to realign.
    pub tracker_is_lost: bool,
    /// The scanned object left the field of view.
    pub model_out_of_view: bool,
    /// The camera is closer than the sensor can measure.
    pub scene_is_too_close: bool,
}

impl TrackerHints {
    /// User-facing guidance for the most severe hint, if any.
    #[must_use]
    pub const fn message(&self) -> Option<&'static str> {
        if self.tracker_is_lost {
            Some("Tracking lost. Realign with the model or restart the scan.")
        } else if self.model_out_of_view {
            Some("Move the model back into view.")
        } else if self.scene_is_too_close {
            Some("Too close to the scene. Step back.")
        } else {
            None
        }
    }
}

/// Output of one tracker update.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackingUpdate {
    /// Estimated camera pose.
    pub pose: CameraPose,
    /// Confidence in `pose`.
    pub accuracy: PoseAccuracy,
    /// Tracker hints for user feedback.
    pub hints: TrackerHints,
}
