//! The keyframe acceptance rule.

use scan_types::{CameraPose, PoseAccuracy};

use crate::motion::{delta_rotation_degrees, delta_translation_m};
use crate::policy::KeyframePolicy;

/// Smallest timestamp gap used for angular speed, in seconds.
///
/// Duplicate or out-of-order timestamps are treated as this gap, so any
/// rotation between them reads as very fast motion.
pub const MIN_TIMESTAMP_DELTA: f64 = 1e-3;

/// A tracked frame offered as a keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyframeCandidate {
    /// Tracked camera pose.
    pub pose: CameraPose,
    /// Tracker accuracy for `pose`.
    pub accuracy: PoseAccuracy,
    /// Capture time in seconds.
    pub timestamp: f64,
}

/// The tracked frame preceding a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousFrame {
    /// Pose of the previous frame.
    pub pose: CameraPose,
    /// Capture time in seconds.
    pub timestamp: f64,
}

/// Why a candidate was not kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Tracker accuracy below the policy minimum.
    LowAccuracy {
        /// Reported accuracy.
        accuracy: PoseAccuracy,
    },
    /// The keyframe store is at capacity.
    StoreFull {
        /// Store capacity.
        capacity: usize,
    },
    /// An existing keyframe already covers this viewpoint.
    TooSimilar {
        /// Index of the matching keyframe.
        keyframe: usize,
        /// Rotation to that keyframe in degrees.
        rotation_deg: f32,
        /// Translation to that keyframe in meters.
        translation_m: f32,
    },
    /// The camera was turning too fast for a sharp image.
    TooFast {
        /// Measured angular speed in degrees per second.
        angular_speed: f64,
    },
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyframeDecision {
    /// Keep the candidate.
    Accept,
    /// Drop the candidate.
    Reject(RejectReason),
}

impl KeyframeDecision {
    /// Whether the candidate was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// The rejection reason, if any.
    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accept => None,
            Self::Reject(reason) => Some(*reason),
        }
    }
}

/// Decide whether `candidate` becomes a keyframe.
///
/// Rules, in order:
///
/// 1. Accuracy below `policy.min_accuracy` is rejected with no motion
///    analysis.
/// 2. A full store rejects everything.
/// 3. A candidate within both the rotation and the translation threshold
///    of an existing keyframe is rejected as too similar.
/// 4. With no previous frame (first candidate of the session) the
///    candidate is accepted.
/// 5. Angular speed is the rotation from the previous frame divided by
///    `max(dt, MIN_TIMESTAMP_DELTA)`; at or above the limit it is
///    rejected, otherwise accepted.
///
/// This is a pure function; [`crate::KeyframeGate`] keeps the state
/// between calls.
#[must_use]
pub fn evaluate(
    candidate: &KeyframeCandidate,
    previous: Option<&PreviousFrame>,
    keyframe_poses: &[CameraPose],
    policy: &KeyframePolicy,
) -> KeyframeDecision {
    if !candidate.accuracy.is_at_least(policy.min_accuracy) {
        return KeyframeDecision::Reject(RejectReason::LowAccuracy {
            accuracy: candidate.accuracy,
        });
    }

    if keyframe_poses.len() >= policy.max_keyframes {
        return KeyframeDecision::Reject(RejectReason::StoreFull {
            capacity: policy.max_keyframes,
        });
    }

    for (index, pose) in keyframe_poses.iter().enumerate() {
        let rotation_deg = delta_rotation_degrees(pose, &candidate.pose);
        let translation_m = delta_translation_m(pose, &candidate.pose);
        if rotation_deg < policy.max_delta_rotation_deg
            && translation_m < policy.max_delta_translation_m
        {
            return KeyframeDecision::Reject(RejectReason::TooSimilar {
                keyframe: index,
                rotation_deg,
                translation_m,
            });
        }
    }

    let Some(previous) = previous else {
        return KeyframeDecision::Accept;
    };

    let angular_speed = angular_speed_deg_per_sec(previous, candidate);
    if angular_speed >= f64::from(policy.max_angular_speed_deg_per_sec) {
        return KeyframeDecision::Reject(RejectReason::TooFast { angular_speed });
    }

    KeyframeDecision::Accept
}

/// Angular speed from `previous` to `candidate` in degrees per second.
#[must_use]
pub fn angular_speed_deg_per_sec(previous: &PreviousFrame, candidate: &KeyframeCandidate) -> f64 {
    let dt = (candidate.timestamp - previous.timestamp).max(MIN_TIMESTAMP_DELTA);
    f64::from(delta_rotation_degrees(&previous.pose, &candidate.pose)) / dt
}
