//! Stateful keyframe selection across a scan.

use scan_types::CameraPose;
use tracing::debug;

use crate::decision::{KeyframeCandidate, KeyframeDecision, PreviousFrame, evaluate};
use crate::error::Result;
use crate::policy::KeyframePolicy;

/// Tracks accepted keyframe poses and the previous frame for one scan.
///
/// # Example
///
/// ```
/// use scan_keyframe::{KeyframeCandidate, KeyframeGate, KeyframePolicy};
/// use scan_types::{CameraPose, PoseAccuracy};
///
/// let mut gate = KeyframeGate::new(KeyframePolicy::default()).unwrap();
/// let decision = gate.observe(&KeyframeCandidate {
///     pose: CameraPose::IDENTITY,
///     accuracy: PoseAccuracy::High,
///     timestamp: 0.0,
/// });
/// assert!(decision.is_accepted());
/// assert_eq!(gate.keyframe_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct KeyframeGate {
    policy: KeyframePolicy,
    keyframe_poses: Vec<CameraPose>,
    previous: Option<PreviousFrame>,
}

impl KeyframeGate {
    /// Creates a gate for a new scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy fails validation.
    pub fn new(policy: KeyframePolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            keyframe_poses: Vec::with_capacity(policy.max_keyframes),
            previous: None,
        })
    }

    /// Evaluates a candidate, records it if accepted, and remembers it as
    /// the previous frame either way.
    pub fn observe(&mut self, candidate: &KeyframeCandidate) -> KeyframeDecision {
        let decision = evaluate(
            candidate,
            self.previous.as_ref(),
            &self.keyframe_poses,
            &self.policy,
        );

        match decision {
            KeyframeDecision::Accept => {
                self.keyframe_poses.push(candidate.pose);
                debug!(
                    timestamp = candidate.timestamp,
                    keyframes = self.keyframe_poses.len(),
                    "keyframe accepted"
                );
            }
            KeyframeDecision::Reject(reason) => {
                debug!(timestamp = candidate.timestamp, ?reason, "keyframe rejected");
            }
        }

        self.note_frame(candidate.pose, candidate.timestamp);
        decision
    }

    /// Records a tracked frame that was not offered as a candidate (for
    /// example one without a color image), so the next angular speed is
    /// measured from it.
    pub fn note_frame(&mut self, pose: CameraPose, timestamp: f64) {
        self.previous = Some(PreviousFrame { pose, timestamp });
    }

    /// Number of accepted keyframes.
    #[must_use]
    pub fn keyframe_count(&self) -> usize {
        self.keyframe_poses.len()
    }

    /// Poses of accepted keyframes, in acceptance order.
    #[must_use]
    pub fn keyframe_poses(&self) -> &[CameraPose] {
        &self.keyframe_poses
    }

    /// The frame the next angular speed will be measured from.
    #[must_use]
    pub const fn previous(&self) -> Option<&PreviousFrame> {
        self.previous.as_ref()
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &KeyframePolicy {
        &self.policy
    }

    /// Forgets all keyframes and the previous frame.
    pub fn reset(&mut self) {
        self.keyframe_poses.clear();
        self.previous = None;
    }
}
