//! Keyframe selection for scan sessions.
//!
//! While scanning, every tracked frame that carries a color image is offered
//! as a keyframe candidate. Keyframes later drive texturing of the mesh, so
//! the selection favors sharp frames from new viewpoints:
//!
//! - [`evaluate`] - the pure acceptance rule
//! - [`KeyframeGate`] - per-scan state (accepted poses, previous frame)
//! - [`KeyframePolicy`] - thresholds, serde-loadable
//! - [`delta_rotation_degrees`] - pose rotation delta, also used for the
//!   rotation readout shown while scanning
//!
//! # Layer 0 Crate
//!
//! No engine or UI dependencies; only poses and timestamps go in.
//!
//! # Example
//!
//! ```
//! use glam::{Quat, Vec3};
//! use scan_keyframe::{KeyframeCandidate, KeyframePolicy, PreviousFrame, evaluate};
//! use scan_types::{CameraPose, PoseAccuracy};
//!
//! let policy = KeyframePolicy::default();
//! let previous = PreviousFrame { pose: CameraPose::IDENTITY, timestamp: 0.0 };
//! let candidate = KeyframeCandidate {
//!     pose: CameraPose::from_rotation_translation(Quat::from_rotation_y(0.5), Vec3::ZERO),
//!     accuracy: PoseAccuracy::High,
//!     timestamp: 0.1,
//! };
//!
//! // ~29 degrees in 0.1 s is far too fast.
//! assert!(!evaluate(&candidate, Some(&previous), &[], &policy).is_accepted());
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod decision;
mod error;
mod gate;
mod motion;
mod policy;

pub use decision::{
    KeyframeCandidate, KeyframeDecision, MIN_TIMESTAMP_DELTA, PreviousFrame, RejectReason,
    angular_speed_deg_per_sec, evaluate,
};
pub use error::{KeyframeError, Result};
pub use gate::KeyframeGate;
pub use motion::{delta_rotation_degrees, delta_translation_m};
pub use policy::KeyframePolicy;
