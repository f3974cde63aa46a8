//! Data types shared by the scan orchestration crates.
//!
//! This crate provides the values that flow between the capture layer, the
//! reconstruction engine and the scan session:
//!
//! - [`CameraPose`] - 4x4 camera-to-world transform
//! - [`PoseAccuracy`] / [`TrackerHints`] - tracker quality per frame
//! - [`DepthFrame`] / [`ColorFrame`] / [`SensorSample`] - captured images
//! - [`Keyframe`] - a color frame with its pose, used for texturing
//! - [`ScanMesh`] - shared handle to a reconstructed surface
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **no engine or UI dependencies**. Poses use
//! `glam`; serde support is behind the `serde` feature.
//!
//! # Example
//!
//! ```
//! use scan_types::{DepthFrame, PoseAccuracy};
//!
//! let depth = DepthFrame::new(0.0, 4, 4, vec![0.3; 16]).unwrap();
//! assert_eq!(depth.center_mean_depth(1), Some(0.3));
//!
//! assert!(PoseAccuracy::High.is_at_least(PoseAccuracy::Approximate));
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod frame;
mod keyframe;
mod mesh;
mod pose;
mod tracking;

pub use error::ScanTypesError;
pub use frame::{CENTER_WINDOW_HALF, ColorFormat, ColorFrame, DepthFrame, SensorSample};
pub use keyframe::Keyframe;
pub use mesh::{MeshData, ScanMesh};
pub use pose::CameraPose;
pub use tracking::{PoseAccuracy, TrackerHints, TrackingUpdate};
