//! Keyframes handed to the reconstruction engine.

use crate::{CameraPose, ColorFrame};

/// A color frame paired with the camera pose it was captured from.
///
/// Only color is kept; depth has already been integrated into the volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    /// Camera pose at capture time.
    pub pose: CameraPose,
    /// The captured color image.
    pub color: ColorFrame,
}

impl Keyframe {
    /// Pairs a pose with a color frame.
    #[must_use]
    pub const fn new(pose: CameraPose, color: ColorFrame) -> Self {
        Self { pose, color }
    }

    /// Capture time of the color frame.
    #[must_use]
    pub const fn timestamp(&self) -> f64 {
        self.color.timestamp
    }
}
