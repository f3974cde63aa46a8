//! Pose deltas between frames.

use scan_types::CameraPose;

/// Rotation between two poses in degrees.
///
/// This is the angle of the unit quaternion extracted from
/// `candidate * inverse(previous)`. The live rotation readout shown while
/// scanning uses the same measure.
///
/// # Example
///
/// ```
/// use glam::{Quat, Vec3};
/// use scan_keyframe::delta_rotation_degrees;
/// use scan_types::CameraPose;
///
/// let a = CameraPose::IDENTITY;
/// let b = CameraPose::from_rotation_translation(Quat::from_rotation_y(0.5), Vec3::ZERO);
/// assert!((delta_rotation_degrees(&a, &b) - 0.5f32.to_degrees()).abs() < 1e-3);
/// ```
#[must_use]
pub fn delta_rotation_degrees(previous: &CameraPose, candidate: &CameraPose) -> f32 {
    candidate.relative_to(previous).rotation_angle_degrees()
}

/// Distance between the two camera centers in meters.
#[must_use]
pub fn delta_translation_m(previous: &CameraPose, candidate: &CameraPose) -> f32 {
    previous.distance_to(candidate)
}
