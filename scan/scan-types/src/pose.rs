//! Camera poses.

use glam::{Mat4, Quat, Vec3};

/// A rigid camera pose as a 4x4 homogeneous transform (camera to world).
///
/// # Example
///
/// ```
/// use glam::{Quat, Vec3};
/// use scan_types::CameraPose;
///
/// let start = CameraPose::IDENTITY;
/// let turned = CameraPose::from_rotation_translation(
///     Quat::from_rotation_y(30f32.to_radians()),
///     Vec3::ZERO,
/// );
///
/// let delta = turned.relative_to(&start);
/// assert!((delta.rotation_angle_degrees() - 30.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraPose {
    /// The homogeneous transform.
    #[cfg_attr(feature = "serde", serde(with = "mat4_serde"))]
    pub matrix: Mat4,
}

#[cfg(feature = "serde")]
mod mat4_serde {
    use glam::Mat4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Mat4, s: S) -> Result<S::Ok, S::Error> {
        m.to_cols_array().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Mat4, D::Error> {
        let cols = <[f32; 16]>::deserialize(d)?;
        Ok(Mat4::from_cols_array(&cols))
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CameraPose {
    /// The identity pose.
    pub const IDENTITY: Self = Self {
        matrix: Mat4::IDENTITY,
    };

    /// Wraps a 4x4 matrix.
    #[must_use]
    pub const fn from_matrix(matrix: Mat4) -> Self {
        Self { matrix }
    }

    /// Builds a pose from rotation and translation.
    #[must_use]
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            matrix: Mat4::from_rotation_translation(rotation, translation),
        }
    }

    /// Rotation part as a unit quaternion.
    #[must_use]
    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.matrix.to_scale_rotation_translation();
        rotation.normalize()
    }

    /// Translation part.
    #[must_use]
    pub fn translation(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    /// Inverse pose.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            matrix: self.matrix.inverse(),
        }
    }

    /// `self * other`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// The motion from `previous` to `self`, i.e. `self * inverse(previous)`.
    #[must_use]
    pub fn relative_to(&self, previous: &Self) -> Self {
        self.compose(&previous.inverse())
    }

    /// Moves the pose along its own axes.
    #[must_use]
    pub fn translated_local(&self, offset: Vec3) -> Self {
        Self {
            matrix: self.matrix * Mat4::from_translation(offset),
        }
    }

    /// Angle of the rotation part in degrees, in `[0, 180]`.
    #[must_use]
    pub fn rotation_angle_degrees(&self) -> f32 {
        let q = self.rotation();
        // q and -q are the same rotation; take the short way round.
        (2.0 * q.xyz().length().atan2(q.w.abs())).to_degrees()
    }

    /// Distance between the two camera centers.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f32 {
        self.translation().distance(other.translation())
    }
}

impl From<Mat4> for CameraPose {
    fn from(matrix: Mat4) -> Self {
        Self { matrix }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_has_no_rotation() {
        assert_eq!(CameraPose::IDENTITY.rotation_angle_degrees(), 0.0);
        assert_eq!(CameraPose::default().translation(), Vec3::ZERO);
    }

    #[test]
    fn relative_rotation_angle() {
        let a = CameraPose::from_rotation_translation(
            Quat::from_rotation_z(10f32.to_radians()),
            Vec3::new(0.1, 0.0, 0.0),
        );
        let b = CameraPose::from_rotation_translation(
            Quat::from_rotation_z(55f32.to_radians()),
            Vec3::new(0.1, 0.2, 0.0),
        );
        assert_relative_eq!(b.relative_to(&a).rotation_angle_degrees(), 45.0, epsilon = 1e-3);
        assert_relative_eq!(a.relative_to(&b).rotation_angle_degrees(), 45.0, epsilon = 1e-3);
    }

    #[test]
    fn large_rotation_takes_short_way() {
        let pose = CameraPose::from_rotation_translation(
            Quat::from_rotation_x(270f32.to_radians()),
            Vec3::ZERO,
        );
        assert_relative_eq!(pose.rotation_angle_degrees(), 90.0, epsilon = 1e-3);
    }

    #[test]
    fn translated_local_moves_along_camera_axes() {
        let pose = CameraPose::from_rotation_translation(
            Quat::from_rotation_y(90f32.to_radians()),
            Vec3::ZERO,
        );
        let moved = pose.translated_local(Vec3::new(0.0, 0.0, -0.25));
        let t = moved.translation();
        assert_relative_eq!(t.x, -0.25, epsilon = 1e-5);
        assert_relative_eq!(t.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(moved.distance_to(&pose), 0.25, epsilon = 1e-5);
    }

    #[test]
    fn inverse_composes_to_identity() {
        let pose = CameraPose::from_rotation_translation(
            Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.2, 1.1),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let product = pose.compose(&pose.inverse());
        assert!(product.matrix.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_roundtrip() {
        let pose = CameraPose::from_rotation_translation(Quat::IDENTITY, Vec3::new(0.0, 0.5, 0.0));
        let json = serde_json::to_string(&pose).unwrap();
        let back: CameraPose = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pose);
    }
}
