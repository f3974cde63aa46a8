//! Session configuration.

use std::path::Path;

use mesh_io::{DEFAULT_SPACING, IoError};
use scan_keyframe::KeyframePolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{ColorizeOptions, HoleFillParams};
use crate::error::{SessionError, SessionResult};
use crate::volume::{VolumeBounds, VolumeSize, VoxelQuality};

/// Smallest distance from the camera to the volume, in meters.
pub const MIN_CUBE_DISTANCE_M: f32 = 0.1;

/// Largest distance from the camera to the volume, in meters.
pub const MAX_CUBE_DISTANCE_M: f32 = 1.5;

/// Edge of the cube used when gravity alignment is off.
pub const UNALIGNED_VOLUME_EDGE_M: f32 = 0.4;

/// Everything a session needs that does not change while it runs.
///
/// Loads from JSON; missing fields take their defaults.
///
/// # Example
///
/// ```
/// use scan_session::SessionConfig;
///
/// let config = SessionConfig::from_json_str(r#"{ "cube_distance_m": 0.35 }"#).unwrap();
/// assert!(config.gravity_aligned);
/// assert!((config.cube_distance_m - 0.35).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial volume in gravity-aligned mode.
    pub volume_size: VolumeSize,
    /// Allowed range for each volume edge.
    pub volume_bounds: VolumeBounds,
    /// Voxel resolution.
    pub voxel_quality: VoxelQuality,
    /// Keyframe selection thresholds.
    pub keyframe_policy: KeyframePolicy,
    /// Hole filling before colorization.
    pub hole_fill: HoleFillParams,
    /// Colorizer options.
    pub colorize: ColorizeOptions,
    /// Use a fixed down vector instead of device gravity, and allow the
    /// foot presets. Default: true
    pub gravity_aligned: bool,
    /// Place the volume at a fixed distance in front of the camera.
    /// Default: true
    pub fixed_cube_position: bool,
    /// Camera-to-volume distance for the fixed cube, in meters.
    /// Default: 0.25
    pub cube_distance_m: f32,
    /// Tell the mapper the object sits on a turntable. Default: true
    pub turntable_tracking: bool,
    /// X offset between the left and right foot in a merged file.
    /// Default: 0.25
    pub merge_spacing: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            volume_size: VolumeSize::default(),
            volume_bounds: VolumeBounds::default(),
            voxel_quality: VoxelQuality::default(),
            keyframe_policy: KeyframePolicy::default(),
            hole_fill: HoleFillParams::default(),
            colorize: ColorizeOptions::default(),
            gravity_aligned: true,
            fixed_cube_position: true,
            cube_distance_m: 0.25,
            turntable_tracking: true,
            merge_spacing: DEFAULT_SPACING,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for malformed JSON or values that
    /// fail [`SessionConfig::validate`].
    pub fn from_json_str(json: &str) -> SessionResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| SessionError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the file cannot be read, otherwise as
    /// [`SessionConfig::from_json_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> SessionResult<Self> {
        let path = path.as_ref();
        let json =
            std::fs::read_to_string(path).map_err(|e| IoError::source_unreadable(path, e))?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), "loaded session config");
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> SessionResult<()> {
        let bounds = &self.volume_bounds;
        if !(bounds.min_m > 0.0 && bounds.min_m <= bounds.max_m) {
            return Err(SessionError::config(format!(
                "volume bounds must satisfy 0 < min <= max, got [{}, {}]",
                bounds.min_m, bounds.max_m
            )));
        }
        if !(MIN_CUBE_DISTANCE_M..=MAX_CUBE_DISTANCE_M).contains(&self.cube_distance_m) {
            return Err(SessionError::config(format!(
                "cube_distance_m must be in [{MIN_CUBE_DISTANCE_M}, {MAX_CUBE_DISTANCE_M}], got {}",
                self.cube_distance_m
            )));
        }
        if !self.merge_spacing.is_finite() {
            return Err(SessionError::config("merge_spacing must be finite"));
        }
        if self.colorize.target_face_count == 0 {
            return Err(SessionError::config("colorize.target_face_count must be > 0"));
        }
        self.keyframe_policy.validate()?;
        Ok(())
    }

    /// Volume used when a session starts or resets.
    ///
    /// Gravity-aligned mode starts from `volume_size`; otherwise a
    /// 0.4 m cube. Both are clamped to `volume_bounds`.
    #[must_use]
    pub fn initial_volume(&self) -> VolumeSize {
        let volume = if self.gravity_aligned {
            self.volume_size
        } else {
            VolumeSize::cube(UNALIGNED_VOLUME_EDGE_M)
        };
        volume.clamped(&self.volume_bounds)
    }
}
