//! Scan volume, voxel sizing and the presets used to fit the volume to a
//! foot.

use serde::{Deserialize, Serialize};

/// Voxel edge lengths the user can pick from, in meters.
pub const VOXEL_SIZE_CANDIDATES_M: [f32; 5] = [0.001, 0.0015, 0.002, 0.003, 0.004];

/// Index of the default candidate (3 mm).
pub const DEFAULT_VOXEL_CANDIDATE: usize = 3;

/// In adaptive mode the volume width is split into this many voxels.
pub const ADAPTIVE_VOXELS_ACROSS: f32 = 200.0;

/// Upper bound for an adaptive voxel, in meters.
pub const MAX_ADAPTIVE_VOXEL_M: f32 = 0.2;

/// Clamp `value` into `[min, max]`; `NaN` maps to `min`.
#[must_use]
pub fn keep_in_range(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Allowed range for each volume edge, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeBounds {
    /// Smallest edge. Default: 0.1
    pub min_m: f32,
    /// Largest edge. Default: 3.0
    pub max_m: f32,
}

impl Default for VolumeBounds {
    fn default() -> Self {
        Self {
            min_m: 0.1,
            max_m: 3.0,
        }
    }
}

/// Edge lengths of the box being scanned, in meters.
///
/// `width` and `length` lie in the ground plane; `depth` is the height of
/// the box above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeSize {
    /// X edge.
    pub width: f32,
    /// Y edge.
    pub length: f32,
    /// Z edge.
    pub depth: f32,
}

impl Default for VolumeSize {
    fn default() -> Self {
        Self::new(0.2, 0.3, 0.3)
    }
}

impl VolumeSize {
    /// Creates a volume size without clamping.
    #[must_use]
    pub const fn new(width: f32, length: f32, depth: f32) -> Self {
        Self {
            width,
            length,
            depth,
        }
    }

    /// A cube.
    #[must_use]
    pub const fn cube(edge: f32) -> Self {
        Self::new(edge, edge, edge)
    }

    /// Each edge clamped into `bounds`; `NaN` edges become `bounds.min_m`.
    #[must_use]
    pub fn clamped(self, bounds: &VolumeBounds) -> Self {
        Self {
            width: keep_in_range(self.width, bounds.min_m, bounds.max_m),
            length: keep_in_range(self.length, bounds.min_m, bounds.max_m),
            depth: keep_in_range(self.depth, bounds.min_m, bounds.max_m),
        }
    }
}

/// How the voxel size follows the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoxelMode {
    /// Always the selected candidate.
    #[default]
    Fixed,
    /// Scales with the volume width, never finer than the selected
    /// candidate.
    Adaptive,
}

/// Voxel resolution setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelQuality {
    /// Fixed or adaptive.
    pub mode: VoxelMode,
    /// Index into [`VOXEL_SIZE_CANDIDATES_M`]; out-of-range values use the
    /// coarsest candidate.
    pub candidate: usize,
}

impl Default for VoxelQuality {
    fn default() -> Self {
        Self {
            mode: VoxelMode::Fixed,
            candidate: DEFAULT_VOXEL_CANDIDATE,
        }
    }
}

impl VoxelQuality {
    /// Fixed mode at the given candidate.
    #[must_use]
    pub const fn fixed(candidate: usize) -> Self {
        Self {
            mode: VoxelMode::Fixed,
            candidate,
        }
    }

    /// Adaptive mode with the given candidate as the lower bound.
    #[must_use]
    pub const fn adaptive(candidate: usize) -> Self {
        Self {
            mode: VoxelMode::Adaptive,
            candidate,
        }
    }

    /// The selected candidate size in meters.
    #[must_use]
    pub fn candidate_size(&self) -> f32 {
        let last = VOXEL_SIZE_CANDIDATES_M.len() - 1;
        VOXEL_SIZE_CANDIDATES_M[self.candidate.min(last)]
    }

    /// Voxel size for `volume`.
    ///
    /// Fixed mode returns the candidate. Adaptive mode returns
    /// `clamp(width / 200, candidate, 0.2)`.
    #[must_use]
    pub fn voxel_size(&self, volume: &VolumeSize) -> f32 {
        let selected = self.candidate_size();
        match self.mode {
            VoxelMode::Fixed => selected,
            VoxelMode::Adaptive => keep_in_range(
                volume.width / ADAPTIVE_VOXELS_ACROSS,
                selected,
                MAX_ADAPTIVE_VOXEL_M,
            ),
        }
    }
}

/// Everything the engine mapper needs for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Voxel edge length in meters.
    pub voxel_size: f32,
    /// Volume edges in meters.
    pub volume_size: VolumeSize,
    /// Volume edges in voxels, `round(edge / voxel_size)`.
    pub volume_bounds: [u32; 3],
    /// Track assuming the object sits on a turntable.
    pub turntable_tracking: bool,
}

impl MapperConfig {
    /// Derives the mapper setup from the current volume and voxel size.
    #[must_use]
    pub fn new(volume_size: VolumeSize, voxel_size: f32, turntable_tracking: bool) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let voxels = |edge: f32| (edge / voxel_size).round().max(0.0) as u32;
        Self {
            voxel_size,
            volume_size,
            volume_bounds: [
                voxels(volume_size.width),
                voxels(volume_size.length),
                voxels(volume_size.depth),
            ],
            turntable_tracking,
        }
    }
}

/// Foot size presets for the ground-plane edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FootSize {
    /// 0.15 x 0.20 m.
    Small,
    /// 0.20 x 0.30 m.
    #[default]
    Medium,
    /// 0.28 x 0.38 m.
    Large,
}

impl FootSize {
    /// `(width, length)` in meters.
    #[must_use]
    pub const fn dimensions(self) -> (f32, f32) {
        match self {
            Self::Small => (0.15, 0.20),
            Self::Medium => (0.2, 0.3),
            Self::Large => (0.28, 0.38),
        }
    }
}

/// What part of the leg is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanType {
    /// Foot only.
    #[default]
    Foot,
    /// Foot and ankle.
    FootPlusAnkle,
}

impl ScanType {
    /// `(box depth, cube distance)` in meters.
    #[must_use]
    pub const fn dimensions(self) -> (f32, f32) {
        match self {
            Self::Foot => (0.3, 0.25),
            Self::FootPlusAnkle => (0.6, 0.35),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn keep_in_range_handles_nan() {
        assert_eq!(keep_in_range(f32::NAN, 0.1, 3.0), 0.1);
        assert_eq!(keep_in_range(5.0, 0.1, 3.0), 3.0);
        assert_eq!(keep_in_range(0.01, 0.1, 3.0), 0.1);
        assert_eq!(keep_in_range(0.5, 0.1, 3.0), 0.5);
    }

    #[test]
    fn volume_clamping() {
        let bounds = VolumeBounds::default();
        let v = VolumeSize::new(0.05, f32::NAN, 4.0).clamped(&bounds);
        assert_eq!(v, VolumeSize::new(0.1, 0.1, 3.0));
    }

    #[test]
    fn fixed_voxel_uses_candidate() {
        let volume = VolumeSize::cube(2.0);
        assert_eq!(VoxelQuality::default().voxel_size(&volume), 0.003);
        assert_eq!(VoxelQuality::fixed(0).voxel_size(&volume), 0.001);
        assert_eq!(VoxelQuality::fixed(99).voxel_size(&volume), 0.004);
    }

    #[test]
    fn adaptive_voxel_scales_with_width() {
        let quality = VoxelQuality::adaptive(3);
        // 0.2 m wide: 0.001 is below the selected 3 mm floor.
        assert_eq!(quality.voxel_size(&VolumeSize::default()), 0.003);
        // 2.0 m wide: 10 mm.
        assert_relative_eq!(quality.voxel_size(&VolumeSize::cube(2.0)), 0.01, epsilon = 1e-6);
    }

    #[test]
    fn mapper_bounds_are_rounded() {
        let config = MapperConfig::new(VolumeSize::default(), 0.003, true);
        assert_eq!(config.volume_bounds, [67, 100, 100]);
        assert!(config.turntable_tracking);
    }

    #[test]
    fn presets() {
        assert_eq!(FootSize::Large.dimensions(), (0.28, 0.38));
        assert_eq!(FootSize::default(), FootSize::Medium);
        assert_eq!(ScanType::FootPlusAnkle.dimensions(), (0.6, 0.35));
    }
}
