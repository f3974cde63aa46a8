//! Seams to the external collaborators: the reconstruction engine and the
//! capture device.
//!
//! The session never reconstructs anything itself. Pose initialization,
//! tracking, volumetric fusion, meshing, hole filling and texturing all go
//! through [`ReconstructionEngine`]; sensor streaming and exposure go
//! through [`CaptureControl`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use scan_types::{CameraPose, DepthFrame, Keyframe, ScanMesh, SensorSample, TrackingUpdate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::volume::MapperConfig;

/// Errors reported by a reconstruction engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine rejected a configuration.
    #[error("engine configuration rejected: {0}")]
    Configuration(String),

    /// Tracking failed for a frame.
    #[error("tracking failed: {0}")]
    Tracking(String),

    /// Mesh extraction failed.
    #[error("mesh finalization failed: {0}")]
    Finalize(String),

    /// A post-processing primitive failed.
    #[error("{stage} failed: {reason}")]
    Processing {
        /// Primitive that failed.
        stage: &'static str,
        /// Engine message.
        reason: String,
    },

    /// The operation observed its cancellation token and stopped.
    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Creates a processing error.
    #[must_use]
    pub fn processing(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Processing {
            stage,
            reason: reason.into(),
        }
    }
}

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type ProgressSink = Box<dyn Fn(f64) + Send>;

/// Handle given to long-running engine primitives.
///
/// Engines should poll [`TaskContext::is_cancelled`] between internal steps
/// and report progress as a fraction in `[0, 1]`.
pub struct TaskContext {
    cancel: CancelToken,
    progress: Option<ProgressSink>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("reports_progress", &self.progress.is_some())
            .finish()
    }
}

impl TaskContext {
    /// Context bound to `cancel`, with no progress listener.
    #[must_use]
    pub const fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    /// Context that can never be cancelled from outside, for running a
    /// primitive synchronously.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(CancelToken::new())
    }

    /// Attach a progress listener.
    #[must_use]
    pub fn with_progress(mut self, sink: impl Fn(f64) + Send + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Whether the task should stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(EngineError::Cancelled)` once cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] when the token is set.
    pub fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report progress; values are clamped into `[0, 1]`, `NaN` is dropped.
    pub fn report_progress(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        if let Some(sink) = &self.progress {
            sink(fraction.clamp(0.0, 1.0));
        }
    }
}

/// Hole-filling algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HoleFillAlgorithm {
    /// Skip hole filling.
    Disabled,
    /// Watertight Poisson reconstruction of the closed hull.
    #[default]
    Poisson,
    /// Local patching of each hole.
    Liepa,
}

/// Hole-filling request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoleFillParams {
    /// Algorithm to run.
    pub algorithm: HoleFillAlgorithm,
    /// Holes larger than this area (square meters) are left open.
    pub max_patch_area: f32,
}

impl Default for HoleFillParams {
    fn default() -> Self {
        Self {
            algorithm: HoleFillAlgorithm::Poisson,
            max_patch_area: 0.01,
        }
    }
}

impl HoleFillParams {
    /// Whether the pipeline should run a hole-fill stage at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.algorithm != HoleFillAlgorithm::Disabled
    }
}

/// Colorization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorizeQuality {
    /// Fast per-vertex color.
    Preview,
    /// Texture-mapped, slow.
    Enhanced,
}

/// Texture mapping strategy for the enhanced pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TexturingMode {
    /// Tuned for a single object in the middle of the volume.
    #[default]
    Object,
    /// General scenes.
    General,
}

/// Options passed to every colorize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorizeOptions {
    /// Keep the appearance of the first keyframe where views overlap.
    pub prioritize_first_frame: bool,
    /// Face budget of the textured mesh.
    pub target_face_count: u32,
    /// Texture mapping strategy for the enhanced pass.
    pub texturing: TexturingMode,
}

impl Default for ColorizeOptions {
    fn default() -> Self {
        Self {
            prioritize_first_frame: true,
            target_face_count: 50_000,
            texturing: TexturingMode::Object,
        }
    }
}

/// The opaque reconstruction engine.
///
/// Implementations are shared between the session (owner thread) and the
/// post-processing workers, so every method takes `&self` and the engine
/// synchronizes internally. Frame methods must return quickly and hand
/// heavy work to the engine's own workers.
pub trait ReconstructionEngine: Send + Sync + 'static {
    /// Try to place the scan volume from a depth frame and gravity.
    ///
    /// Returns `Ok(None)` while no valid pose can be found.
    ///
    /// # Errors
    ///
    /// Engine-specific failures.
    fn initialize_pose(
        &self,
        depth: &DepthFrame,
        gravity: Vec3,
    ) -> Result<Option<CameraPose>, EngineError>;

    /// Prepare the mapper for a new scan.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for a configuration the engine
    /// cannot honor.
    fn configure_mapper(&self, config: &MapperConfig) -> Result<(), EngineError>;

    /// Seed the tracker with the pose found during cube placement.
    fn set_initial_pose(&self, pose: &CameraPose);

    /// Track one sample.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Tracking`] when the tracker fails outright.
    fn track_frame(&self, sample: &SensorSample) -> Result<TrackingUpdate, EngineError>;

    /// Fuse a depth frame into the volume at `pose`.
    fn integrate(&self, depth: &DepthFrame, pose: &CameraPose);

    /// Store an accepted keyframe.
    fn add_keyframe(&self, keyframe: Keyframe);

    /// Snapshot of stored keyframes.
    fn keyframes(&self) -> Vec<Keyframe>;

    /// Extract the surface from the fused volume.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Finalize`] when meshing fails.
    fn finalize_mesh(&self) -> Result<ScanMesh, EngineError>;

    /// Close holes in `mesh`.
    ///
    /// # Errors
    ///
    /// Engine failures, or [`EngineError::Cancelled`].
    fn fill_holes(
        &self,
        mesh: &ScanMesh,
        params: &HoleFillParams,
        ctx: &TaskContext,
    ) -> Result<ScanMesh, EngineError>;

    /// Color `mesh` from `keyframes`.
    ///
    /// # Errors
    ///
    /// Engine failures, or [`EngineError::Cancelled`].
    fn colorize(
        &self,
        mesh: &ScanMesh,
        keyframes: &[Keyframe],
        quality: ColorizeQuality,
        options: &ColorizeOptions,
        ctx: &TaskContext,
    ) -> Result<ScanMesh, EngineError>;

    /// Free tracker and mapper memory once the scan is finalized.
    fn release_tracking(&self) {}

    /// Drop all scan state: pose, volume, keyframes.
    fn reset(&self);
}

/// Color camera exposure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposureMode {
    /// Exposure and white balance follow the scene.
    #[default]
    Auto,
    /// Exposure and white balance held, so keyframes match in color.
    Locked,
}

/// Control over the capture device.
pub trait CaptureControl {
    /// Start or stop sensor streaming.
    fn set_streaming(&mut self, streaming: bool);

    /// Change color exposure handling.
    fn set_color_exposure(&mut self, mode: ExposureMode);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn task_context_reports_clamped_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = TaskContext::detached().with_progress(move |p| sink.lock().unwrap().push(p));

        ctx.report_progress(0.5);
        ctx.report_progress(1.5);
        ctx.report_progress(f64::NAN);
        assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
    }

    #[test]
    fn task_context_cancellation() {
        let token = CancelToken::new();
        let ctx = TaskContext::new(token.clone());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert_eq!(ctx.check_cancelled(), Err(EngineError::Cancelled));
    }

    #[test]
    fn hole_fill_defaults() {
        let params = HoleFillParams::default();
        assert_eq!(params.algorithm, HoleFillAlgorithm::Poisson);
        assert_eq!(params.max_patch_area, 0.01);
        assert!(params.is_enabled());
        assert!(
            !HoleFillParams {
                algorithm: HoleFillAlgorithm::Disabled,
                ..params
            }
            .is_enabled()
        );
    }
}
