//! Shared fakes for scan-session integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use glam::{Quat, Vec3};
use scan_session::{
    AttachmentRecord, Artifact, CaptureControl, ColorizeOptions, ColorizeQuality, EngineError,
    ExposureMode, HoleFillParams, MapperConfig, ReconstructionEngine, TaskContext, UploadError,
    UploadService, UploadTarget,
};
use scan_types::{
    CameraPose, ColorFormat, ColorFrame, DepthFrame, Keyframe, PoseAccuracy, ScanMesh,
    SensorSample, TrackerHints, TrackingUpdate,
};

// =============================================================================
// Frames and meshes
// =============================================================================

/// A 32x24 depth frame at a constant depth.
pub fn depth_frame(timestamp: f64, depth: f32) -> DepthFrame {
    DepthFrame::new(timestamp, 32, 24, vec![depth; 32 * 24]).expect("valid depth frame")
}

/// A 4x4 BGRA color frame.
pub fn color_frame(timestamp: f64) -> ColorFrame {
    ColorFrame::new(timestamp, 4, 4, ColorFormat::Bgra8, vec![128u8; 64]).expect("valid color")
}

/// Depth and color at `timestamp`.
pub fn sample(timestamp: f64) -> SensorSample {
    SensorSample {
        depth: depth_frame(timestamp, 0.4),
        color: Some(color_frame(timestamp)),
    }
}

/// Depth only at `timestamp`.
pub fn depth_sample(timestamp: f64) -> SensorSample {
    SensorSample::depth_only(depth_frame(timestamp, 0.4))
}

/// A closed tetrahedron.
pub fn tetrahedron() -> ScanMesh {
    ScanMesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
        vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    )
    .expect("valid mesh")
}

// =============================================================================
// Fake engine
// =============================================================================

/// Scriptable engine.
///
/// Tracking turns the camera about Y at `turn_rate_deg_per_sec` from the
/// initial pose. Enhanced colorize blocks while held, so tests can cancel
/// it and then let it finish.
pub struct FakeEngine {
    pub pose_available: AtomicBool,
    pub tracking_fails: AtomicBool,
    pub accuracy: Mutex<PoseAccuracy>,
    pub turn_rate_deg_per_sec: Mutex<f32>,
    pub initial_pose: Mutex<Option<CameraPose>>,
    pub mapper: Mutex<Option<MapperConfig>>,
    pub gravity_seen: Mutex<Vec<Vec3>>,
    pub integrated: AtomicUsize,
    pub keyframes: Mutex<Vec<Keyframe>>,
    pub final_mesh: Mutex<ScanMesh>,
    pub hole_fill_fails: AtomicBool,
    pub hole_fill_calls: AtomicUsize,
    pub colorize_calls: Mutex<Vec<(ColorizeQuality, usize)>>,
    pub colorize_options: Mutex<Option<ColorizeOptions>>,
    pub colorize_input_shades: Mutex<Vec<Option<Vec3>>>,
    pub enhanced_fails: AtomicBool,
    pub enhanced_started: AtomicBool,
    pub released: AtomicUsize,
    pub resets: AtomicUsize,
    hold: Mutex<bool>,
    hold_changed: Condvar,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            pose_available: AtomicBool::new(true),
            tracking_fails: AtomicBool::new(false),
            accuracy: Mutex::new(PoseAccuracy::High),
            turn_rate_deg_per_sec: Mutex::new(1.0),
            initial_pose: Mutex::new(None),
            mapper: Mutex::new(None),
            gravity_seen: Mutex::new(Vec::new()),
            integrated: AtomicUsize::new(0),
            keyframes: Mutex::new(Vec::new()),
            final_mesh: Mutex::new(tetrahedron()),
            hole_fill_fails: AtomicBool::new(false),
            hole_fill_calls: AtomicUsize::new(0),
            colorize_calls: Mutex::new(Vec::new()),
            colorize_options: Mutex::new(None),
            colorize_input_shades: Mutex::new(Vec::new()),
            enhanced_fails: AtomicBool::new(false),
            enhanced_started: AtomicBool::new(false),
            released: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            hold: Mutex::new(false),
            hold_changed: Condvar::new(),
        }
    }
}

impl FakeEngine {
    /// Make enhanced colorize block until [`FakeEngine::release_enhanced`].
    pub fn hold_enhanced(&self) {
        *self.hold.lock().unwrap() = true;
    }

    /// Let a held enhanced colorize finish.
    pub fn release_enhanced(&self) {
        *self.hold.lock().unwrap() = false;
        self.hold_changed.notify_all();
    }

    /// Spin until enhanced colorize has started, up to two seconds.
    pub fn wait_for_enhanced(&self) -> bool {
        for _ in 0..200 {
            if self.enhanced_started.load(Ordering::SeqCst) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn colored(mesh: &ScanMesh, shade: f32) -> ScanMesh {
        mesh.with_colors(vec![Vec3::splat(shade); mesh.vertex_count()])
            .expect("color count matches")
    }
}

impl ReconstructionEngine for FakeEngine {
    fn initialize_pose(
        &self,
        _depth: &DepthFrame,
        gravity: Vec3,
    ) -> Result<Option<CameraPose>, EngineError> {
        self.gravity_seen.lock().unwrap().push(gravity);
        if self.pose_available.load(Ordering::SeqCst) {
            Ok(Some(CameraPose::IDENTITY))
        } else {
            Ok(None)
        }
    }

    fn configure_mapper(&self, config: &MapperConfig) -> Result<(), EngineError> {
        *self.mapper.lock().unwrap() = Some(*config);
        Ok(())
    }

    fn set_initial_pose(&self, pose: &CameraPose) {
        *self.initial_pose.lock().unwrap() = Some(*pose);
    }

    fn track_frame(&self, sample: &SensorSample) -> Result<TrackingUpdate, EngineError> {
        if self.tracking_fails.load(Ordering::SeqCst) {
            return Err(EngineError::Tracking("lost".into()));
        }
        let start = self.initial_pose.lock().unwrap().unwrap_or(CameraPose::IDENTITY);
        let rate = *self.turn_rate_deg_per_sec.lock().unwrap();
        #[allow(clippy::cast_possible_truncation)]
        let degrees = (sample.timestamp() as f32) * rate;
        let turn = CameraPose::from_rotation_translation(
            Quat::from_rotation_y(degrees.to_radians()),
            Vec3::ZERO,
        );
        let accuracy = *self.accuracy.lock().unwrap();
        Ok(TrackingUpdate {
            pose: turn.compose(&start),
            accuracy,
            hints: TrackerHints {
                model_out_of_view: accuracy < PoseAccuracy::Approximate,
                ..TrackerHints::default()
            },
        })
    }

    fn integrate(&self, _depth: &DepthFrame, _pose: &CameraPose) {
        self.integrated.fetch_add(1, Ordering::SeqCst);
    }

    fn add_keyframe(&self, keyframe: Keyframe) {
        self.keyframes.lock().unwrap().push(keyframe);
    }

    fn keyframes(&self) -> Vec<Keyframe> {
        self.keyframes.lock().unwrap().clone()
    }

    fn finalize_mesh(&self) -> Result<ScanMesh, EngineError> {
        Ok(self.final_mesh.lock().unwrap().clone())
    }

    fn fill_holes(
        &self,
        mesh: &ScanMesh,
        _params: &HoleFillParams,
        ctx: &TaskContext,
    ) -> Result<ScanMesh, EngineError> {
        self.hole_fill_calls.fetch_add(1, Ordering::SeqCst);
        ctx.check_cancelled()?;
        if self.hole_fill_fails.load(Ordering::SeqCst) {
            return Err(EngineError::processing("hole fill", "non-manifold input"));
        }
        Ok(mesh.clone())
    }

    fn colorize(
        &self,
        mesh: &ScanMesh,
        keyframes: &[Keyframe],
        quality: ColorizeQuality,
        options: &ColorizeOptions,
        ctx: &TaskContext,
    ) -> Result<ScanMesh, EngineError> {
        self.colorize_calls.lock().unwrap().push((quality, keyframes.len()));
        *self.colorize_options.lock().unwrap() = Some(*options);
        self.colorize_input_shades
            .lock()
            .unwrap()
            .push(mesh.colors().map(|c| c[0]));
        match quality {
            ColorizeQuality::Preview => {
                ctx.report_progress(0.5);
                ctx.report_progress(1.0);
                Ok(Self::colored(mesh, 0.5))
            }
            ColorizeQuality::Enhanced => {
                self.enhanced_started.store(true, Ordering::SeqCst);
                ctx.report_progress(0.25);
                let mut held = self.hold.lock().unwrap();
                while *held {
                    held = self
                        .hold_changed
                        .wait_timeout(held, Duration::from_millis(10))
                        .unwrap()
                        .0;
                }
                drop(held);
                // Finishes even when cancelled, so late results can be
                // checked for being discarded.
                if self.enhanced_fails.load(Ordering::SeqCst) {
                    return Err(EngineError::processing("texturing", "out of texture memory"));
                }
                ctx.report_progress(1.0);
                Ok(Self::colored(mesh, 0.9))
            }
        }
    }

    fn release_tracking(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.keyframes.lock().unwrap().clear();
        *self.initial_pose.lock().unwrap() = None;
    }
}

// =============================================================================
// Fake capture device
// =============================================================================

/// Records streaming and exposure changes.
#[derive(Debug, Default)]
pub struct FakeCapture {
    pub streaming: bool,
    pub exposure: ExposureMode,
    pub exposure_changes: Vec<ExposureMode>,
}

impl CaptureControl for FakeCapture {
    fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    fn set_color_exposure(&mut self, mode: ExposureMode) {
        self.exposure = mode;
        self.exposure_changes.push(mode);
    }
}

// =============================================================================
// Fake upload service
// =============================================================================

/// One recorded upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub target: UploadTarget,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Keeps every upload in memory.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    pub uploads: Mutex<Vec<Upload>>,
    pub fail: AtomicBool,
}

impl UploadService for RecordingUploader {
    fn upload(
        &self,
        target: &UploadTarget,
        artifact: &Artifact,
    ) -> Result<AttachmentRecord, UploadError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UploadError::Transport("connection reset".into()));
        }
        let bytes = std::fs::read(&artifact.path).map_err(|e| UploadError::Transport(e.to_string()))?;
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(Upload {
            target: target.clone(),
            file_name: artifact.file_name(),
            bytes,
        });
        Ok(AttachmentRecord {
            id: uploads.len() as u64,
            file_name: artifact.file_name(),
            url: None,
        })
    }
}
