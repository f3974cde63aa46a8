//! The scan session state machine.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use scan_keyframe::{KeyframeCandidate, KeyframeGate, delta_rotation_degrees};
use scan_types::{
    CENTER_WINDOW_HALF, CameraPose, Keyframe, PoseAccuracy, ScanMesh, SensorSample, TrackerHints,
};
use tracing::{debug, info, warn};

use crate::config::{MAX_CUBE_DISTANCE_M, MIN_CUBE_DISTANCE_M, SessionConfig};
use crate::engine::{CaptureControl, ExposureMode, ReconstructionEngine};
use crate::error::{SessionError, SessionResult};
use crate::pipeline::{PipelineEvent, PostProcessingPipeline, StageKind};
use crate::state::{ScannerState, UserNotice};
use crate::volume::{
    FootSize, MapperConfig, ScanType, VolumeSize, VoxelQuality, keep_in_range,
};

/// Down vector used in gravity-aligned mode.
pub const ALIGNED_GRAVITY: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Gravity vectors at or below this length are not forwarded.
pub const MIN_GRAVITY_LENGTH: f32 = 1e-5;

/// One scan, from placing the volume to viewing the colored mesh.
///
/// Frames and UI events come in through `&mut self` methods on the owner
/// thread. Post-processing results are applied only when the owner polls.
pub struct ScanSession<E: ReconstructionEngine, C: CaptureControl> {
    engine: Arc<E>,
    capture: C,
    config: SessionConfig,
    state: ScannerState,

    volume: VolumeSize,
    voxel_quality: VoxelQuality,
    voxel_size: f32,
    gravity_aligned: bool,
    cube_distance_m: f32,
    device_gravity: Vec3,

    initial_pose: Option<CameraPose>,
    camera_pose: CameraPose,
    accuracy: PoseAccuracy,
    hints: TrackerHints,
    center_depth: Option<f32>,

    gate: KeyframeGate,
    pipeline: PostProcessingPipeline<E>,
    mesh: Option<ScanMesh>,
    notices_shown: Vec<UserNotice>,
}

impl<E: ReconstructionEngine, C: CaptureControl> std::fmt::Debug for ScanSession<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("state", &self.state)
            .field("volume", &self.volume)
            .field("voxel_size", &self.voxel_size)
            .field("has_valid_pose", &self.initial_pose.is_some())
            .field("keyframes", &self.gate.keyframe_count())
            .finish_non_exhaustive()
    }
}

impl<E: ReconstructionEngine, C: CaptureControl> ScanSession<E, C> {
    /// Creates a session in cube placement and starts streaming.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(engine: Arc<E>, mut capture: C, config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        let gate = KeyframeGate::new(config.keyframe_policy)?;
        let pipeline = PostProcessingPipeline::new(Arc::clone(&engine), config.hole_fill, config.colorize);

        capture.set_streaming(true);
        capture.set_color_exposure(ExposureMode::Auto);

        let volume = config.initial_volume();
        let voxel_size = config.voxel_quality.voxel_size(&volume);
        Ok(Self {
            engine,
            capture,
            state: ScannerState::CubePlacement,
            volume,
            voxel_quality: config.voxel_quality,
            voxel_size,
            gravity_aligned: config.gravity_aligned,
            cube_distance_m: config.cube_distance_m,
            device_gravity: Vec3::ZERO,
            initial_pose: None,
            camera_pose: CameraPose::IDENTITY,
            accuracy: PoseAccuracy::NotAvailable,
            hints: TrackerHints::default(),
            center_depth: None,
            gate,
            pipeline,
            mesh: None,
            notices_shown: Vec::new(),
            config,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ScannerState {
        self.state
    }

    /// Configuration the session was created with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The capture device.
    #[must_use]
    pub const fn capture(&self) -> &C {
        &self.capture
    }

    /// Current scan volume.
    #[must_use]
    pub const fn volume(&self) -> VolumeSize {
        self.volume
    }

    /// Current voxel edge length in meters.
    #[must_use]
    pub const fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Camera-to-volume distance used for the fixed cube.
    #[must_use]
    pub const fn cube_distance(&self) -> f32 {
        self.cube_distance_m
    }

    /// Whether gravity-aligned mode is on.
    #[must_use]
    pub const fn is_gravity_aligned(&self) -> bool {
        self.gravity_aligned
    }

    /// Whether the pose initializer has placed the volume.
    #[must_use]
    pub const fn has_valid_pose(&self) -> bool {
        self.initial_pose.is_some()
    }

    /// Pose found during cube placement.
    #[must_use]
    pub const fn initial_pose(&self) -> Option<&CameraPose> {
        self.initial_pose.as_ref()
    }

    /// Latest camera pose.
    #[must_use]
    pub const fn camera_pose(&self) -> &CameraPose {
        &self.camera_pose
    }

    /// Latest tracker accuracy.
    #[must_use]
    pub const fn accuracy(&self) -> PoseAccuracy {
        self.accuracy
    }

    /// Number of keyframes accepted in this scan.
    #[must_use]
    pub fn keyframe_count(&self) -> usize {
        self.gate.keyframe_count()
    }

    /// The committed mesh: finalized, then replaced by each colorize result.
    #[must_use]
    pub const fn mesh(&self) -> Option<&ScanMesh> {
        self.mesh.as_ref()
    }

    /// Post-processing state.
    #[must_use]
    pub const fn pipeline(&self) -> &PostProcessingPipeline<E> {
        &self.pipeline
    }

    // =========================================================================
    // Volume setup (cube placement only)
    // =========================================================================

    /// Resize the scan volume. Edges are clamped to the configured bounds.
    ///
    /// Returns the volume actually applied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::VolumeLocked`] outside cube placement.
    pub fn set_volume_size(&mut self, volume: VolumeSize) -> SessionResult<VolumeSize> {
        self.require_placement()?;
        self.volume = volume.clamped(&self.config.volume_bounds);
        self.update_voxel_size();
        debug!(
            width = self.volume.width,
            length = self.volume.length,
            depth = self.volume.depth,
            voxel = self.voxel_size,
            "volume changed"
        );
        Ok(self.volume)
    }

    /// Change voxel resolution. Returns the new voxel size.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::VolumeLocked`] outside cube placement.
    pub fn set_voxel_quality(&mut self, quality: VoxelQuality) -> SessionResult<f32> {
        self.require_placement()?;
        self.voxel_quality = quality;
        self.update_voxel_size();
        Ok(self.voxel_size)
    }

    /// Set width and length from a foot size.
    ///
    /// # Errors
    ///
    /// [`SessionError::VolumeLocked`] outside cube placement,
    /// [`SessionError::PresetsRequireAlignedMode`] without gravity alignment.
    pub fn apply_foot_size(&mut self, size: FootSize) -> SessionResult<VolumeSize> {
        self.require_presets()?;
        let (width, length) = size.dimensions();
        self.set_volume_size(VolumeSize {
            width,
            length,
            ..self.volume
        })
    }

    /// Set box depth and cube distance from a scan type.
    ///
    /// # Errors
    ///
    /// As [`ScanSession::apply_foot_size`].
    pub fn apply_scan_type(&mut self, scan_type: ScanType) -> SessionResult<VolumeSize> {
        self.require_presets()?;
        let (depth, distance) = scan_type.dimensions();
        self.set_cube_distance(distance)?;
        self.set_volume_size(VolumeSize {
            depth,
            ..self.volume
        })
    }

    /// Set the fixed-cube distance, clamped to `[0.1, 1.5]` m.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::VolumeLocked`] outside cube placement.
    pub fn set_cube_distance(&mut self, meters: f32) -> SessionResult<f32> {
        self.require_placement()?;
        self.cube_distance_m = keep_in_range(meters, MIN_CUBE_DISTANCE_M, MAX_CUBE_DISTANCE_M);
        Ok(self.cube_distance_m)
    }

    /// Switch gravity-aligned mode. The volume returns to the mode's default
    /// and the pose must be found again.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::VolumeLocked`] outside cube placement.
    pub fn set_gravity_aligned(&mut self, aligned: bool) -> SessionResult<()> {
        self.require_placement()?;
        if self.gravity_aligned == aligned {
            return Ok(());
        }
        self.gravity_aligned = aligned;
        let volume = SessionConfig {
            gravity_aligned: aligned,
            ..self.config.clone()
        }
        .initial_volume();
        self.volume = volume;
        self.update_voxel_size();
        self.initial_pose = None;
        info!(aligned, "gravity alignment changed");
        Ok(())
    }

    // =========================================================================
    // Sensor input
    // =========================================================================

    /// Record a device gravity reading. Ignored outside cube placement.
    pub fn process_motion(&mut self, gravity: Vec3) {
        if self.state == ScannerState::CubePlacement {
            self.device_gravity = gravity;
        }
    }

    /// Route one depth (and optional color) sample by state.
    ///
    /// In cube placement the depth frame goes to the pose initializer. While
    /// scanning it is tracked, fused when the pose is `High`, and offered as
    /// a keyframe when it carries color. In viewing it is dropped.
    ///
    /// # Errors
    ///
    /// Tracking and pose failures are absorbed into the tracker state; this
    /// only fails if the engine reports a configuration error.
    pub fn process_sample(&mut self, sample: &SensorSample) -> SessionResult<()> {
        match self.state {
            ScannerState::CubePlacement => {
                self.probe_depth(sample);
                self.place_cube(sample);
                Ok(())
            }
            ScannerState::Scanning => {
                self.probe_depth(sample);
                self.track(sample);
                Ok(())
            }
            ScannerState::Viewing => Ok(()),
        }
    }

    fn probe_depth(&mut self, sample: &SensorSample) {
        self.center_depth = sample.depth.center_mean_depth(CENTER_WINDOW_HALF);
    }

    fn place_cube(&mut self, sample: &SensorSample) {
        let gravity = if self.gravity_aligned {
            ALIGNED_GRAVITY
        } else {
            self.device_gravity
        };
        if gravity.length() <= MIN_GRAVITY_LENGTH {
            debug!("no usable gravity yet, skipping pose initialization");
            return;
        }

        let pose = match self.engine.initialize_pose(&sample.depth, gravity) {
            Ok(pose) => pose,
            Err(e) => {
                warn!(error = %e, "pose initialization failed");
                None
            }
        };

        self.initial_pose = pose.map(|p| {
            if self.config.fixed_cube_position {
                p.translated_local(Vec3::new(0.0, 0.0, -self.cube_distance_m))
            } else {
                p
            }
        });
        if let Some(p) = self.initial_pose {
            self.camera_pose = p;
        }
    }

    fn track(&mut self, sample: &SensorSample) {
        let update = match self.engine.track_frame(sample) {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, timestamp = sample.timestamp(), "tracking failed");
                self.accuracy = PoseAccuracy::NotAvailable;
                self.hints = TrackerHints {
                    tracker_is_lost: true,
                    ..TrackerHints::default()
                };
                self.gate.note_frame(self.camera_pose, sample.timestamp());
                return;
            }
        };

        self.camera_pose = update.pose;
        self.accuracy = update.accuracy;
        self.hints = update.hints;

        if update.accuracy == PoseAccuracy::High {
            self.engine.integrate(&sample.depth, &update.pose);
        }

        match &sample.color {
            Some(color) => {
                let candidate = KeyframeCandidate {
                    pose: update.pose,
                    accuracy: update.accuracy,
                    timestamp: sample.timestamp(),
                };
                if self.gate.observe(&candidate).is_accepted() {
                    self.engine
                        .add_keyframe(Keyframe::new(update.pose, color.clone()));
                }
            }
            None => self.gate.note_frame(update.pose, sample.timestamp()),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// The scan button: starts scanning from cube placement, finishes it
    /// while scanning. Returns the state afterwards.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] in viewing, otherwise as
    /// [`ScanSession::start_scanning`] and [`ScanSession::finish_scanning`].
    pub fn trigger(&mut self) -> SessionResult<ScannerState> {
        match self.state {
            ScannerState::CubePlacement => {
                self.start_scanning()?;
            }
            ScannerState::Scanning => {
                self.finish_scanning()?;
            }
            ScannerState::Viewing => {
                return Err(SessionError::invalid_state("trigger", self.state));
            }
        }
        Ok(self.state)
    }

    /// Enter scanning with the current volume and voxel size.
    ///
    /// Returns `false` (and stays in cube placement) while no valid pose is
    /// known.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] outside cube placement, or the
    /// engine's error if it rejects the mapper configuration.
    pub fn start_scanning(&mut self) -> SessionResult<bool> {
        if self.state != ScannerState::CubePlacement {
            return Err(SessionError::invalid_state("start scanning", self.state));
        }
        let Some(pose) = self.initial_pose else {
            debug!("start ignored, no valid pose");
            return Ok(false);
        };

        let mapper = MapperConfig::new(self.volume, self.voxel_size, self.config.turntable_tracking);
        self.engine.configure_mapper(&mapper)?;
        self.engine.set_initial_pose(&pose);
        self.capture.set_color_exposure(ExposureMode::Locked);
        self.gate.reset();
        self.camera_pose = pose;
        self.accuracy = PoseAccuracy::NotAvailable;
        self.hints = TrackerHints::default();
        self.state = ScannerState::Scanning;
        info!(
            voxel = mapper.voxel_size,
            bounds = ?mapper.volume_bounds,
            "scanning started"
        );
        Ok(true)
    }

    /// Stop streaming and finalize the mesh.
    ///
    /// An empty mesh resets the session to cube placement.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] outside scanning,
    /// [`SessionError::EmptyMesh`] or the engine's finalize error (both after
    /// a reset).
    pub fn finish_scanning(&mut self) -> SessionResult<ScanMesh> {
        if self.state != ScannerState::Scanning {
            return Err(SessionError::invalid_state("finish scanning", self.state));
        }
        self.capture.set_streaming(false);
        self.state = ScannerState::Viewing;

        let mesh = match self.engine.finalize_mesh() {
            Ok(mesh) => mesh,
            Err(e) => {
                warn!(error = %e, "finalize failed, resetting");
                self.reset();
                return Err(e.into());
            }
        };
        if mesh.is_empty() {
            warn!(
                vertices = mesh.vertex_count(),
                faces = mesh.face_count(),
                "finalized mesh is empty, resetting"
            );
            self.reset();
            return Err(SessionError::EmptyMesh);
        }

        info!(
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            keyframes = self.gate.keyframe_count(),
            "scan finalized"
        );
        self.mesh = Some(mesh.clone());
        Ok(mesh)
    }

    /// React to a low-memory warning.
    ///
    /// Scanning stops and moves to viewing. In viewing, running
    /// post-processing is cancelled and the last committed mesh stays.
    /// Each kind of notice is yielded once until
    /// [`ScanSession::acknowledge_notice`].
    ///
    /// # Errors
    ///
    /// As [`ScanSession::finish_scanning`] when scanning is stopped.
    pub fn handle_memory_pressure(&mut self) -> SessionResult<Option<UserNotice>> {
        match self.state {
            ScannerState::CubePlacement => Ok(None),
            ScannerState::Scanning => {
                warn!("memory pressure while scanning, stopping");
                self.finish_scanning()?;
                Ok(self.notice_once(UserNotice::SCAN_STOPPED_LOW_MEMORY))
            }
            ScannerState::Viewing => {
                if self.pipeline.cancel_all() {
                    warn!("memory pressure while post-processing, cancelled");
                    Ok(self.notice_once(UserNotice::COLORIZE_CANCELLED_LOW_MEMORY))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// The user dismissed the notices shown so far.
    pub fn acknowledge_notice(&mut self) {
        self.notices_shown.clear();
    }

    fn notice_once(&mut self, notice: UserNotice) -> Option<UserNotice> {
        if self.notices_shown.contains(&notice) {
            None
        } else {
            self.notices_shown.push(notice.clone());
            Some(notice)
        }
    }

    /// The app went to the background. A scan in progress is abandoned.
    pub fn on_background(&mut self) {
        if self.state == ScannerState::Scanning {
            info!("backgrounded while scanning, resetting");
            self.reset();
        }
    }

    /// The user left the viewer.
    pub fn complete_viewing(&mut self) {
        self.reset();
    }

    /// Back to cube placement with configured defaults. Discards the pose,
    /// volume overrides, keyframes and mesh.
    pub fn reset(&mut self) {
        self.pipeline.cancel_all();
        self.engine.reset();

        self.state = ScannerState::CubePlacement;
        self.gravity_aligned = self.config.gravity_aligned;
        self.volume = self.config.initial_volume();
        self.voxel_quality = self.config.voxel_quality;
        self.update_voxel_size();
        self.cube_distance_m = self.config.cube_distance_m;
        self.device_gravity = Vec3::ZERO;

        self.initial_pose = None;
        self.camera_pose = CameraPose::IDENTITY;
        self.accuracy = PoseAccuracy::NotAvailable;
        self.hints = TrackerHints::default();
        self.center_depth = None;
        self.gate.reset();
        self.mesh = None;
        self.notices_shown.clear();

        self.capture.set_streaming(true);
        self.capture.set_color_exposure(ExposureMode::Auto);
        info!("session reset");
    }

    // =========================================================================
    // Post-processing
    // =========================================================================

    /// Start hole fill and colorization of the finalized mesh.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] outside viewing or without a mesh,
    /// [`SessionError::Busy`] while a run is active.
    pub fn start_post_processing(&mut self) -> SessionResult<()> {
        if self.state != ScannerState::Viewing {
            return Err(SessionError::invalid_state("post-processing", self.state));
        }
        let mesh = self
            .mesh
            .clone()
            .ok_or(SessionError::invalid_state("post-processing", self.state))?;
        self.pipeline.start(mesh)
    }

    /// Apply finished stages without blocking. Colorized meshes become the
    /// committed mesh.
    pub fn poll_post_processing(&mut self) -> Vec<PipelineEvent> {
        let events = self.pipeline.poll();
        self.commit(&events);
        events
    }

    /// As [`ScanSession::poll_post_processing`], waiting up to `timeout` for
    /// the first message.
    pub fn poll_post_processing_timeout(&mut self, timeout: Duration) -> Vec<PipelineEvent> {
        let events = self.pipeline.poll_timeout(timeout);
        self.commit(&events);
        events
    }

    /// Cancel a stage and everything after it.
    pub fn cancel_post_processing(&mut self, kind: StageKind) -> bool {
        self.pipeline.cancel(kind)
    }

    fn commit(&mut self, events: &[PipelineEvent]) {
        for event in events {
            if let PipelineEvent::PreviewReady(mesh) | PipelineEvent::EnhancedReady(mesh) = event {
                self.mesh = Some(mesh.clone());
            }
        }
    }

    // =========================================================================
    // Feedback
    // =========================================================================

    /// Degrees turned since scanning started; 0 outside scanning.
    #[must_use]
    pub fn rotation_progress_degrees(&self) -> f32 {
        match (self.state, &self.initial_pose) {
            (ScannerState::Scanning, Some(initial)) => {
                delta_rotation_degrees(initial, &self.camera_pose)
            }
            _ => 0.0,
        }
    }

    /// Tracker message to show while scanning.
    #[must_use]
    pub const fn tracker_message(&self) -> Option<&'static str> {
        match self.state {
            ScannerState::Scanning => self.hints.message(),
            _ => None,
        }
    }

    /// Opacity of the live mesh for the current accuracy.
    #[must_use]
    pub const fn mesh_alpha(&self) -> f32 {
        self.accuracy.mesh_alpha()
    }

    /// Mean depth at the center of the last frame, for distance guidance.
    #[must_use]
    pub const fn center_depth(&self) -> Option<f32> {
        self.center_depth
    }

    fn update_voxel_size(&mut self) {
        self.voxel_size = self.voxel_quality.voxel_size(&self.volume);
    }

    fn require_placement(&self) -> SessionResult<()> {
        if self.state == ScannerState::CubePlacement {
            Ok(())
        } else {
            Err(SessionError::VolumeLocked)
        }
    }

    fn require_presets(&self) -> SessionResult<()> {
        self.require_placement()?;
        if self.gravity_aligned {
            Ok(())
        } else {
            Err(SessionError::PresetsRequireAlignedMode)
        }
    }
}
