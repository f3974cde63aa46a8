//! Foot scan session orchestration.
//!
//! Drives a depth-sensor scan from placing the scan volume to delivering a
//! colored mesh:
//!
//! - [`ScanSession`] - the cube placement / scanning / viewing state machine
//!   that routes sensor samples to a [`ReconstructionEngine`]
//! - [`PostProcessingPipeline`] - hole fill, preview and enhanced
//!   colorization on worker threads with cooperative cancellation
//! - [`SessionConfig`] - JSON-loadable settings
//! - [`package_scan`], [`deliver_bilateral`] - STL export, zip packaging,
//!   left/right merge and upload through an [`UploadService`]
//!
//! The engine and the capture device are traits; this crate contains no
//! reconstruction code.
//!
//! # Example
//!
//! ```
//! use scan_session::{VoxelQuality, VolumeSize};
//!
//! let volume = VolumeSize::default();
//! assert!((VoxelQuality::default().voxel_size(&volume) - 0.003).abs() < 1e-6);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod delivery;
mod engine;
mod error;
mod export;
mod pipeline;
mod session;
mod state;
mod volume;

pub use config::{MAX_CUBE_DISTANCE_M, MIN_CUBE_DISTANCE_M, SessionConfig, UNALIGNED_VOLUME_EDGE_M};
pub use delivery::{
    Artifact, ArtifactKind, AttachmentRecord, FootSide, MERGED_FILE_NAME, PREVIEW_ENTRY_NAME,
    UploadError, UploadService, UploadTarget, deliver, deliver_bilateral, package_scan,
};
pub use engine::{
    CancelToken, CaptureControl, ColorizeOptions, ColorizeQuality, EngineError, ExposureMode,
    HoleFillAlgorithm, HoleFillParams, ReconstructionEngine, TaskContext, TexturingMode,
};
pub use error::{SessionError, SessionResult};
pub use export::{EXPORT_HEADER_TEXT, to_stl, write_stl};
pub use pipeline::{
    PREVIEW_PROGRESS_END, PipelineEvent, PostProcessingPipeline, StageKind, TaskStatus,
};
pub use session::{ALIGNED_GRAVITY, MIN_GRAVITY_LENGTH, ScanSession};
pub use state::{ScannerState, UserNotice};
pub use volume::{
    ADAPTIVE_VOXELS_ACROSS, DEFAULT_VOXEL_CANDIDATE, FootSize, MAX_ADAPTIVE_VOXEL_M, MapperConfig,
    ScanType, VOXEL_SIZE_CANDIDATES_M, VolumeBounds, VolumeSize, VoxelMode, VoxelQuality,
    keep_in_range,
};
