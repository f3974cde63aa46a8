//! Error types for scan sessions.

use thiserror::Error;

use crate::engine::EngineError;
use crate::state::{ScannerState, UserNotice};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the session, the pipeline and artifact delivery.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation is not allowed in the current state.
    #[error("{operation} is not allowed while {state:?}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: ScannerState,
    },

    /// Volume and voxel settings are frozen once scanning starts.
    #[error("scan volume can only change during cube placement")]
    VolumeLocked,

    /// Foot and scan type presets need the gravity-aligned volume.
    #[error("volume presets require gravity-aligned mode")]
    PresetsRequireAlignedMode,

    /// The finalized mesh had no vertices or no faces.
    #[error("finalized mesh is empty")]
    EmptyMesh,

    /// Post-processing is already running.
    #[error("post-processing is already running")]
    Busy,

    /// The reconstruction engine failed.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Mesh encoding, merge or packaging failed.
    #[error("mesh I/O error: {0}")]
    Io(#[from] mesh_io::IoError),

    /// Session configuration is malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Keyframe policy failed validation.
    #[error("keyframe policy: {0}")]
    Keyframe(#[from] scan_keyframe::KeyframeError),

    /// An artifact upload failed.
    #[error("upload failed: {0}")]
    Upload(#[from] crate::delivery::UploadError),

    /// A post-processing worker thread could not be started.
    #[error("cannot start worker thread: {0}")]
    Spawn(std::io::Error),
}

impl SessionError {
    /// Creates an invalid-state error.
    #[must_use]
    pub const fn invalid_state(operation: &'static str, state: ScannerState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The alert the UI shows for this error, if any.
    #[must_use]
    pub const fn user_notice(&self) -> Option<UserNotice> {
        match self {
            Self::EmptyMesh => Some(UserNotice::EMPTY_MESH),
            _ => None,
        }
    }
}
