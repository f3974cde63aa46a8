//! Error types for scan data validation.

use thiserror::Error;

/// Errors raised when constructing scan data from raw buffers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanTypesError {
    /// Buffer size does not match the declared dimensions.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected buffer size.
        expected: usize,
        /// Actual buffer size.
        actual: usize,
    },

    /// Image dimensions are zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index}, mesh has {vertex_count} vertices")]
    FaceIndexOutOfRange {
        /// Face position in the face list.
        face: usize,
        /// Offending vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// Per-vertex attribute length differs from the vertex count.
    #[error("per-vertex colors: expected {expected}, got {actual}")]
    ColorCountMismatch {
        /// Number of vertices.
        expected: usize,
        /// Number of colors supplied.
        actual: usize,
    },
}

impl ScanTypesError {
    /// Creates a buffer size mismatch error.
    #[must_use]
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }
}
