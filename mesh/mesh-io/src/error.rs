//! Error types for mesh I/O operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for mesh I/O operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors that can occur during mesh I/O operations.
///
/// Failures are split three ways so callers can report them differently:
/// the source could not be read, the destination could not be written, or
/// the bytes themselves break the binary STL layout.
#[derive(Debug, Error)]
pub enum IoError {
    /// A source file could not be opened or read.
    #[error("cannot read {path}: {source}")]
    SourceUnreadable {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A destination file could not be created or written.
    #[error("cannot write {path}: {source}")]
    DestinationUnwritable {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Buffer is shorter than the 80-byte header plus the triangle count.
    #[error("binary STL too small: {actual} bytes, need at least {minimum}")]
    TooSmall {
        /// Actual buffer length.
        actual: u64,
        /// Minimum valid length.
        minimum: u64,
    },

    /// Buffer length disagrees with the declared triangle count.
    #[error(
        "binary STL size mismatch: header declares {triangle_count} triangles \
         ({expected} bytes), got {actual} bytes"
    )]
    SizeMismatch {
        /// Triangle count read from the header.
        triangle_count: u32,
        /// Size implied by the triangle count.
        expected: u64,
        /// Actual buffer length.
        actual: u64,
    },

    /// More triangles than a u32 count field can describe.
    #[error("too many triangles for binary STL: {count}")]
    TooManyTriangles {
        /// Number of triangles requested.
        count: usize,
    },

    /// Writing to an in-memory or caller-provided sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive could not be assembled.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl IoError {
    /// Wrap an I/O error raised while reading `path`.
    #[must_use]
    pub fn source_unreadable(path: &Path, source: std::io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Wrap an I/O error raised while writing `path`.
    #[must_use]
    pub fn destination_unwritable(path: &Path, source: std::io::Error) -> Self {
        Self::DestinationUnwritable {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the error describes malformed binary STL content rather
    /// than a file-system failure.
    #[must_use]
    pub const fn is_format_violation(&self) -> bool {
        matches!(
            self,
            Self::TooSmall { .. } | Self::SizeMismatch { .. } | Self::TooManyTriangles { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mismatch_display() {
        let err = IoError::SizeMismatch {
            triangle_count: 2,
            expected: 184,
            actual: 150,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 triangles"));
        assert!(msg.contains("184"));
        assert!(msg.contains("150"));
    }

    #[test]
    fn format_violation_classification() {
        assert!(
            IoError::TooSmall {
                actual: 3,
                minimum: 84
            }
            .is_format_violation()
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = IoError::source_unreadable(Path::new("left.stl"), io);
        assert!(!err.is_format_violation());
        assert!(err.to_string().contains("left.stl"));
    }
}
