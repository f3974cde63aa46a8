//! Error types for keyframe selection.

use thiserror::Error;

/// Result type for keyframe operations.
pub type Result<T> = std::result::Result<T, KeyframeError>;

/// Errors that can occur when configuring keyframe selection.
#[derive(Debug, Error, PartialEq)]
pub enum KeyframeError {
    /// A policy threshold is out of range.
    #[error("invalid keyframe policy: {0}")]
    InvalidPolicy(String),
}

impl KeyframeError {
    /// Creates an invalid policy error.
    #[must_use]
    pub fn invalid_policy(reason: impl Into<String>) -> Self {
        Self::InvalidPolicy(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = KeyframeError::invalid_policy("max_keyframes must be positive");
        assert_eq!(
            err.to_string(),
            "invalid keyframe policy: max_keyframes must be positive"
        );
    }
}
