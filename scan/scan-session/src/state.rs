//! Scanner states and user-facing notices.

use serde::{Deserialize, Serialize};

/// The three phases of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScannerState {
    /// Placing the scan volume over the foot. Volume settings are editable.
    #[default]
    CubePlacement,
    /// Tracking and fusing frames.
    Scanning,
    /// Streaming stopped; the finalized mesh is shown and post-processed.
    Viewing,
}

impl ScannerState {
    /// Label for logs and UI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CubePlacement => "cube placement",
            Self::Scanning => "scanning",
            Self::Viewing => "viewing",
        }
    }
}

/// A message the UI should show once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    /// Alert title.
    pub title: &'static str,
    /// Alert body.
    pub message: &'static str,
}

impl UserNotice {
    /// Scanning stopped early because memory ran low.
    pub const SCAN_STOPPED_LOW_MEMORY: Self = Self {
        title: "Memory Low",
        message: "Scanning stopped because the device is running out of memory.",
    };

    /// Colorization was cancelled because memory ran low.
    pub const COLORIZE_CANCELLED_LOW_MEMORY: Self = Self {
        title: "Memory Low",
        message: "Colorizing was cancelled because the device is running out of memory.",
    };

    /// Finalizing produced no surface.
    pub const EMPTY_MESH: Self = Self {
        title: "Empty Mesh",
        message: "The scan produced no surface. Please try again.",
    };
}
