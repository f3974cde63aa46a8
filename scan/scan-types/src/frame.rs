//! Depth and color frames delivered by the capture layer.
//!
//! Timestamps are seconds on the capture clock, as `f64`.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ScanTypesError;

/// Half-width of the window used by [`DepthFrame::center_mean_depth`].
pub const CENTER_WINDOW_HALF: u32 = 10;

/// A depth image in meters, row-major. Invalid pixels are `NaN`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DepthFrame {
    /// Capture time in seconds.
    pub timestamp: f64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Per-pixel depth: `depths[y * width + x]`.
    pub depths: Vec<f32>,
}

impl DepthFrame {
    /// Creates a depth frame, checking the buffer against the dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero or the buffer length is
    /// not `width * height`.
    pub fn new(
        timestamp: f64,
        width: u32,
        height: u32,
        depths: Vec<f32>,
    ) -> Result<Self, ScanTypesError> {
        if width == 0 || height == 0 {
            return Err(ScanTypesError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if depths.len() != expected {
            return Err(ScanTypesError::buffer_mismatch(expected, depths.len()));
        }
        Ok(Self {
            timestamp,
            width,
            height,
            depths,
        })
    }

    /// Depth at a pixel, `None` when out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.depths
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Mean of the valid depths in the `(2 * half + 1)` square window at the
    /// image center. Returns `None` when the window holds no valid pixel.
    #[must_use]
    pub fn center_mean_depth(&self, half: u32) -> Option<f32> {
        let cx = self.width / 2;
        let cy = self.height / 2;

        let mut sum = 0.0f64;
        let mut count = 0u32;
        for y in cy.saturating_sub(half)..=cy.saturating_add(half) {
            for x in cx.saturating_sub(half)..=cx.saturating_add(half) {
                if let Some(d) = self.get(x, y).filter(|d| !d.is_nan()) {
                    sum += f64::from(d);
                    count += 1;
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        (count > 0).then(|| (sum / f64::from(count)) as f32)
    }
}

/// Pixel layout of a color frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColorFormat {
    /// 8-bit RGB.
    Rgb8,
    /// 8-bit BGRA, as delivered by most mobile capture stacks.
    #[default]
    Bgra8,
    /// Bi-planar 4:2:0 luma/chroma.
    Yuv420,
}

impl ColorFormat {
    /// Buffer size for an image of the given dimensions.
    #[must_use]
    pub const fn buffer_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Rgb8 => pixels * 3,
            Self::Bgra8 => pixels * 4,
            Self::Yuv420 => pixels + pixels / 2,
        }
    }
}

/// A color image. Pixel data is shared so keyframes can hold frames cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    /// Capture time in seconds.
    pub timestamp: f64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: ColorFormat,
    data: Arc<[u8]>,
}

impl ColorFrame {
    /// Creates a color frame, checking the buffer against the dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero or the buffer length
    /// does not match the format.
    pub fn new(
        timestamp: f64,
        width: u32,
        height: u32,
        format: ColorFormat,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self, ScanTypesError> {
        if width == 0 || height == 0 {
            return Err(ScanTypesError::InvalidDimensions { width, height });
        }
        let data = data.into();
        let expected = format.buffer_len(width, height);
        if data.len() != expected {
            return Err(ScanTypesError::buffer_mismatch(expected, data.len()));
        }
        Ok(Self {
            timestamp,
            width,
            height,
            format,
            data,
        })
    }

    /// Raw pixel bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether two frames share the same pixel buffer.
    #[must_use]
    pub fn shares_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// One synchronized capture: depth plus optional color.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    /// Depth image.
    pub depth: DepthFrame,
    /// Color image, when the capture layer delivered one.
    pub color: Option<ColorFrame>,
}

impl SensorSample {
    /// Depth-only sample.
    #[must_use]
    pub const fn depth_only(depth: DepthFrame) -> Self {
        Self { depth, color: None }
    }

    /// Sample timestamp (the depth frame's).
    #[must_use]
    pub const fn timestamp(&self) -> f64 {
        self.depth.timestamp
    }
}
