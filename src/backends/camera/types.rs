// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Identifier attached to one single-shot frame request
///
/// Tags are issued by the session controller and only used to correlate a
/// request with the frame that eventually answers it in logs.
pub type FrameTag = u64;

/// Receives exactly one preview frame
pub type FrameCallback = Box<dyn FnOnce(Frame) + Send>;

/// Receives the outcome of one focus cycle (`true` when focus was acquired)
pub type FocusCallback = Box<dyn FnOnce(bool) + Send>;

/// A single preview frame
///
/// The buffer holds the luminance plane first (`width * height` bytes), as the
/// planar YUV formats camera previews use do; any chroma data that follows is
/// ignored by the scanner. The buffer is reference counted and never mutated
/// after capture, so handing a frame to the decode worker moves ownership
/// without copying pixels.
#[derive(Clone)]
pub struct Frame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(data: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            captured_at: Instant::now(),
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Which way a camera faces relative to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Back => write!(f, "BACK"),
            CameraFacing::Front => write!(f, "FRONT"),
        }
    }
}

/// Static description of a camera reported by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub name: String,
    pub facing: CameraFacing,
    /// Sensor mounting angle in degrees, clockwise
    pub orientation: u32,
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// The same resolution with the longer side first
    pub fn landscape(&self) -> Self {
        if self.width >= self.height {
            *self
        } else {
            Self::new(self.height, self.width)
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in pixel coordinates (right/bottom exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Check that the rect is non-empty and lies inside a `width x height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.width() > 0
            && self.height() > 0
            && self.right as i64 <= width as i64
            && self.bottom as i64 <= height as i64
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rect({}, {} - {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Focus modes a device may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusMode {
    Auto,
    Macro,
    ContinuousPicture,
    ContinuousVideo,
    Fixed,
    Infinity,
}

impl FocusMode {
    /// Modes in which focus only happens when explicitly triggered
    pub fn requires_trigger(&self) -> bool {
        matches!(self, FocusMode::Auto | FocusMode::Macro)
    }
}

/// Negotiable device parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraParameters {
    pub preview_size: Resolution,
    pub supported_preview_sizes: Vec<Resolution>,
    pub focus_mode: FocusMode,
    pub supported_focus_modes: Vec<FocusMode>,
    pub torch: bool,
    pub torch_supported: bool,
}

/// Result type for device operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors reported by camera devices and providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Device could not be opened
    InitializationFailed(String),
    /// Device not found
    DeviceNotFound(String),
    /// Parameters rejected by the device
    ParametersRejected(String),
    /// The device is closed or not previewing
    NotStreaming,
    /// I/O error
    IoError(String),
    /// Other error
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::ParametersRejected(msg) => write!(f, "Parameters rejected: {}", msg),
            BackendError::NotStreaming => write!(f, "Camera is not streaming"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
