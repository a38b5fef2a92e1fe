// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The scanner talks to hardware through two small traits and never holds a
//! device handle outside [`FrameSource`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │  ← requests one frame at a time
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐      ┌─────────────────────┐
//! │     FrameSource     │ ───▶ │ AutoFocusController │
//! └──────────┬──────────┘      └─────────────────────┘
//!            │  (sole owner, behind one mutex)
//!            ▼
//! ┌─────────────────────┐
//! │ CameraDevice Trait  │  ← driver boundary
//! └─────────────────────┘
//! ```

pub mod auto_focus;
pub mod configuration;
pub mod frame_loop;
pub mod frame_source;
pub mod geometry;
#[cfg(test)]
pub(crate) mod mock;
pub mod open;
pub mod types;

pub use auto_focus::{AutoFocusController, FocusDriver, FocusRequest};
pub use frame_loop::{DeliveryLoop, LoopAction};
pub use frame_source::{CameraSettings, FrameSource};
pub use open::{OpenCamera, open_camera};
pub use types::*;

/// An opened camera device
///
/// Implementations wrap a driver handle. Dropping the device closes it.
///
/// Both callbacks must be invoked asynchronously: never from inside the call
/// that registered them. Callers hold locks while registering callbacks.
pub trait CameraDevice: Send {
    /// Current device parameters
    fn parameters(&self) -> CameraParameters;

    /// Apply a full parameter set
    fn set_parameters(&mut self, params: &CameraParameters) -> BackendResult<()>;

    /// Start streaming preview frames
    fn start_preview(&mut self) -> BackendResult<()>;

    /// Stop streaming preview frames
    ///
    /// Outstanding frame requests may still be answered afterwards; the
    /// frame source discards such late frames.
    fn stop_preview(&mut self);

    /// Deliver the next preview frame to `callback`, once
    fn request_one_frame(&mut self, callback: FrameCallback);

    /// Run one focus cycle and report its outcome to `callback`
    ///
    /// An `Err` means the trigger was rejected and `callback` will never run.
    fn trigger_auto_focus(&mut self, callback: FocusCallback) -> BackendResult<()>;

    /// Abort a focus cycle in progress, if any
    fn cancel_auto_focus(&mut self) -> BackendResult<()>;
}

/// Enumerates and opens cameras
pub trait CameraProvider: Send + Sync {
    /// Cameras in index order
    fn cameras(&self) -> Vec<CameraInfo>;

    /// Open the camera at `index`
    fn open(&self, index: usize) -> BackendResult<Box<dyn CameraDevice>>;
}
