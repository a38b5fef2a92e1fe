// SPDX-License-Identifier: MPL-2.0

//! QR Scan - A camera-fed QR code scanning pipeline
//!
//! This library captures single preview frames from a camera, decodes the
//! scan rectangle on a worker thread and hands results to a consumer.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera device abstraction, frame source and auto-focus
//! - [`frame_processor`]: Luminance crops, symbol decoding and the decode worker
//! - [`session`]: The scan session state machine and its consumer interface
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let frames = FrameSource::new(Arc::new(provider), config.to_camera_settings());
//! let session = ScanSession::start(frames, Box::new(QrDecoder::new()), consumer).await?;
//! session.wait().await;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod session;

// Re-export commonly used types
pub use backends::camera::{CameraSettings, FrameSource};
pub use config::ScanConfig;
pub use errors::{AppError, AppResult, CameraError};
pub use frame_processor::{QrDecoder, ScanAction};
pub use session::{Consumer, ScanDecision, ScanResult, ScanSession, SessionHandle};
