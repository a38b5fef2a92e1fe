// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of where preview frames come from:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Scan Session                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  Camera traits   │  │  File camera    │  │
//! │  │  + FrameSource   │◀─│ (still images)  │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Device traits, camera selection, frame delivery and auto-focus
//! - [`virtual_camera`]: A camera device backed by image files

pub mod camera;
pub mod virtual_camera;
