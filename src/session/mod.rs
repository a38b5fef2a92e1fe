// SPDX-License-Identifier: GPL-3.0-only

//! Scan sessions
//!
//! A session ties a [`FrameSource`](crate::backends::camera::FrameSource), a
//! decode worker and a [`Consumer`] together. Start one with
//! [`ScanSession::start`]; drive it from outside through a [`SessionHandle`].

mod consumer;
mod controller;
mod message;

pub use consumer::{Consumer, ScanDecision, ScanResult};
pub use controller::{ScanSession, SessionController, SessionHandle, SessionState};
pub use message::SessionMessage;
