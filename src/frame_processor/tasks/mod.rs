// SPDX-License-Identifier: GPL-3.0-only

//! Decoder implementations
//!
//! This module contains the symbologies the decode worker can run.

pub mod qr_detector;

pub use qr_detector::QrDecoder;
