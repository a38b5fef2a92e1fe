// SPDX-License-Identifier: GPL-3.0-only

//! The consumer of scan results
//!
//! A consumer sits outside the pipeline: it is told when to redraw the scan
//! guide, receives each successful decode and decides what happens next.

use crate::errors::CameraError;
use crate::frame_processor::{DecodedSymbol, ResultPoint, ScanAction, SymbolFormat};
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::time::Duration;
use tracing::warn;

/// What the session does after a result has been handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// End the session
    Stop,
    /// Scan again after the delay
    Continue(Duration),
    /// Keep the result on screen until told otherwise through the handle
    Hold,
}

/// A successful decode, prepared for display
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub payload: String,
    pub format: SymbolFormat,
    /// Symbol corners in scan-region coordinates
    pub points: Vec<ResultPoint>,
    /// Greyscale thumbnail of the scan region, expanded to RGBA so it can be
    /// drawn on
    pub thumbnail: Option<RgbaImage>,
    /// Thumbnail pixels per scan-region pixel; 1.0 without a thumbnail
    pub scale_factor: f32,
    pub decoded_at: DateTime<Local>,
}

impl ScanResult {
    pub fn from_decoded(symbol: DecodedSymbol) -> Self {
        let thumbnail = symbol.thumbnail.as_deref().and_then(|bytes| {
            image::load_from_memory(bytes)
                .map(|img| img.to_rgba8())
                .map_err(|e| warn!(error = %e, "Could not decode thumbnail"))
                .ok()
        });
        let scale_factor = match thumbnail {
            Some(_) => symbol.scale_factor.unwrap_or(1.0),
            None => 1.0,
        };

        Self {
            payload: symbol.symbol_payload,
            format: symbol.symbol_format,
            points: symbol.render_points,
            thumbnail,
            scale_factor,
            decoded_at: Local::now(),
        }
    }

    /// Symbol corners in thumbnail coordinates
    pub fn thumbnail_points(&self) -> Vec<ResultPoint> {
        self.points
            .iter()
            .map(|p| ResultPoint::new(p.x * self.scale_factor, p.y * self.scale_factor))
            .collect()
    }

    pub fn action(&self) -> ScanAction {
        ScanAction::parse(&self.payload)
    }
}

/// Receives scan results
///
/// All methods run on the session's controller task and should return
/// quickly.
pub trait Consumer: Send {
    /// A symbol was decoded; the session is now showing a result
    fn on_result(&mut self, result: ScanResult) -> ScanDecision;

    /// Scanning (re)started; redraw the scan guide
    fn draw_viewfinder(&mut self) {}

    /// The camera could not be opened or started
    fn on_fatal(&mut self, error: &CameraError) {
        warn!(error = %error, "Scan session failed");
    }
}
