// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoding
//!
//! This module implements the [`Decoder`] seam with the rqrr crate. The scan
//! region is handed to rqrr as greyscale directly; no colour conversion or
//! copy of the frame is needed.

use crate::frame_processor::decoder::Decoder;
use crate::frame_processor::luminance::DecodeInput;
use crate::frame_processor::types::{ResultPoint, Symbol, SymbolFormat};
use std::time::Instant;
use tracing::{debug, trace};

/// QR code decoder
///
/// Returns the first grid in the region that decodes. Grids that are found
/// but fail to decode (damaged, partially out of frame) are skipped.
#[derive(Debug, Default)]
pub struct QrDecoder {
    attempts: u64,
}

impl QrDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of decode attempts so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl Decoder for QrDecoder {
    fn decode(&mut self, input: &DecodeInput) -> Option<Symbol> {
        let start = Instant::now();
        self.attempts += 1;

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            input.width() as usize,
            input.height() as usize,
            |x, y| input.pixel(x as u32, y as u32),
        );
        let grids = prepared.detect_grids();

        trace!(
            width = input.width(),
            height = input.height(),
            grids = grids.len(),
            detection_ms = start.elapsed().as_millis(),
            "QR detection complete"
        );

        for grid in grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    debug!(
                        version = meta.version.0,
                        total_ms = start.elapsed().as_millis(),
                        "Decoded QR code"
                    );
                    let points = grid
                        .bounds
                        .iter()
                        .map(|p| ResultPoint::new(p.x as f32, p.y as f32))
                        .collect();
                    return Some(Symbol {
                        payload: content,
                        format: SymbolFormat::QrCode,
                        points,
                    });
                }
                Err(e) => debug!(error = %e, "Failed to decode QR grid"),
            }
        }

        None
    }
}
