// SPDX-License-Identifier: GPL-3.0-only

//! Luminance crops handed to decoders
//!
//! A [`DecodeInput`] is a window onto the luminance plane of a preview frame.
//! The frame buffer is shared, never copied, until a thumbnail is rendered.

use crate::backends::camera::types::Rect;
use crate::constants::thumbnail::{MAX_DIMENSION, MIN_DOWNSCALE};
use image::{GrayImage, Luma, imageops};
use std::sync::Arc;

/// Scan region of one preview frame
#[derive(Clone)]
pub struct DecodeInput {
    data: Arc<[u8]>,
    data_width: u32,
    region: Rect,
}

impl DecodeInput {
    /// Crop `data` (at least `data_width * data_height` luminance bytes)
    /// to `region`
    ///
    /// Returns `None` if the buffer is too short or the region does not lie
    /// inside the frame.
    pub fn new(data: Arc<[u8]>, data_width: u32, data_height: u32, region: Rect) -> Option<Self> {
        let plane = data_width as usize * data_height as usize;
        if data.len() < plane || !region.fits_within(data_width, data_height) {
            return None;
        }
        Some(Self {
            data,
            data_width,
            region,
        })
    }

    /// Crop covering the whole frame
    pub fn full_frame(data: Arc<[u8]>, width: u32, height: u32) -> Option<Self> {
        Self::new(data, width, height, Rect::new(0, 0, width as i32, height as i32))
    }

    pub fn width(&self) -> u32 {
        self.region.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.region.height() as u32
    }

    /// The region in frame coordinates
    pub fn region(&self) -> Rect {
        self.region
    }

    /// Luminance at `(x, y)` relative to the region's top-left corner
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        let fx = self.region.left as usize + x as usize;
        let fy = self.region.top as usize + y as usize;
        self.data[fy * self.data_width as usize + fx]
    }

    /// The region as an owned greyscale image
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| Luma([self.pixel(x, y)]))
    }

    /// Downscaled greyscale copy of the region
    ///
    /// Shrinks by at least [`MIN_DOWNSCALE`] and far enough that the longer
    /// side is at most [`MAX_DIMENSION`].
    pub fn render_thumbnail(&self) -> GrayImage {
        let longest = self.width().max(self.height());
        let factor = MIN_DOWNSCALE.max(longest.div_ceil(MAX_DIMENSION));
        let width = (self.width() / factor).max(1);
        let height = (self.height() / factor).max(1);
        imageops::thumbnail(&self.to_image(), width, height)
    }
}

impl std::fmt::Debug for DecodeInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeInput")
            .field("region", &self.region)
            .field("data_width", &self.data_width)
            .finish()
    }
}
