// SPDX-License-Identifier: GPL-3.0-only

//! Image loading for the file camera
//!
//! Images are decoded once, converted to their luminance plane and shared as
//! preview frames. Every frame of one camera has the size of the first image.

use crate::backends::camera::types::{BackendError, BackendResult, Frame, Resolution};
use crate::constants::file_formats;
use image::imageops::{self, FilterType};
use std::path::Path;
use tracing::{debug, info};

/// Load an image file as a luminance frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<Frame> {
    info!(path = %path.display(), "Loading image file");
    check_extension(path)?;

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();
    debug!(width, height, "Image loaded successfully");
    Ok(Frame::new(luma.into_raw(), width, height))
}

/// Load every image, resizing later ones to the size of the first
pub fn load_frames<P: AsRef<Path>>(paths: &[P]) -> BackendResult<Vec<Frame>> {
    let mut frames: Vec<Frame> = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let frame = load_image_as_frame(path)?;

        let frame = match frames.first() {
            Some(first) if (first.width, first.height) != (frame.width, frame.height) => {
                debug!(
                    path = %path.display(),
                    from = %Resolution::new(frame.width, frame.height),
                    to = %Resolution::new(first.width, first.height),
                    "Resizing image to match the first frame"
                );
                resize_frame(&frame, first.width, first.height)?
            }
            _ => frame,
        };
        frames.push(frame);
    }

    if frames.is_empty() {
        return Err(BackendError::DeviceNotFound("No image files given".into()));
    }
    Ok(frames)
}

/// Dimensions of an image without decoding its pixels
pub fn image_size(path: &Path) -> BackendResult<Resolution> {
    check_extension(path)?;
    let (width, height) = image::image_dimensions(path).map_err(|e| {
        BackendError::Other(format!("Failed to read image '{}': {}", path.display(), e))
    })?;
    Ok(Resolution::new(width, height))
}

fn check_extension(path: &Path) -> BackendResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if file_formats::is_image_extension(&extension) {
        Ok(())
    } else {
        Err(BackendError::Other(format!(
            "Unsupported file format: {}",
            path.display()
        )))
    }
}

fn resize_frame(frame: &Frame, width: u32, height: u32) -> BackendResult<Frame> {
    let luma = image::GrayImage::from_raw(frame.width, frame.height, frame.data.to_vec())
        .ok_or_else(|| BackendError::Other("Frame buffer does not match its size".into()))?;
    let resized = imageops::resize(&luma, width, height, FilterType::Triangle);
    Ok(Frame::new(resized.into_raw(), width, height))
}
