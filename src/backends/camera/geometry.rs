// SPDX-License-Identifier: GPL-3.0-only

//! Scan-rectangle geometry
//!
//! The framing rect is where the viewfinder tells the user to hold the code.
//! It is computed in screen space, then mapped into preview space to pick the
//! region of each frame that is handed to the decoder.
//!
//! The automatic rect is always square: both sides use the smaller of the two
//! clamped dimensions. A manual rect keeps whatever aspect the caller asked for.

use super::types::{Rect, Resolution};
use crate::constants::framing::{
    MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH, MIN_FRAME_HEIGHT, MIN_FRAME_WIDTH, TARGET_DENOMINATOR,
    TARGET_NUMERATOR,
};

/// Target 5/8 of a screen dimension, clamped to `[hard_min, hard_max]`
pub fn find_desired_dimension_in_range(resolution: u32, hard_min: u32, hard_max: u32) -> u32 {
    let dim = TARGET_NUMERATOR as u64 * resolution as u64 / TARGET_DENOMINATOR as u64;
    dim.clamp(hard_min as u64, hard_max as u64) as u32
}

/// Square scan rect centred on the screen
pub fn compute_framing_rect(screen: Resolution) -> Rect {
    let width = find_desired_dimension_in_range(screen.width, MIN_FRAME_WIDTH, MAX_FRAME_WIDTH);
    let height =
        find_desired_dimension_in_range(screen.height, MIN_FRAME_HEIGHT, MAX_FRAME_HEIGHT);
    let side = width.min(height);
    centered(screen, side, side)
}

/// Caller-sized scan rect, clamped to the screen and centred
pub fn manual_framing_rect(screen: Resolution, width: u32, height: u32) -> Rect {
    centered(screen, width.min(screen.width), height.min(screen.height))
}

/// Map a screen-space rect into preview-frame coordinates
pub fn framing_rect_in_preview(rect: Rect, camera: Resolution, screen: Resolution) -> Rect {
    let scale_x = |v: i32| (v as i64 * camera.width as i64 / screen.width.max(1) as i64) as i32;
    let scale_y = |v: i32| (v as i64 * camera.height as i64 / screen.height.max(1) as i64) as i32;
    Rect::new(
        scale_x(rect.left),
        scale_y(rect.top),
        scale_x(rect.right),
        scale_y(rect.bottom),
    )
}

fn centered(screen: Resolution, width: u32, height: u32) -> Rect {
    let left = (screen.width as i32 - width as i32) / 2;
    let top = (screen.height as i32 - height as i32) / 2;
    Rect::new(left, top, left + width as i32, top + height as i32)
}
