// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Delay between the end of one focus cycle and the start of the next
pub const AUTO_FOCUS_INTERVAL: Duration = Duration::from_millis(2000);

/// How long teardown waits for the decode worker thread before giving up on it
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause between results when scanning continuously (bulk mode)
pub const DEFAULT_BULK_SCAN_DELAY: Duration = Duration::from_millis(1000);

/// Screen resolution assumed when the configuration does not provide one
pub const DEFAULT_SCREEN_WIDTH: u32 = 1080;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1920;

/// Scan-rectangle limits
///
/// The framing rect targets 5/8 of each screen dimension and is clamped to
/// these bounds. The maxima correspond to 5/8 of a 1920x1080 display.
pub mod framing {
    pub const MIN_FRAME_WIDTH: u32 = 240;
    pub const MIN_FRAME_HEIGHT: u32 = 240;
    pub const MAX_FRAME_WIDTH: u32 = 1200; // = 5/8 * 1920
    pub const MAX_FRAME_HEIGHT: u32 = 675; // = 5/8 * 1080

    /// Numerator and denominator of the target fraction of the screen
    pub const TARGET_NUMERATOR: u32 = 5;
    pub const TARGET_DENOMINATOR: u32 = 8;
}

/// Thumbnail rendered alongside a successful decode
pub mod thumbnail {
    /// The region of interest is always scaled down by at least this factor
    pub const MIN_DOWNSCALE: u32 = 2;
    /// Longest side of the thumbnail in pixels
    pub const MAX_DIMENSION: u32 = 256;
    /// JPEG quality used when compressing the thumbnail
    pub const JPEG_QUALITY: u8 = 50;
}

/// File camera timing
pub mod file_camera {
    use std::time::Duration;

    /// Simulated time between a frame request and its delivery (~30 fps)
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);
    /// Simulated duration of one focus cycle
    pub const FOCUS_DURATION: Duration = Duration::from_millis(150);
}

/// Supported input file formats
pub mod file_formats {
    /// Image extensions the file camera can load
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tiff"];

    /// Check if an extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }
}
