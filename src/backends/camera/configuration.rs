// SPDX-License-Identifier: GPL-3.0-only

//! Device parameter negotiation
//!
//! Picks a preview size for the screen, then applies focus and torch settings.
//! When the device rejects the desired parameters, the saved parameters are
//! restored and a minimal safe-mode set is tried once.

use super::CameraDevice;
use super::types::{CameraParameters, FocusMode, Resolution};
use crate::errors::CameraError;
use tracing::{debug, info, warn};

/// Choose the supported preview size that best matches the screen
///
/// Candidates are compared in landscape orientation. The smallest aspect
/// ratio distortion wins; ties go to the larger area. Falls back to the
/// device's current preview size when it reports no alternatives.
pub fn find_best_preview_size(params: &CameraParameters, screen: Resolution) -> Resolution {
    let screen = screen.landscape();
    let screen_aspect = screen.width as f64 / screen.height.max(1) as f64;

    let best = params
        .supported_preview_sizes
        .iter()
        .filter(|size| size.width > 0 && size.height > 0)
        .min_by(|a, b| {
            let distortion = |size: &Resolution| {
                let size = size.landscape();
                (size.width as f64 / size.height as f64 - screen_aspect).abs()
            };
            distortion(a)
                .total_cmp(&distortion(b))
                .then_with(|| b.area().cmp(&a.area()))
        })
        .copied()
        .unwrap_or(params.preview_size);

    debug!(preview = %best, screen = %screen, "Selected preview size");
    best
}

/// Parameters the scanner wants from the device
///
/// Safe mode keeps the device's own focus mode and leaves the torch off.
pub fn desired_parameters(
    current: &CameraParameters,
    preview_size: Resolution,
    torch: bool,
    safe_mode: bool,
) -> CameraParameters {
    let mut params = current.clone();
    params.preview_size = preview_size;

    if safe_mode {
        params.torch = false;
        return params;
    }

    if let Some(mode) = [FocusMode::Auto, FocusMode::Macro]
        .into_iter()
        .find(|mode| current.supported_focus_modes.contains(mode))
    {
        params.focus_mode = mode;
    }
    params.torch = torch && current.torch_supported;
    params
}

/// Apply the desired parameters, falling back to safe mode once
pub fn apply_parameters(
    device: &mut dyn CameraDevice,
    preview_size: Resolution,
    torch: bool,
) -> Result<(), CameraError> {
    let saved = device.parameters();

    let desired = desired_parameters(&saved, preview_size, torch, false);
    let Err(e) = device.set_parameters(&desired) else {
        return Ok(());
    };

    warn!(error = %e, "Camera rejected parameters. Setting only minimal safe-mode parameters");
    info!(?saved, "Resetting to saved camera params");

    let result = device.set_parameters(&saved).and_then(|()| {
        let safe = desired_parameters(&saved, preview_size, torch, true);
        device.set_parameters(&safe)
    });

    result.map_err(|e| {
        warn!(error = %e, "Camera rejected even safe-mode parameters! No configuration");
        CameraError::RejectedParameters(e.to_string())
    })
}
