// SPDX-License-Identifier: GPL-3.0-only

//! Camera selection
//!
//! An explicit index opens exactly that camera. Without one, the first
//! back-facing camera wins, falling back to index 0.

use super::CameraDevice;
use super::CameraProvider;
use super::types::CameraFacing;
use crate::errors::CameraError;
use tracing::{info, warn};

/// A camera that has been opened, together with what the provider knew about it
pub struct OpenCamera {
    pub index: usize,
    pub device: Box<dyn CameraDevice>,
    pub facing: CameraFacing,
    pub orientation: u32,
}

impl std::fmt::Display for OpenCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Camera #{} : {},{}",
            self.index, self.facing, self.orientation
        )
    }
}

impl std::fmt::Debug for OpenCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenCamera")
            .field("index", &self.index)
            .field("facing", &self.facing)
            .field("orientation", &self.orientation)
            .finish()
    }
}

/// Open the requested camera, or pick one
pub fn open_camera(
    provider: &dyn CameraProvider,
    requested: Option<usize>,
) -> Result<OpenCamera, CameraError> {
    let cameras = provider.cameras();
    if cameras.is_empty() {
        warn!("No cameras!");
        return Err(CameraError::NoCameraFound);
    }

    let index = match requested {
        Some(index) if index >= cameras.len() => {
            warn!(index, "Requested camera does not exist");
            return Err(CameraError::CameraNotFound(index));
        }
        Some(index) => index,
        None => match cameras
            .iter()
            .position(|camera| camera.facing == CameraFacing::Back)
        {
            Some(index) => index,
            None => {
                info!("No camera facing {}; returning camera #0", CameraFacing::Back);
                0
            }
        },
    };

    info!(index, name = %cameras[index].name, "Opening camera");
    let device = provider
        .open(index)
        .map_err(|e| CameraError::InitializationFailed(e.to_string()))?;

    Ok(OpenCamera {
        index,
        device,
        facing: cameras[index].facing,
        orientation: cameras[index].orientation,
    })
}
