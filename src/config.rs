// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CameraSettings;
use crate::backends::camera::types::Resolution;
use crate::constants::{DEFAULT_BULK_SCAN_DELAY, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the configuration directory under the user's config dir
const CONFIG_DIR: &str = "qrscan";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Camera index to use instead of the first back-facing camera
    pub camera_id: Option<usize>,
    /// Manual scan rect width in screen pixels
    pub framing_width: Option<u32>,
    /// Manual scan rect height in screen pixels
    pub framing_height: Option<u32>,
    /// Turn the torch on while scanning
    pub torch: bool,
    /// Run the periodic auto-focus cycle
    pub auto_focus: bool,
    /// Viewfinder surface size
    pub screen_width: u32,
    pub screen_height: u32,
    /// Keep scanning after each result
    pub bulk_mode: bool,
    /// Pause between results in bulk mode
    pub bulk_scan_delay_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            camera_id: None,
            framing_width: None,
            framing_height: None,
            torch: false,
            auto_focus: true,
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            bulk_mode: false,
            bulk_scan_delay_ms: DEFAULT_BULK_SCAN_DELAY.as_millis() as u64,
        }
    }
}

impl ScanConfig {
    /// Default location: `<config dir>/qrscan/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the configuration, falling back to defaults when the file is missing
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file; using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from [`Self::default_path`], or defaults if there is no config dir
    pub fn load_default() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Manual scan rect size, if both dimensions are set
    pub fn framing_size(&self) -> Option<Resolution> {
        match (self.framing_width, self.framing_height) {
            (Some(width), Some(height)) => Some(Resolution::new(width, height)),
            _ => None,
        }
    }

    pub fn bulk_scan_delay(&self) -> Duration {
        Duration::from_millis(self.bulk_scan_delay_ms)
    }

    pub fn to_camera_settings(&self) -> CameraSettings {
        CameraSettings {
            screen_resolution: Resolution::new(self.screen_width, self.screen_height),
            camera_id: self.camera_id,
            framing_size: self.framing_size(),
            torch: self.torch,
            auto_focus: self.auto_focus,
        }
    }
}
