// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning
//!
//! This module provides command-line functionality for:
//! - Scanning image files through the full camera pipeline
//! - Listing the camera an image set is exposed as
//! - Showing and resetting the configuration

use qrscan::backends::camera::CameraProvider;
use qrscan::backends::virtual_camera::FileCameraProvider;
use qrscan::errors::CameraError;
use qrscan::{Consumer, FrameSource, QrDecoder, ScanConfig, ScanDecision, ScanResult, ScanSession};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for the `scan` command
pub struct ScanOptions {
    pub files: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub torch: bool,
    pub no_autofocus: bool,
    pub bulk: bool,
    pub open: bool,
    pub timeout: u64,
}

/// Scan image files as if they were a camera preview
pub fn scan(options: ScanOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(options.config.as_deref())?;
    config.torch |= options.torch;
    config.auto_focus &= !options.no_autofocus;
    config.bulk_mode |= options.bulk;

    let provider = FileCameraProvider::new(options.files);
    let frame_size = provider.frame_size()?;
    println!("Scanning {} image(s) at {}", provider.paths().len(), frame_size);

    // The images are the whole screen; without a configured size the scan
    // rect covers all of it
    let mut settings = config.to_camera_settings();
    settings.screen_resolution = frame_size;
    settings.camera_id = None;
    settings.framing_size = settings.framing_size.or(Some(frame_size));

    let found = Arc::new(AtomicUsize::new(0));
    let consumer = PrintConsumer {
        bulk_delay: config.bulk_mode.then(|| config.bulk_scan_delay()),
        open_urls: options.open,
        seen: HashSet::new(),
        found: Arc::clone(&found),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let frames = FrameSource::new(Arc::new(provider), settings);
        let session =
            ScanSession::start(frames, Box::new(QrDecoder::new()), Box::new(consumer)).await?;
        info!(session = %session.id(), "Scanning");

        let handle = session.handle();
        ctrlc::set_handler(move || {
            handle.quit();
        })?;

        let handle = session.handle();
        let timeout = Duration::from_secs(options.timeout);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if handle.quit() {
                debug!(?timeout, "Scan timed out");
            }
        });

        session.wait().await;
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    match found.load(Ordering::SeqCst) {
        0 => println!("No QR code found."),
        count => println!("Found {} QR code(s).", count),
    }
    Ok(())
}

/// List the camera the given image files are exposed as
pub fn list_cameras(files: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let provider = FileCameraProvider::new(files);
    let cameras = provider.cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!(
            "      Facing: {}, orientation: {}",
            camera.facing, camera.orientation
        );
        if let Ok(size) = provider.frame_size() {
            println!("      Preview: {}", size);
        }
        println!();
    }

    Ok(())
}

/// Print the effective configuration, or reset it to defaults
pub fn show_config(path: Option<PathBuf>, reset: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = path
        .or_else(ScanConfig::default_path)
        .ok_or("No configuration directory")?;

    let config = if reset {
        let config = ScanConfig::default();
        config.save(&path)?;
        println!("Reset {}", path.display());
        config
    } else {
        ScanConfig::load(&path)?
    };

    println!("{}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::load_default()?,
    })
}

/// Prints each result; in bulk mode repeats are skipped and scanning goes on
struct PrintConsumer {
    bulk_delay: Option<Duration>,
    open_urls: bool,
    seen: HashSet<String>,
    found: Arc<AtomicUsize>,
}

impl Consumer for PrintConsumer {
    fn on_result(&mut self, result: ScanResult) -> ScanDecision {
        if self.seen.insert(result.payload.clone()) {
            self.found.fetch_add(1, Ordering::SeqCst);

            let action = result.action();
            println!(
                "[{}] {} {}: {}",
                result.decoded_at.format("%H:%M:%S"),
                result.format,
                action.label(),
                result.payload
            );
            if let Some(thumbnail) = &result.thumbnail {
                debug!(
                    width = thumbnail.width(),
                    height = thumbnail.height(),
                    "Result thumbnail"
                );
            }

            if self.open_urls
                && let Some(url) = action.url()
                && let Err(e) = open::that(url)
            {
                warn!(url, error = %e, "Failed to open URL");
            }
        }

        match self.bulk_delay {
            Some(delay) => ScanDecision::Continue(delay),
            None => ScanDecision::Stop,
        }
    }

    fn draw_viewfinder(&mut self) {
        debug!("Scanning for QR codes");
    }

    fn on_fatal(&mut self, error: &CameraError) {
        eprintln!("Camera failed: {}", error);
    }
}
