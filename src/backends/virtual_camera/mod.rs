// SPDX-License-Identifier: GPL-3.0-only

//! File-backed camera
//!
//! Serves still images as a camera preview so the scanning pipeline can run
//! without hardware. The images are cycled in order, one per frame request.
//!
//! # Architecture
//!
//! ```text
//! request_one_frame / trigger_auto_focus
//!        │ (queued, never answered inline)
//!        ▼
//! ┌──────────────────┐
//! │  Delivery loop   │  ← named thread, ~30 fps pacing
//! └──────────────────┘
//!        │
//!        ▼
//!   frame / focus callbacks
//! ```

mod file_source;

pub use file_source::{image_size, load_frames, load_image_as_frame};

use crate::backends::camera::frame_loop::{DeliveryLoop, LoopAction};
use crate::backends::camera::types::*;
use crate::backends::camera::{CameraDevice, CameraProvider};
use crate::constants::file_camera::{FOCUS_DURATION, FRAME_INTERVAL};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

/// Provider exposing a list of image files as one back-facing camera
#[derive(Debug, Clone)]
pub struct FileCameraProvider {
    paths: Vec<PathBuf>,
}

impl FileCameraProvider {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Preview size of the camera: the size of the first image
    pub fn frame_size(&self) -> BackendResult<Resolution> {
        let first = self
            .paths
            .first()
            .ok_or_else(|| BackendError::DeviceNotFound("No image files given".into()))?;
        image_size(first)
    }
}

impl CameraProvider for FileCameraProvider {
    fn cameras(&self) -> Vec<CameraInfo> {
        let Some(first) = self.paths.first() else {
            return Vec::new();
        };
        let name = first
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| first.display().to_string());

        vec![CameraInfo {
            name: format!("file:{}", name),
            facing: CameraFacing::Back,
            orientation: 0,
        }]
    }

    fn open(&self, index: usize) -> BackendResult<Box<dyn CameraDevice>> {
        if index != 0 || self.paths.is_empty() {
            return Err(BackendError::DeviceNotFound(format!("file camera {}", index)));
        }
        Ok(Box::new(FileCamera::open(&self.paths)?))
    }
}

struct FileCameraState {
    frames: Vec<Frame>,
    next_frame: usize,
    parameters: CameraParameters,
    previewing: bool,
    frame_requests: VecDeque<FrameCallback>,
    focus_requests: VecDeque<(Instant, FocusCallback)>,
    delivered: u64,
}

impl FileCameraState {
    /// Take whatever is due now; callbacks run after the lock is released
    fn take_due(&mut self, now: Instant) -> (Option<(FrameCallback, Frame)>, Vec<FocusCallback>) {
        let frame = if self.previewing {
            self.frame_requests.pop_front().map(|callback| {
                let source = &self.frames[self.next_frame % self.frames.len()];
                self.next_frame = (self.next_frame + 1) % self.frames.len();
                self.delivered += 1;
                let frame = Frame::new(Arc::clone(&source.data), source.width, source.height);
                (callback, frame)
            })
        } else {
            None
        };

        let mut focus = Vec::new();
        while self
            .focus_requests
            .front()
            .is_some_and(|(due, _)| *due <= now)
        {
            if let Some((_, callback)) = self.focus_requests.pop_front() {
                focus.push(callback);
            }
        }
        (frame, focus)
    }
}

/// A [`CameraDevice`] that serves still images
///
/// Frames are answered from a delivery thread at most once per
/// [`FRAME_INTERVAL`]; focus cycles always succeed after [`FOCUS_DURATION`].
/// Dropping the camera stops the thread.
pub struct FileCamera {
    state: Arc<Mutex<FileCameraState>>,
    _delivery: DeliveryLoop,
}

impl FileCamera {
    pub fn open(paths: &[PathBuf]) -> BackendResult<Self> {
        let frames = load_frames(paths)?;
        let size = Resolution::new(frames[0].width, frames[0].height);
        info!(frames = frames.len(), size = %size, "Opening file camera");

        let state = Arc::new(Mutex::new(FileCameraState {
            frames,
            next_frame: 0,
            parameters: CameraParameters {
                preview_size: size,
                supported_preview_sizes: vec![size],
                focus_mode: FocusMode::Auto,
                supported_focus_modes: vec![FocusMode::Auto, FocusMode::Fixed],
                torch: false,
                torch_supported: false,
            },
            previewing: false,
            frame_requests: VecDeque::new(),
            focus_requests: VecDeque::new(),
            delivered: 0,
        }));

        let loop_state = Arc::clone(&state);
        let delivery = DeliveryLoop::start("qrscan-file-camera", move || {
            std::thread::sleep(FRAME_INTERVAL);
            let (frame, focus) = lock(&loop_state).take_due(Instant::now());

            if let Some((callback, frame)) = frame {
                callback(frame);
            }
            for callback in focus {
                callback(true);
            }
            LoopAction::Continue
        })?;

        Ok(Self {
            state,
            _delivery: delivery,
        })
    }

    /// Number of frames delivered so far
    pub fn delivered(&self) -> u64 {
        lock(&self.state).delivered
    }
}

fn lock(state: &Mutex<FileCameraState>) -> MutexGuard<'_, FileCameraState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CameraDevice for FileCamera {
    fn parameters(&self) -> CameraParameters {
        lock(&self.state).parameters.clone()
    }

    fn set_parameters(&mut self, params: &CameraParameters) -> BackendResult<()> {
        let mut state = lock(&self.state);
        if !state
            .parameters
            .supported_preview_sizes
            .contains(&params.preview_size)
        {
            return Err(BackendError::ParametersRejected(format!(
                "preview size {} not supported",
                params.preview_size
            )));
        }
        if params.torch && !state.parameters.torch_supported {
            return Err(BackendError::ParametersRejected("no torch".into()));
        }
        state.parameters = params.clone();
        Ok(())
    }

    fn start_preview(&mut self) -> BackendResult<()> {
        lock(&self.state).previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) {
        let mut state = lock(&self.state);
        state.previewing = false;
        state.frame_requests.clear();
    }

    fn request_one_frame(&mut self, callback: FrameCallback) {
        let mut state = lock(&self.state);
        if !state.previewing {
            debug!("Frame requested while not previewing; ignoring");
            return;
        }
        state.frame_requests.push_back(callback);
    }

    fn trigger_auto_focus(&mut self, callback: FocusCallback) -> BackendResult<()> {
        let mut state = lock(&self.state);
        if !state.previewing {
            return Err(BackendError::NotStreaming);
        }
        state
            .focus_requests
            .push_back((Instant::now() + FOCUS_DURATION, callback));
        Ok(())
    }

    fn cancel_auto_focus(&mut self) -> BackendResult<()> {
        lock(&self.state).focus_requests.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::mpsc;
    use std::time::Duration;

    fn image_files(name: &str, values: &[u8]) -> (PathBuf, Vec<PathBuf>) {
        let dir = std::env::temp_dir().join(format!("qrscan-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let paths = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let path = dir.join(format!("{}.png", i));
                GrayImage::from_pixel(4, 4, Luma([*value]))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect();
        (dir, paths)
    }

    #[test]
    fn test_provider_reports_one_back_camera() {
        let (dir, paths) = image_files("provider", &[1]);
        let provider = FileCameraProvider::new(paths);
        let cameras = provider.cameras();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].facing, CameraFacing::Back);
        assert_eq!(cameras[0].name, "file:0.png");
        assert_eq!(provider.frame_size().unwrap(), Resolution::new(4, 4));
        assert!(provider.open(1).is_err());

        assert!(FileCameraProvider::new(Vec::new()).cameras().is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_frames_cycle_through_images() {
        let (dir, paths) = image_files("cycle", &[10, 20]);
        let mut camera = FileCamera::open(&paths).unwrap();
        camera.start_preview().unwrap();

        let (tx, rx) = mpsc::channel();
        for _ in 0..3 {
            let tx = tx.clone();
            camera.request_one_frame(Box::new(move |frame: Frame| {
                tx.send(frame.data[0]).unwrap();
            }));
        }

        let values: Vec<u8> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(values, vec![10, 20, 10]);
        assert_eq!(camera.delivered(), 3);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_requests_are_dropped_when_not_previewing() {
        let (dir, paths) = image_files("stopped", &[10]);
        let mut camera = FileCamera::open(&paths).unwrap();

        let (tx, rx) = mpsc::channel::<u8>();
        camera.request_one_frame(Box::new(move |frame: Frame| {
            tx.send(frame.data[0]).unwrap();
        }));
        // Callback dropped: the channel disconnects without a value
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_err());
        assert!(camera.trigger_auto_focus(Box::new(|_| {})).is_err());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_focus_completes_asynchronously() {
        let (dir, paths) = image_files("focus", &[10]);
        let mut camera = FileCamera::open(&paths).unwrap();
        camera.start_preview().unwrap();

        let (tx, rx) = mpsc::channel();
        camera
            .trigger_auto_focus(Box::new(move |success| tx.send(success).unwrap()))
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_rejects_unsupported_parameters() {
        let (dir, paths) = image_files("params", &[10]);
        let mut camera = FileCamera::open(&paths).unwrap();

        let mut params = camera.parameters();
        params.preview_size = Resolution::new(640, 480);
        assert!(camera.set_parameters(&params).is_err());

        let mut params = camera.parameters();
        params.torch = true;
        assert!(camera.set_parameters(&params).is_err());

        let mut params = camera.parameters();
        params.focus_mode = FocusMode::Fixed;
        camera.set_parameters(&params).unwrap();
        assert_eq!(camera.parameters().focus_mode, FocusMode::Fixed);
        std::fs::remove_dir_all(dir).ok();
    }
}
