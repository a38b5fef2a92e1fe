// SPDX-License-Identifier: GPL-3.0-only

//! Single owner of the camera device
//!
//! The frame source provides:
//! - Camera lifecycle (open, configure, stream, close)
//! - Single-shot frame delivery: a registered callback receives exactly one frame
//! - Lazily computed framing rects in screen and preview space
//! - Auto-focus scheduling while streaming
//!
//! Lock order: the auto-focus controller may call into the frame source, so
//! the frame source never calls the controller while holding its own lock.

use super::auto_focus::{AutoFocusController, FocusDriver};
use super::configuration::{apply_parameters, find_best_preview_size};
use super::geometry::{compute_framing_rect, framing_rect_in_preview, manual_framing_rect};
use super::open::{OpenCamera, open_camera};
use super::CameraProvider;
use super::types::*;
use crate::constants::{DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};
use crate::errors::CameraError;
use crate::frame_processor::{DecodeInput, RegionOfInterest};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

/// Settings the frame source starts from
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Size of the surface the viewfinder is drawn on
    pub screen_resolution: Resolution,
    /// Camera index to open instead of picking one
    pub camera_id: Option<usize>,
    /// Scan rect size to use instead of the computed one
    pub framing_size: Option<Resolution>,
    pub torch: bool,
    pub auto_focus: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            screen_resolution: Resolution::new(DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT),
            camera_id: None,
            framing_size: None,
            torch: false,
            auto_focus: true,
        }
    }
}

/// The one outstanding frame registration
struct PendingFrame {
    tag: FrameTag,
    callback: FrameCallback,
}

struct FrameSourceState {
    camera: Option<OpenCamera>,
    settings: CameraSettings,
    camera_resolution: Option<Resolution>,
    framing_rect: Option<Rect>,
    framing_rect_in_preview: Option<Rect>,
    initialized: bool,
    streaming: bool,
    /// Manual scan rect requested before the camera was initialized
    requested_framing: Option<Resolution>,
    auto_focus: Option<AutoFocusController>,
    pending: Option<PendingFrame>,
}

impl FrameSourceState {
    fn framing_rect(&mut self) -> Option<Rect> {
        if self.framing_rect.is_none() {
            if self.camera.is_none() || !self.initialized {
                return None;
            }
            let rect = compute_framing_rect(self.settings.screen_resolution);
            debug!(%rect, "Calculated framing rect");
            self.framing_rect = Some(rect);
        }
        self.framing_rect
    }

    fn framing_rect_in_preview(&mut self) -> Option<Rect> {
        if self.framing_rect_in_preview.is_none() {
            let rect = self.framing_rect()?;
            let camera = self.camera_resolution?;
            let rect = framing_rect_in_preview(rect, camera, self.settings.screen_resolution);
            debug!(%rect, "Calculated framing rect in preview");
            self.framing_rect_in_preview = Some(rect);
        }
        self.framing_rect_in_preview
    }

    fn apply_manual_framing(&mut self, size: Resolution) {
        let rect = manual_framing_rect(self.settings.screen_resolution, size.width, size.height);
        debug!(%rect, "Calculated manual framing rect");
        self.framing_rect = Some(rect);
        self.framing_rect_in_preview = None;
    }
}

/// Camera owner shared by the session controller and the decode worker
///
/// Cheap to clone; clones share the same device.
#[derive(Clone)]
pub struct FrameSource {
    provider: Arc<dyn CameraProvider>,
    state: Arc<Mutex<FrameSourceState>>,
}

impl FrameSource {
    pub fn new(provider: Arc<dyn CameraProvider>, settings: CameraSettings) -> Self {
        info!(screen = %settings.screen_resolution, "Creating frame source");

        let state = FrameSourceState {
            camera: None,
            requested_framing: settings.framing_size,
            settings,
            camera_resolution: None,
            framing_rect: None,
            framing_rect_in_preview: None,
            initialized: false,
            streaming: false,
            auto_focus: None,
            pending: None,
        };

        Self {
            provider,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrameSourceState> {
        lock_state(&self.state)
    }

    /// Open and configure the camera
    ///
    /// Opening an already open camera only re-applies parameters. Parameters
    /// the device rejects even in safe mode are logged and the camera is used
    /// with its own configuration.
    pub fn open_driver(&self) -> Result<(), CameraError> {
        let mut guard = self.lock();
        if guard.camera.is_none() {
            let camera = open_camera(self.provider.as_ref(), guard.settings.camera_id)?;
            info!(camera = %camera, "Camera opened");
            guard.camera = Some(camera);
        }

        let state = &mut *guard;
        let screen = state.settings.screen_resolution;
        let torch = state.settings.torch;
        let Some(camera) = state.camera.as_mut() else {
            return Err(CameraError::NoCameraFound);
        };

        let preview_size = find_best_preview_size(&camera.device.parameters(), screen);
        if let Err(e) = apply_parameters(camera.device.as_mut(), preview_size, torch) {
            warn!(error = %e, "Using camera without configuration");
        }
        let resolution = camera.device.parameters().preview_size;
        info!(camera_resolution = %resolution, "Camera configured");

        if state.camera_resolution != Some(resolution) {
            state.framing_rect_in_preview = None;
        }
        state.camera_resolution = Some(resolution);

        if !state.initialized {
            state.initialized = true;
            if let Some(size) = state.requested_framing.take() {
                state.apply_manual_framing(size);
            }
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.lock().camera.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }

    /// Stop streaming and release the camera
    ///
    /// Any scan rect set so far is forgotten.
    pub fn close_driver(&self) {
        self.stop_streaming();

        let camera = {
            let mut state = self.lock();
            state.framing_rect = None;
            state.framing_rect_in_preview = None;
            state.camera_resolution = None;
            state.initialized = false;
            state.pending = None;
            state.camera.take()
        };

        // The device may join its own threads on drop; do that unlocked
        if let Some(camera) = camera {
            info!(camera = %camera, "Closing camera");
            drop(camera);
        }
    }

    /// Start the preview and auto-focus; does nothing if already streaming
    pub fn start_streaming(&self) -> Result<(), CameraError> {
        let auto_focus = {
            let mut guard = self.lock();
            if guard.streaming {
                return Ok(());
            }
            let state = &mut *guard;
            let Some(camera) = state.camera.as_mut() else {
                warn!("Cannot start streaming: camera is not open");
                return Err(CameraError::Disconnected);
            };

            camera
                .device
                .start_preview()
                .map_err(|e| CameraError::InitializationFailed(e.to_string()))?;
            state.streaming = true;

            let focus_mode = camera.device.parameters().focus_mode;
            let use_auto_focus = state.settings.auto_focus && focus_mode.requires_trigger();
            let auto_focus = self.new_auto_focus(use_auto_focus);
            state.auto_focus = Some(auto_focus.clone());
            info!(?focus_mode, "Streaming started");
            auto_focus
        };

        auto_focus.start();
        Ok(())
    }

    /// Stop auto-focus and the preview; does nothing if not streaming
    ///
    /// A frame registration that has not been answered yet is dropped.
    pub fn stop_streaming(&self) {
        let auto_focus = self.lock().auto_focus.take();
        if let Some(auto_focus) = auto_focus {
            auto_focus.stop();
        }

        let mut state = self.lock();
        if !state.streaming {
            return;
        }
        if let Some(camera) = state.camera.as_mut() {
            camera.device.stop_preview();
        }
        state.streaming = false;
        if let Some(pending) = state.pending.take() {
            debug!(tag = pending.tag, "Dropping unanswered frame request");
        }
        info!("Streaming stopped");
    }

    /// Switch the torch, restarting auto-focus around the change
    pub fn set_torch(&self, on: bool) {
        let auto_focus = {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.settings.torch = on;
            let Some(camera) = state.camera.as_ref() else {
                return;
            };
            let params = camera.device.parameters();
            if params.torch == on || (on && !params.torch_supported) {
                return;
            }
            state.auto_focus.take()
        };

        let restart = auto_focus.map(|auto_focus| {
            auto_focus.stop();
            auto_focus.uses_auto_focus()
        });

        let new_auto_focus = {
            let mut state = self.lock();
            if let Some(camera) = state.camera.as_mut() {
                let mut params = camera.device.parameters();
                params.torch = on;
                match camera.device.set_parameters(&params) {
                    Ok(()) => info!(torch = on, "Torch switched"),
                    Err(e) => warn!(error = %e, "Could not switch torch"),
                }
            }
            match restart {
                Some(use_auto_focus) if state.streaming => {
                    let auto_focus = self.new_auto_focus(use_auto_focus);
                    state.auto_focus = Some(auto_focus.clone());
                    Some(auto_focus)
                }
                _ => None,
            }
        };

        if let Some(auto_focus) = new_auto_focus {
            auto_focus.start();
        }
    }

    /// Use this camera index the next time the driver is opened
    pub fn set_manual_camera_id(&self, camera_id: Option<usize>) {
        self.lock().settings.camera_id = camera_id;
    }

    /// Use a caller-sized scan rect
    ///
    /// Before the camera is initialized the size is remembered and applied
    /// on open.
    pub fn set_manual_framing_rect(&self, width: u32, height: u32) {
        let mut state = self.lock();
        if state.initialized {
            state.apply_manual_framing(Resolution::new(width, height));
        } else {
            state.requested_framing = Some(Resolution::new(width, height));
        }
    }

    /// Scan rect in screen coordinates, `None` until the camera is open
    pub fn framing_rect(&self) -> Option<Rect> {
        self.lock().framing_rect()
    }

    /// Scan rect in preview-frame coordinates, `None` until the camera is open
    pub fn framing_rect_in_preview(&self) -> Option<Rect> {
        self.lock().framing_rect_in_preview()
    }

    pub fn camera_resolution(&self) -> Option<Resolution> {
        self.lock().camera_resolution
    }

    pub fn screen_resolution(&self) -> Resolution {
        self.lock().settings.screen_resolution
    }

    /// Deliver the next preview frame to `callback`, exactly once
    ///
    /// Returns `false` without registering anything when the camera is not
    /// streaming. A new registration replaces one that has not been
    /// answered yet.
    pub fn request_one_frame(&self, tag: FrameTag, callback: FrameCallback) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(camera) = state.camera.as_mut() else {
            debug!(tag, "Frame requested, but camera is not open");
            return false;
        };
        if !state.streaming {
            debug!(tag, "Frame requested, but camera is not streaming");
            return false;
        }

        if let Some(previous) = state.pending.replace(PendingFrame { tag, callback }) {
            warn!(previous = previous.tag, tag, "Replacing unanswered frame request");
        }

        let weak = Arc::downgrade(&self.state);
        camera
            .device
            .request_one_frame(Box::new(move |frame| deliver_frame(&weak, frame)));
        debug!(tag, "Requested one preview frame");
        true
    }

    /// Crop a preview frame's luminance plane to the scan rect
    ///
    /// Returns `None` while the geometry is unknown or when the rect does not
    /// fit the frame.
    pub fn build_decode_input(
        &self,
        data: Arc<[u8]>,
        width: u32,
        height: u32,
    ) -> Option<DecodeInput> {
        let rect = self.lock().framing_rect_in_preview()?;
        let input = DecodeInput::new(data, width, height, rect);
        if input.is_none() {
            debug!(%rect, width, height, "Scan rect does not fit the frame");
        }
        input
    }

    fn new_auto_focus(&self, use_auto_focus: bool) -> AutoFocusController {
        let driver = Arc::new(DeviceFocus {
            state: Arc::downgrade(&self.state),
        });
        AutoFocusController::new(driver, use_auto_focus)
    }
}

impl RegionOfInterest for FrameSource {
    fn build_decode_input(&self, data: Arc<[u8]>, width: u32, height: u32) -> Option<DecodeInput> {
        FrameSource::build_decode_input(self, data, width, height)
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FrameSource")
            .field("camera", &state.camera)
            .field("streaming", &state.streaming)
            .field("camera_resolution", &state.camera_resolution)
            .finish()
    }
}

fn lock_state(state: &Mutex<FrameSourceState>) -> MutexGuard<'_, FrameSourceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hand a device frame to whoever is registered, then clear the registration
fn deliver_frame(state: &Weak<Mutex<FrameSourceState>>, frame: Frame) {
    let Some(state) = state.upgrade() else {
        return;
    };

    let pending = {
        let mut state = lock_state(&state);
        if !state.streaming {
            debug!("Dropping preview frame that arrived after streaming stopped");
            return;
        }
        state.pending.take()
    };

    match pending {
        Some(pending) => {
            debug!(
                tag = pending.tag,
                width = frame.width,
                height = frame.height,
                "Delivering preview frame"
            );
            (pending.callback)(frame);
        }
        None => debug!("Got preview frame, but no handler for it"),
    }
}

/// Focus driver backed by the frame source's device
struct DeviceFocus {
    state: Weak<Mutex<FrameSourceState>>,
}

impl FocusDriver for DeviceFocus {
    fn trigger(&self, callback: FocusCallback) -> BackendResult<()> {
        let state = self.state.upgrade().ok_or(BackendError::NotStreaming)?;
        let mut state = lock_state(&state);
        match state.camera.as_mut() {
            Some(camera) => camera.device.trigger_auto_focus(callback),
            None => Err(BackendError::NotStreaming),
        }
    }

    fn cancel(&self) -> BackendResult<()> {
        let state = self.state.upgrade().ok_or(BackendError::NotStreaming)?;
        let mut state = lock_state(&state);
        match state.camera.as_mut() {
            Some(camera) => camera.device.cancel_auto_focus(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::mock::{MockControls, MockProvider, blank_frame, mock_camera_info};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source(settings: CameraSettings) -> (FrameSource, MockControls) {
        let provider = MockProvider::new(vec![mock_camera_info(CameraFacing::Back)]);
        let controls = provider.controls();
        (FrameSource::new(Arc::new(provider), settings), controls)
    }

    fn streaming_source() -> (FrameSource, MockControls) {
        let (frames, controls) = source(CameraSettings::default());
        frames.open_driver().unwrap();
        frames.start_streaming().unwrap();
        (frames, controls)
    }

    fn counting_callback(counter: &Arc<AtomicUsize>) -> FrameCallback {
        let counter = counter.clone();
        Box::new(move |_frame| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_start_streaming_starts_preview_and_focus() {
        let (frames, controls) = streaming_source();
        assert!(frames.is_open());
        assert!(frames.is_streaming());
        assert!(controls.previewing());
        assert_eq!(controls.focus_triggers(), 1);

        // Idempotent
        frames.start_streaming().unwrap();
        assert_eq!(controls.focus_triggers(), 1);
    }

    #[test]
    fn test_start_streaming_requires_open_camera() {
        let (frames, _controls) = source(CameraSettings::default());
        assert_eq!(frames.start_streaming(), Err(CameraError::Disconnected));
    }

    #[test]
    fn test_start_preview_failure_is_reported() {
        let (frames, controls) = source(CameraSettings::default());
        controls.fail_start_preview();
        frames.open_driver().unwrap();
        assert!(matches!(
            frames.start_streaming(),
            Err(CameraError::InitializationFailed(_))
        ));
        assert!(!frames.is_streaming());
    }

    #[test]
    fn test_fixed_focus_camera_is_never_triggered() {
        let (frames, controls) = source(CameraSettings::default());
        controls.set_focus_mode(FocusMode::Fixed);
        frames.open_driver().unwrap();
        frames.start_streaming().unwrap();
        assert_eq!(controls.focus_triggers(), 0);
    }

    #[test]
    fn test_request_ignored_when_not_streaming() {
        let (frames, controls) = source(CameraSettings::default());
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(!frames.request_one_frame(1, counting_callback(&counter)));

        frames.open_driver().unwrap();
        assert!(!frames.request_one_frame(2, counting_callback(&counter)));
        assert_eq!(controls.frame_requests(), 0);
    }

    #[test]
    fn test_frame_delivered_exactly_once() {
        let (frames, controls) = streaming_source();
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(frames.request_one_frame(1, counting_callback(&counter)));
        assert!(controls.deliver_frame(blank_frame(1280, 720)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // No further registration, nothing to deliver to
        assert!(!controls.deliver_frame(blank_frame(1280, 720)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_registration_replaces_unanswered_one() {
        let (frames, controls) = streaming_source();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        frames.request_one_frame(1, counting_callback(&first));
        frames.request_one_frame(2, counting_callback(&second));
        assert_eq!(controls.pending_frame_requests(), 2);

        controls.deliver_frame(blank_frame(1280, 720));
        controls.deliver_frame(blank_frame(1280, 720));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_frame_after_stop_is_dropped() {
        let (frames, controls) = streaming_source();
        let counter = Arc::new(AtomicUsize::new(0));

        frames.request_one_frame(1, counting_callback(&counter));
        frames.stop_streaming();
        assert!(!controls.previewing());

        assert!(controls.deliver_frame(blank_frame(1280, 720)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_streaming_cancels_focus() {
        let (frames, controls) = streaming_source();
        frames.stop_streaming();
        assert_eq!(controls.cancel_calls(), 1);
        assert!(!controls.complete_focus(true));

        // Idempotent
        frames.stop_streaming();
        assert_eq!(controls.cancel_calls(), 1);
    }

    #[test]
    fn test_framing_rects_need_open_camera() {
        let (frames, _controls) = source(CameraSettings::default());
        assert_eq!(frames.framing_rect(), None);
        assert_eq!(frames.framing_rect_in_preview(), None);
        assert!(frames.build_decode_input(blank_frame(8, 8).data, 8, 8).is_none());
    }

    #[test]
    fn test_framing_rects_after_open() {
        let (frames, _controls) = source(CameraSettings::default());
        frames.open_driver().unwrap();

        // Best size for a 1080x1920 screen among 640x480 and 1280x720
        assert_eq!(frames.camera_resolution(), Some(Resolution::new(1280, 720)));
        assert_eq!(frames.framing_rect(), Some(Rect::new(202, 622, 877, 1297)));
        assert_eq!(
            frames.framing_rect_in_preview(),
            Some(Rect::new(239, 233, 1039, 486))
        );
    }

    #[test]
    fn test_decode_input_is_cropped_to_preview_rect() {
        let (frames, _controls) = source(CameraSettings::default());
        frames.open_driver().unwrap();

        let frame = blank_frame(1280, 720);
        let input = frames.build_decode_input(frame.data, 1280, 720).unwrap();
        assert_eq!(input.width(), 800);
        assert_eq!(input.height(), 253);

        // Frame smaller than the rect
        let frame = blank_frame(320, 240);
        assert!(frames.build_decode_input(frame.data, 320, 240).is_none());
    }

    #[test]
    fn test_manual_framing_before_open_is_applied_on_open() {
        let (frames, _controls) = source(CameraSettings::default());
        frames.set_manual_framing_rect(400, 300);
        assert_eq!(frames.framing_rect(), None);

        frames.open_driver().unwrap();
        assert_eq!(frames.framing_rect(), Some(Rect::new(340, 810, 740, 1110)));
    }

    #[test]
    fn test_manual_framing_after_open_invalidates_preview_rect() {
        let (frames, _controls) = source(CameraSettings::default());
        frames.open_driver().unwrap();
        let before = frames.framing_rect_in_preview().unwrap();

        frames.set_manual_framing_rect(1080, 1920);
        assert_eq!(frames.framing_rect(), Some(Rect::new(0, 0, 1080, 1920)));
        let after = frames.framing_rect_in_preview().unwrap();
        assert_ne!(before, after);
        assert_eq!(after, Rect::new(0, 0, 1280, 720));
    }

    #[test]
    fn test_close_driver_forgets_geometry() {
        let (frames, controls) = streaming_source();
        assert!(frames.framing_rect().is_some());

        frames.close_driver();
        assert!(!frames.is_open());
        assert!(!frames.is_streaming());
        assert_eq!(controls.closed(), 1);
        assert_eq!(frames.framing_rect(), None);
        assert_eq!(frames.camera_resolution(), None);
    }

    #[test]
    fn test_manual_camera_id() {
        let provider = MockProvider::new(vec![
            mock_camera_info(CameraFacing::Back),
            mock_camera_info(CameraFacing::Front),
        ]);
        let frames = FrameSource::new(Arc::new(provider), CameraSettings::default());
        frames.set_manual_camera_id(Some(5));
        assert_eq!(frames.open_driver(), Err(CameraError::CameraNotFound(5)));

        frames.set_manual_camera_id(Some(1));
        frames.open_driver().unwrap();
        assert!(frames.is_open());
    }

    #[test]
    fn test_torch_restarts_auto_focus() {
        let (frames, controls) = streaming_source();
        assert_eq!(controls.focus_triggers(), 1);

        frames.set_torch(true);
        assert!(controls.parameters().torch);
        assert_eq!(controls.cancel_calls(), 1);
        assert_eq!(controls.focus_triggers(), 2);

        // Same state again is a no-op
        frames.set_torch(true);
        assert_eq!(controls.focus_triggers(), 2);
    }

    #[test]
    fn test_torch_while_not_streaming_only_switches_light() {
        let (frames, controls) = source(CameraSettings::default());
        frames.open_driver().unwrap();
        frames.set_torch(true);
        assert!(controls.parameters().torch);
        assert_eq!(controls.focus_triggers(), 0);
    }
}
