// SPDX-License-Identifier: GPL-3.0-only

//! Scripted camera for unit tests
//!
//! Requests are recorded instead of answered; tests decide when a frame or a
//! focus completion arrives by calling into [`MockControls`].

use super::types::*;
use super::{CameraDevice, CameraProvider};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MockState {
    parameters: Option<CameraParameters>,
    previewing: bool,
    fail_start_preview: bool,
    reject_parameters: usize,
    frame_requests: usize,
    pending_frames: VecDeque<FrameCallback>,
    focus_triggers: usize,
    pending_focus: VecDeque<FocusCallback>,
    cancel_calls: usize,
    fail_cancel: bool,
    fail_open: bool,
    opened: usize,
    closed: usize,
}

/// Handle tests keep to observe and drive mock devices
#[derive(Clone, Default)]
pub(crate) struct MockControls {
    state: Arc<Mutex<MockState>>,
}

impl MockControls {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn reject_next_parameters(&self, count: usize) {
        self.lock().reject_parameters = count;
    }

    pub(crate) fn fail_start_preview(&self) {
        self.lock().fail_start_preview = true;
    }

    pub(crate) fn fail_cancel(&self) {
        self.lock().fail_cancel = true;
    }

    pub(crate) fn set_focus_mode(&self, mode: FocusMode) {
        let mut state = self.lock();
        let params = state.parameters.get_or_insert_with(mock_parameters);
        params.focus_mode = mode;
        params.supported_focus_modes = vec![mode];
    }

    pub(crate) fn previewing(&self) -> bool {
        self.lock().previewing
    }

    pub(crate) fn frame_requests(&self) -> usize {
        self.lock().frame_requests
    }

    pub(crate) fn pending_frame_requests(&self) -> usize {
        self.lock().pending_frames.len()
    }

    pub(crate) fn focus_triggers(&self) -> usize {
        self.lock().focus_triggers
    }

    pub(crate) fn cancel_calls(&self) -> usize {
        self.lock().cancel_calls
    }

    pub(crate) fn opened(&self) -> usize {
        self.lock().opened
    }

    pub(crate) fn closed(&self) -> usize {
        self.lock().closed
    }

    pub(crate) fn parameters(&self) -> CameraParameters {
        self.lock().parameters.clone().unwrap_or_else(mock_parameters)
    }

    /// Answer the oldest outstanding frame request
    pub(crate) fn deliver_frame(&self, frame: Frame) -> bool {
        let callback = self.lock().pending_frames.pop_front();
        match callback {
            Some(callback) => {
                callback(frame);
                true
            }
            None => false,
        }
    }

    /// Complete the oldest focus cycle
    pub(crate) fn complete_focus(&self, success: bool) -> bool {
        let callback = self.lock().pending_focus.pop_front();
        match callback {
            Some(callback) => {
                callback(success);
                true
            }
            None => false,
        }
    }
}

pub(crate) struct MockDevice {
    controls: MockControls,
}

impl MockDevice {
    pub(crate) fn new() -> (Self, MockControls) {
        let controls = MockControls::default();
        (
            Self {
                controls: controls.clone(),
            },
            controls,
        )
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.controls.lock().closed += 1;
    }
}

impl CameraDevice for MockDevice {
    fn parameters(&self) -> CameraParameters {
        self.controls.parameters()
    }

    fn set_parameters(&mut self, params: &CameraParameters) -> BackendResult<()> {
        let mut state = self.controls.lock();
        if state.reject_parameters > 0 {
            state.reject_parameters -= 1;
            return Err(BackendError::ParametersRejected("scripted".into()));
        }
        state.parameters = Some(params.clone());
        Ok(())
    }

    fn start_preview(&mut self) -> BackendResult<()> {
        let mut state = self.controls.lock();
        if state.fail_start_preview {
            return Err(BackendError::Other("preview failed".into()));
        }
        state.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.controls.lock().previewing = false;
    }

    fn request_one_frame(&mut self, callback: FrameCallback) {
        let mut state = self.controls.lock();
        state.frame_requests += 1;
        if state.previewing {
            state.pending_frames.push_back(callback);
        }
    }

    fn trigger_auto_focus(&mut self, callback: FocusCallback) -> BackendResult<()> {
        let mut state = self.controls.lock();
        state.focus_triggers += 1;
        state.pending_focus.push_back(callback);
        Ok(())
    }

    fn cancel_auto_focus(&mut self) -> BackendResult<()> {
        let mut state = self.controls.lock();
        state.cancel_calls += 1;
        state.pending_focus.clear();
        if state.fail_cancel {
            return Err(BackendError::Other("cancelAutoFocus failed".into()));
        }
        Ok(())
    }
}

/// Provider handing out mock devices that all share one set of controls
pub(crate) struct MockProvider {
    cameras: Vec<CameraInfo>,
    controls: MockControls,
}

impl MockProvider {
    pub(crate) fn new(cameras: Vec<CameraInfo>) -> Self {
        Self {
            cameras,
            controls: MockControls::default(),
        }
    }

    pub(crate) fn controls(&self) -> MockControls {
        self.controls.clone()
    }

    pub(crate) fn fail_open(&self) {
        self.controls.lock().fail_open = true;
    }
}

impl CameraProvider for MockProvider {
    fn cameras(&self) -> Vec<CameraInfo> {
        self.cameras.clone()
    }

    fn open(&self, index: usize) -> BackendResult<Box<dyn CameraDevice>> {
        let mut state = self.controls.lock();
        if state.fail_open {
            return Err(BackendError::InitializationFailed(format!(
                "camera {} busy",
                index
            )));
        }
        state.opened += 1;
        Ok(Box::new(MockDevice {
            controls: self.controls.clone(),
        }))
    }
}

pub(crate) fn mock_camera_info(facing: CameraFacing) -> CameraInfo {
    CameraInfo {
        name: "mock".into(),
        facing,
        orientation: 90,
    }
}

pub(crate) fn mock_parameters() -> CameraParameters {
    CameraParameters {
        preview_size: Resolution::new(640, 480),
        supported_preview_sizes: vec![Resolution::new(640, 480), Resolution::new(1280, 720)],
        focus_mode: FocusMode::Auto,
        supported_focus_modes: vec![FocusMode::Auto, FocusMode::Macro, FocusMode::Fixed],
        torch: false,
        torch_supported: true,
    }
}

/// A blank luminance frame of the given size
pub(crate) fn blank_frame(width: u32, height: u32) -> Frame {
    Frame::new(vec![128u8; (width * height) as usize], width, height)
}
