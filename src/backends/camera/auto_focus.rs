// SPDX-License-Identifier: GPL-3.0-only

//! Periodic auto-focus
//!
//! Devices in `Auto` or `Macro` focus mode only focus when asked to. While
//! active, the controller triggers a focus cycle and, whenever one finishes
//! (successfully or not), schedules the next one [`AUTO_FOCUS_INTERVAL`] later.
//!
//! All state lives behind one mutex. Device callbacks and the retry timer call
//! back into the controller through a weak reference and never hold that
//! mutex while waiting on anything else.

use super::types::{BackendResult, FocusCallback};
use crate::constants::AUTO_FOCUS_INTERVAL;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The two device operations focus scheduling needs
///
/// Implementations must report completion through the callback
/// asynchronously, never from inside `trigger`.
pub trait FocusDriver: Send + Sync {
    fn trigger(&self, callback: FocusCallback) -> BackendResult<()>;
    fn cancel(&self) -> BackendResult<()>;
}

/// One scheduled focus retry
///
/// Dropping the request detaches the timer; [`FocusRequest::cancel`] aborts it.
#[derive(Debug)]
pub struct FocusRequest {
    task: JoinHandle<()>,
}

impl FocusRequest {
    pub fn cancel(self) {
        self.task.abort();
    }
}

#[derive(Debug, Default)]
struct FocusState {
    stopped: bool,
    focusing: bool,
    outstanding: Option<FocusRequest>,
}

struct Inner {
    state: Mutex<FocusState>,
    driver: Arc<dyn FocusDriver>,
    use_auto_focus: bool,
    interval: Duration,
    runtime: Option<Handle>,
}

/// Auto-focus scheduler for one streaming session
///
/// Cheap to clone; clones share the same schedule. A stopped controller
/// stays stopped; streaming again creates a new one.
#[derive(Clone)]
pub struct AutoFocusController {
    inner: Arc<Inner>,
}

impl AutoFocusController {
    /// Create a controller that retries every [`AUTO_FOCUS_INTERVAL`]
    ///
    /// Retries are scheduled on the tokio runtime current at construction.
    pub fn new(driver: Arc<dyn FocusDriver>, use_auto_focus: bool) -> Self {
        Self::with_interval(driver, use_auto_focus, AUTO_FOCUS_INTERVAL)
    }

    pub fn with_interval(
        driver: Arc<dyn FocusDriver>,
        use_auto_focus: bool,
        interval: Duration,
    ) -> Self {
        let runtime = Handle::try_current().ok();
        if runtime.is_none() && use_auto_focus {
            warn!("No async runtime available; auto focus will not be retried");
        }
        info!(use_auto_focus, "Creating auto focus controller");

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(FocusState::default()),
                driver,
                use_auto_focus,
                interval,
                runtime,
            }),
        }
    }

    /// Trigger a focus cycle unless stopped or already focusing
    pub fn start(&self) {
        if !self.inner.use_auto_focus {
            return;
        }
        let mut state = self.inner.lock();
        if let Some(request) = state.outstanding.take() {
            request.cancel();
        }
        Inner::start_locked(&self.inner, &mut state);
    }

    /// Stop focusing for good
    ///
    /// Cancels the scheduled retry and asks the device to abandon a cycle in
    /// progress. Completions that arrive afterwards are ignored.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        state.stopped = true;

        if self.inner.use_auto_focus {
            if let Some(request) = state.outstanding.take() {
                request.cancel();
            }
            // Doesn't hurt to call this even if not focusing
            if let Err(e) = self.inner.driver.cancel() {
                warn!(error = %e, "Unexpected exception while cancelling focusing");
            }
        }
        debug!("Auto focus stopped");
    }

    pub fn uses_auto_focus(&self) -> bool {
        self.inner.use_auto_focus
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    pub fn is_focusing(&self) -> bool {
        self.inner.lock().focusing
    }

    pub fn has_outstanding_retry(&self) -> bool {
        self.inner.lock().outstanding.is_some()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, FocusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_locked(inner: &Arc<Inner>, state: &mut FocusState) {
        if state.stopped || state.focusing {
            return;
        }

        let weak = Arc::downgrade(inner);
        let callback: FocusCallback = Box::new(move |success| {
            if let Some(inner) = weak.upgrade() {
                Inner::on_focus_complete(&inner, success);
            }
        });

        match inner.driver.trigger(callback) {
            Ok(()) => state.focusing = true,
            Err(e) => {
                warn!(error = %e, "Unexpected exception while focusing");
                Inner::schedule_retry(inner, state);
            }
        }
    }

    fn on_focus_complete(inner: &Arc<Inner>, success: bool) {
        let mut state = inner.lock();
        debug!(success, "Focus cycle finished");
        state.focusing = false;
        Inner::schedule_retry(inner, &mut state);
    }

    fn schedule_retry(inner: &Arc<Inner>, state: &mut FocusState) {
        if state.stopped || state.outstanding.is_some() {
            return;
        }
        let Some(runtime) = inner.runtime.as_ref() else {
            warn!("Could not request auto focus: no runtime to schedule on");
            return;
        };

        let weak = Arc::downgrade(inner);
        let interval = inner.interval;
        let task = runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(inner) = weak.upgrade() {
                Inner::fire_retry(&inner);
            }
        });
        state.outstanding = Some(FocusRequest { task });
    }

    fn fire_retry(inner: &Arc<Inner>) {
        let mut state = inner.lock();
        // This task is the outstanding request; let it finish on its own
        state.outstanding = None;
        Inner::start_locked(inner, &mut state);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(request) = state.outstanding.take() {
            request.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::BackendError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingDriver {
        triggers: AtomicUsize,
        cancels: AtomicUsize,
        reject: AtomicBool,
        fail_cancel: AtomicBool,
        callbacks: Mutex<Vec<FocusCallback>>,
    }

    impl RecordingDriver {
        fn complete(&self, success: bool) -> bool {
            let callback = self.callbacks.lock().unwrap().pop();
            match callback {
                Some(callback) => {
                    callback(success);
                    true
                }
                None => false,
            }
        }

        fn triggers(&self) -> usize {
            self.triggers.load(Ordering::SeqCst)
        }
    }

    impl FocusDriver for RecordingDriver {
        fn trigger(&self, callback: FocusCallback) -> BackendResult<()> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(BackendError::Other("rejected".into()));
            }
            self.triggers.fetch_add(1, Ordering::SeqCst);
            self.callbacks.lock().unwrap().push(callback);
            Ok(())
        }

        fn cancel(&self) -> BackendResult<()> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            if self.fail_cancel.load(Ordering::SeqCst) {
                return Err(BackendError::Other("cancel failed".into()));
            }
            Ok(())
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_interval() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        assert_eq!(driver.triggers(), 1);
        assert!(controller.is_focusing());

        // A second start while focusing is ignored
        controller.start();
        assert_eq!(driver.triggers(), 1);

        assert!(driver.complete(true));
        assert!(!controller.is_focusing());
        assert!(controller.has_outstanding_retry());

        advance(1999).await;
        assert_eq!(driver.triggers(), 1);

        advance(2).await;
        assert_eq!(driver.triggers(), 2);
        assert!(!controller.has_outstanding_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_focus_is_retried_the_same_way() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        assert!(driver.complete(false));
        advance(2001).await;
        assert_eq!(driver.triggers(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_trigger_schedules_retry() {
        let driver = Arc::new(RecordingDriver::default());
        driver.reject.store(true, Ordering::SeqCst);
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        assert_eq!(driver.triggers(), 0);
        assert!(!controller.is_focusing());
        assert!(controller.has_outstanding_retry());

        driver.reject.store(false, Ordering::SeqCst);
        advance(2001).await;
        assert_eq!(driver.triggers(), 1);
        assert!(controller.is_focusing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_outstanding_retry() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        let callback = driver.callbacks.lock().unwrap().pop().unwrap();
        // Simulate a driver that reports completion twice
        callback(true);
        Inner::on_focus_complete(&controller.inner, true);
        assert!(controller.has_outstanding_retry());

        advance(2001).await;
        assert_eq!(driver.triggers(), 2);

        advance(10_000).await;
        assert_eq!(driver.triggers(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_triggers() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        controller.stop();
        assert!(controller.is_stopped());
        assert_eq!(driver.cancels.load(Ordering::SeqCst), 1);

        // Completion racing in after stop
        assert!(driver.complete(true));
        Inner::on_focus_complete(&controller.inner, false);
        assert!(!controller.has_outstanding_retry());

        controller.start();
        advance(10_000).await;
        assert_eq!(driver.triggers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_scheduled_retry() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        driver.complete(true);
        assert!(controller.has_outstanding_retry());

        controller.stop();
        assert!(!controller.has_outstanding_retry());
        advance(5000).await;
        assert_eq!(driver.triggers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_error_is_not_propagated() {
        let driver = Arc::new(RecordingDriver::default());
        driver.fail_cancel.store(true, Ordering::SeqCst);
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        controller.stop();
        assert!(controller.is_stopped());
    }

    #[tokio::test]
    async fn test_disabled_controller_never_triggers() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = AutoFocusController::new(driver.clone(), false);

        controller.start();
        controller.stop();
        assert_eq!(driver.triggers(), 0);
        assert_eq!(driver.cancels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_without_runtime_does_not_schedule() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = AutoFocusController::new(driver.clone(), true);

        controller.start();
        driver.complete(true);
        assert!(!controller.has_outstanding_retry());
        assert_eq!(driver.triggers(), 1);
    }
}
