// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle for device delivery loops
//!
//! Software devices answer frame and focus requests from their own thread so
//! callbacks never run inside the call that registered them. This module
//! gives those threads a uniform start/stop/join lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a delivery loop running in a named thread
///
/// # Example
///
/// ```ignore
/// let mut delivery = DeliveryLoop::start("file-camera", move || {
///     answer_due_requests();
///     LoopAction::Continue
/// })?;
///
/// // Later, stop the loop
/// delivery.stop();
/// ```
pub struct DeliveryLoop {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl DeliveryLoop {
    /// Start a new delivery loop in a separate thread
    ///
    /// The closure is called repeatedly until it returns `LoopAction::Stop`
    /// or the loop is stopped. It should pace itself (sleep or wait) between
    /// iterations.
    pub fn start<F>(name: &str, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting delivery loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Delivery loop thread started");

                while !thread_stop.load(Ordering::SeqCst) {
                    if loop_fn() == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }

                info!(name = %thread_name, "Delivery loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting delivery loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    ///
    /// When called from the loop thread itself (a callback dropped the last
    /// owner of the device) the thread is only signalled.
    pub fn stop(&mut self) {
        self.request_stop();

        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            debug!(name = %self.name, "Stopped from inside the loop; not joining");
            return;
        }

        debug!(name = %self.name, "Waiting for delivery loop thread to finish");
        if let Err(e) = handle.join() {
            warn!(name = %self.name, "Delivery loop thread panicked: {:?}", e);
        } else {
            debug!(name = %self.name, "Delivery loop thread finished");
        }
    }
}

impl Drop for DeliveryLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "DeliveryLoop dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn wait_until_finished(delivery: &DeliveryLoop) {
        for _ in 0..500 {
            if !delivery.is_running() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("delivery loop did not finish");
    }

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut delivery = DeliveryLoop::start("test-loop", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            if count >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        })
        .unwrap();

        wait_until_finished(&delivery);
        assert_eq!(counter.load(Ordering::SeqCst), 11); // 0-10 inclusive
        delivery.stop();
    }

    #[test]
    fn test_stop_signal() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut delivery = DeliveryLoop::start("test-loop", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            LoopAction::Continue
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));

        delivery.stop();
        let stopped_at = counter.load(Ordering::SeqCst);
        assert!(stopped_at > 0);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn test_thread_is_named() {
        let name = Arc::new(std::sync::Mutex::new(None));
        let name_clone = Arc::clone(&name);

        let mut delivery = DeliveryLoop::start("named-loop", move || {
            *name_clone.lock().unwrap() = thread::current().name().map(str::to_string);
            LoopAction::Stop
        })
        .unwrap();

        wait_until_finished(&delivery);
        delivery.stop();
        assert_eq!(name.lock().unwrap().as_deref(), Some("named-loop"));
    }

    #[test]
    fn test_drop_stops_loop() {
        let delivery = DeliveryLoop::start("test-running", || {
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        })
        .unwrap();

        assert!(delivery.is_running());
        drop(delivery);
    }
}
