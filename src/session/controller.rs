// SPDX-License-Identifier: GPL-3.0-only

//! Scan session controller
//!
//! The controller is the only writer of [`SessionState`]. It runs as one
//! tokio task fed by an unbounded channel; the decode worker, delayed
//! restarts and [`SessionHandle`]s all talk to it through that channel.
//!
//! ```text
//!            restart-and-decode
//!   Success ───────────────────▶ Preview ◀─┐
//!      ▲                            │      │ decode failed:
//!      │        decode succeeded    │      │ request another frame
//!      └────────────────────────────┴──────┘
//!
//!   quit (from any state) ──▶ Done (absorbing)
//! ```

use super::consumer::{Consumer, ScanDecision, ScanResult};
use super::message::SessionMessage;
use crate::backends::camera::FrameSource;
use crate::backends::camera::types::FrameTag;
use crate::constants::WORKER_JOIN_TIMEOUT;
use crate::errors::AppResult;
use crate::frame_processor::{DecodeWorker, DecodedSymbol, Decoder};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where the session is in its scan cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A frame request is outstanding or being decoded
    Preview,
    /// A result has been handed to the consumer
    Success,
    /// Torn down; nothing else happens
    Done,
}

/// Owns the decode worker and the consumer for one session
pub struct SessionController {
    id: Uuid,
    state: SessionState,
    frames: FrameSource,
    worker: DecodeWorker,
    consumer: Box<dyn Consumer>,
    sender: UnboundedSender<SessionMessage>,
    next_tag: FrameTag,
    restart: Option<JoinHandle<()>>,
}

impl SessionController {
    fn new(
        id: Uuid,
        frames: FrameSource,
        worker: DecodeWorker,
        consumer: Box<dyn Consumer>,
        sender: UnboundedSender<SessionMessage>,
    ) -> Self {
        Self {
            id,
            // Seeds the first restart-and-decode
            state: SessionState::Success,
            frames,
            worker,
            consumer,
            sender,
            next_tag: 0,
            restart: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Process messages until the session is done
    async fn run(mut self, mut receiver: UnboundedReceiver<SessionMessage>) {
        info!(session = %self.id, "Scan session started");
        self.restart_preview_and_decode();

        while let Some(message) = receiver.recv().await {
            if self.handle_message(message, &mut receiver).await.is_break() {
                break;
            }
        }

        self.quit_synchronously(&mut receiver).await;
        info!(session = %self.id, "Scan session finished");
    }

    async fn handle_message(
        &mut self,
        message: SessionMessage,
        receiver: &mut UnboundedReceiver<SessionMessage>,
    ) -> ControlFlow<()> {
        if self.state == SessionState::Done {
            debug!(?message, "Session done; dropping message");
            return ControlFlow::Break(());
        }

        match message {
            SessionMessage::Decoded(symbol) => {
                if self.on_decoded(symbol) == ScanDecision::Stop {
                    self.quit_synchronously(receiver).await;
                    return ControlFlow::Break(());
                }
            }
            SessionMessage::Failed => {
                // We're generating frames as fast as possible, so keep going
                self.state = SessionState::Preview;
                self.request_frame();
            }
            SessionMessage::RestartPreview => {
                debug!("Got restart preview message");
                self.restart_preview_and_decode();
            }
            SessionMessage::ScheduleRestart(delay) => self.schedule_restart(delay),
            SessionMessage::Quit => {
                self.quit_synchronously(receiver).await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn on_decoded(&mut self, symbol: DecodedSymbol) -> ScanDecision {
        debug!(format = %symbol.symbol_format, "Got decode succeeded message");
        self.state = SessionState::Success;

        let result = ScanResult::from_decoded(symbol);
        let decision = self.consumer.on_result(result);
        debug!(?decision, "Consumer handled result");

        if let ScanDecision::Continue(delay) = decision {
            self.schedule_restart(delay);
        }
        decision
    }

    /// Request a frame and redraw the guide, but only after a result
    fn restart_preview_and_decode(&mut self) {
        if self.state != SessionState::Success {
            return;
        }
        self.state = SessionState::Preview;
        self.request_frame();
        self.consumer.draw_viewfinder();
    }

    fn request_frame(&mut self) {
        let tag = self.next_tag;
        self.next_tag += 1;

        let callback = self.worker.frame_target(tag);
        if !self.frames.request_one_frame(tag, callback) {
            warn!(tag, "Frame source is not streaming; scanning stalls");
        }
    }

    fn schedule_restart(&mut self, delay: Duration) {
        if let Some(previous) = self.restart.take() {
            previous.abort();
        }
        let sender = self.sender.clone();
        self.restart = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session already ended
            let _ = sender.send(SessionMessage::RestartPreview);
        }));
    }

    /// Stop everything and wait (bounded) for the worker
    async fn quit_synchronously(&mut self, receiver: &mut UnboundedReceiver<SessionMessage>) {
        if self.state == SessionState::Done {
            return;
        }
        self.state = SessionState::Done;

        if let Some(restart) = self.restart.take() {
            restart.abort();
        }
        self.frames.stop_streaming();

        if !self.worker.shutdown(WORKER_JOIN_TIMEOUT).await {
            warn!(session = %self.id, "Continuing teardown without the decode worker");
        }

        // Be absolutely sure we don't send any queued up results
        let mut purged = 0usize;
        while receiver.try_recv().is_ok() {
            purged += 1;
        }
        if purged > 0 {
            debug!(purged, "Discarded queued session messages");
        }
    }
}

/// Cloneable handle for talking to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    sender: UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Resume scanning after `delay`; returns `false` if the session has ended
    pub fn restart_preview_after(&self, delay: Duration) -> bool {
        self.sender
            .send(SessionMessage::ScheduleRestart(delay))
            .is_ok()
    }

    /// Ask the session to tear down; returns `false` if it already has
    pub fn quit(&self) -> bool {
        self.sender.send(SessionMessage::Quit).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// A running scan session
pub struct ScanSession {
    frames: FrameSource,
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl ScanSession {
    /// Open the camera, start streaming and begin scanning
    ///
    /// Camera failures are reported to `consumer` through
    /// [`Consumer::on_fatal`] and returned.
    pub async fn start(
        frames: FrameSource,
        decoder: Box<dyn Decoder>,
        mut consumer: Box<dyn Consumer>,
    ) -> AppResult<Self> {
        let id = Uuid::new_v4();

        if let Err(e) = frames.open_driver().and_then(|()| frames.start_streaming()) {
            warn!(session = %id, error = %e, "Could not start camera");
            consumer.on_fatal(&e);
            frames.close_driver();
            return Err(e.into());
        }

        let (sender, receiver) = unbounded_channel();
        let results = sender.clone();
        let worker = DecodeWorker::spawn(decoder, Arc::new(frames.clone()), move |outcome| {
            if results.send(SessionMessage::from(outcome)).is_err() {
                debug!("Session gone; dropping decode outcome");
            }
        });
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                frames.close_driver();
                return Err(e.into());
            }
        };

        let controller =
            SessionController::new(id, frames.clone(), worker, consumer, sender.clone());
        let task = tokio::spawn(controller.run(receiver));

        Ok(Self {
            frames,
            handle: SessionHandle { id, sender },
            task,
        })
    }

    pub fn id(&self) -> Uuid {
        self.handle.id
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear the session down and release the camera
    pub async fn quit(self) {
        self.handle.quit();
        self.wait().await;
    }

    /// Wait for the session to end on its own, then release the camera
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Scan session task failed");
        }
        let frames = self.frames;
        if let Err(e) = tokio::task::spawn_blocking(move || frames.close_driver()).await {
            warn!(error = %e, "Could not close camera");
        }
    }
}
