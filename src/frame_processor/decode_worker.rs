// SPDX-License-Identifier: GPL-3.0-only

//! Decode worker thread
//!
//! The worker owns the decoder and processes one frame at a time, in arrival
//! order. Each attempt ends in exactly one [`DecodeOutcome`] handed to the
//! result sink. Frames reach the worker through [`DecodeWorker::frame_target`],
//! a single-shot callback the frame source invokes from the device thread.
//!
//! A decoder that panics is treated as having found nothing; the thread
//! survives and keeps serving frames.
//!
//! Quitting does not interrupt a decode in progress. The running flag is
//! checked before each message, so at most the current attempt finishes.

use super::decoder::Decoder;
use super::luminance::DecodeInput;
use super::types::{DecodeOutcome, DecodedSymbol};
use crate::backends::camera::types::{Frame, FrameCallback, FrameTag};
use crate::constants::thumbnail::JPEG_QUALITY;
use image::codecs::jpeg::JpegEncoder;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Crops preview frames to the region worth decoding
pub trait RegionOfInterest: Send + Sync {
    /// `None` when the scan geometry is not known yet
    fn build_decode_input(&self, data: Arc<[u8]>, width: u32, height: u32) -> Option<DecodeInput>;
}

/// Messages processed by the worker thread
#[derive(Debug)]
pub enum WorkerMessage {
    Decode { tag: FrameTag, frame: Frame },
    Quit,
}

/// Handle to the decode worker thread
pub struct DecodeWorker {
    sender: mpsc::Sender<WorkerMessage>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    /// Spawn the worker thread
    ///
    /// `on_outcome` runs on the worker thread once per decode attempt.
    pub fn spawn<F>(
        mut decoder: Box<dyn Decoder>,
        region: Arc<dyn RegionOfInterest>,
        on_outcome: F,
    ) -> std::io::Result<Self>
    where
        F: Fn(DecodeOutcome) + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("qrscan-decode".to_string())
            .spawn(move || {
                debug!("Decode worker started");
                while thread_running.load(Ordering::Acquire) {
                    match receiver.recv() {
                        Ok(WorkerMessage::Decode { tag, frame }) => {
                            if !thread_running.load(Ordering::Acquire) {
                                break;
                            }
                            let outcome =
                                decode_frame(decoder.as_mut(), region.as_ref(), tag, frame);
                            on_outcome(outcome);
                        }
                        Ok(WorkerMessage::Quit) | Err(_) => break,
                    }
                }
                info!("Decode worker exiting");
            })?;

        Ok(Self {
            sender,
            running,
            handle: Some(handle),
        })
    }

    /// Single-shot frame callback that queues the frame for decoding
    pub fn frame_target(&self, tag: FrameTag) -> FrameCallback {
        let sender = self.sender.clone();
        Box::new(move |frame| {
            if sender.send(WorkerMessage::Decode { tag, frame }).is_err() {
                debug!(tag, "Decode worker gone; dropping frame");
            }
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop accepting decode requests (non-blocking)
    pub fn quit(&self) {
        self.running.store(false, Ordering::Release);
        // The thread may already be gone
        let _ = self.sender.send(WorkerMessage::Quit);
    }

    /// Quit and wait up to `timeout` for the thread to finish
    ///
    /// Returns `true` if the thread was joined. On timeout the thread is left
    /// to finish its current attempt on its own.
    pub async fn shutdown(&mut self, timeout: Duration) -> bool {
        self.quit();
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let join = tokio::task::spawn_blocking(move || handle.join());
        match tokio::time::timeout(timeout, join).await {
            Ok(Ok(Ok(()))) => {
                debug!("Decode worker joined");
                true
            }
            Ok(Ok(Err(_))) => {
                warn!("Decode worker panicked");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Could not join decode worker");
                false
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis(),
                    "Decode worker did not stop in time"
                );
                false
            }
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.quit();
        }
    }
}

/// Run one decode attempt
fn decode_frame(
    decoder: &mut dyn Decoder,
    region: &dyn RegionOfInterest,
    tag: FrameTag,
    frame: Frame,
) -> DecodeOutcome {
    let start = Instant::now();

    let Some(input) = region.build_decode_input(frame.data, frame.width, frame.height) else {
        debug!(tag, "No scan region for frame; counting as a miss");
        return DecodeOutcome::Failed;
    };

    // A panicking decoder still owes the session an outcome
    let symbol = match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&input))) {
        Ok(symbol) => symbol,
        Err(_) => {
            warn!(tag, "Decoder panicked; counting as a miss");
            None
        }
    };
    decoder.reset();

    match symbol {
        Some(symbol) => {
            debug!(
                tag,
                elapsed_ms = start.elapsed().as_millis(),
                "Found barcode"
            );
            let mut decoded = DecodedSymbol::from_symbol(symbol);
            if let Some((thumbnail, scale_factor)) = bundle_thumbnail(&input) {
                decoded.thumbnail = Some(thumbnail);
                decoded.scale_factor = Some(scale_factor);
            }
            DecodeOutcome::Decoded(decoded)
        }
        None => {
            trace!(
                tag,
                elapsed_ms = start.elapsed().as_millis(),
                "No barcode in frame"
            );
            DecodeOutcome::Failed
        }
    }
}

/// JPEG thumbnail of the scan region and its width relative to the region
pub fn bundle_thumbnail(input: &DecodeInput) -> Option<(Vec<u8>, f32)> {
    let thumbnail = input.render_thumbnail();
    let scale_factor = thumbnail.width() as f32 / input.width() as f32;

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    if let Err(e) = thumbnail.write_with_encoder(encoder) {
        warn!(error = %e, "Failed to compress thumbnail");
        return None;
    }
    Some((bytes, scale_factor))
}
