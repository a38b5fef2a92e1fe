// SPDX-License-Identifier: GPL-3.0-only

//! Messages driving the session controller

use crate::frame_processor::{DecodeOutcome, DecodedSymbol};
use std::time::Duration;

/// Everything the controller reacts to, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    /// The decode worker found a symbol
    Decoded(DecodedSymbol),
    /// The decode worker found nothing in the last frame
    Failed,
    /// Resume scanning after a result
    RestartPreview,
    /// Resume scanning once the delay has passed
    ScheduleRestart(Duration),
    /// Tear the session down
    Quit,
}

impl From<DecodeOutcome> for SessionMessage {
    fn from(outcome: DecodeOutcome) -> Self {
        match outcome {
            DecodeOutcome::Decoded(symbol) => SessionMessage::Decoded(symbol),
            DecodeOutcome::Failed => SessionMessage::Failed,
        }
    }
}
