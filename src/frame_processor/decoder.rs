// SPDX-License-Identifier: GPL-3.0-only

//! Decoder seam
//!
//! The decode worker only knows this trait. Symbology implementations live in
//! [`crate::frame_processor::tasks`].

use super::luminance::DecodeInput;
use super::types::Symbol;

/// A pixel-level symbol decoder
pub trait Decoder: Send {
    /// Look for one symbol in `input`
    fn decode(&mut self, input: &DecodeInput) -> Option<Symbol>;

    /// Drop any state carried over from the previous attempt
    ///
    /// Called after every attempt, hit or miss.
    fn reset(&mut self) {}
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn decode(&mut self, input: &DecodeInput) -> Option<Symbol> {
        (**self).decode(input)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
