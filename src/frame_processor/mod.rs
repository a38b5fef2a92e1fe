// SPDX-License-Identifier: MPL-2.0

//! Frame processing for the scan session
//!
//! Preview frames are cropped to the scan region, decoded on a dedicated
//! worker thread and reported back as [`DecodeOutcome`]s.

pub mod decode_worker;
pub mod decoder;
pub mod luminance;
pub mod tasks;
pub mod types;

pub use decode_worker::{DecodeWorker, RegionOfInterest, WorkerMessage, bundle_thumbnail};
pub use decoder::Decoder;
pub use luminance::DecodeInput;
pub use tasks::QrDecoder;
pub use types::{DecodeOutcome, DecodedSymbol, ResultPoint, ScanAction, Symbol, SymbolFormat};
