//! # finbox-extract
//!
//! Attachment content recovery for the finbox pipeline.
//!
//! This crate provides:
//! - Deterministic password candidate generation from a user's identity
//!   attributes (bank-specific formats plus generic fallbacks)
//! - A bridge to the external decoding subprocess with per-call timeout
//! - Per-format extraction adapters (PDF, image/OCR, CSV, spreadsheet,
//!   word-processor document, plain text) with in-process fallbacks
//! - Heuristic quality scoring of extracted text

pub mod adapters;
pub mod passwords;
pub mod quality;
pub mod subprocess;

// Re-export core types
pub use finbox_core::*;

pub use adapters::{
    CsvAdapter, FormatRegistry, ImageOcrAdapter, PdfAdapter, PlainTextAdapter, SpreadsheetAdapter,
    WordDocumentAdapter,
};
pub use passwords::{generate_candidates, CandidateResult, IdentityField};
pub use quality::{score_quality, QualityBand};
pub use subprocess::{DecoderOutput, SubprocessDecoder};
