//! Paper text extraction.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │             TextExtractor (trait)             │
//! │                                               │
//! │   ┌──────────────┐     ┌──────────────────┐   │
//! │   │ PdfExtractor │────▶│ heuristics       │   │
//! │   │ - pdf-extract│     │ - title/abstract │   │
//! │   └──────────────┘     │ - sections       │   │
//! │                        │ - keywords       │   │
//! │                        └──────────────────┘   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Extraction is CPU-bound and synchronous; async callers push it onto
//! `tokio::task::spawn_blocking`.

pub mod extractor;
pub mod heuristics;

pub use extractor::{ExtractError, PdfExtractor, TextExtractor};
pub use heuristics::{structure_text, truncate_chars};

#[cfg(test)]
pub use extractor::MockExtractor;
