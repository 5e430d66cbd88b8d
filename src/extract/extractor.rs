//! [`TextExtractor`] trait and the `pdf-extract` backed implementation.

use std::path::Path;

use thiserror::Error;

use crate::extract::heuristics::structure_text;
use crate::pipeline::Extraction;

// ---------------------------------------------------------------------------
// ExtractError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The source file does not exist.
    #[error("PDF not found: {0}")]
    NotFound(String),

    /// The file exists but could not be decoded.
    #[error("PDF could not be read: {0}")]
    Unreadable(String),
}

// ---------------------------------------------------------------------------
// TextExtractor trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for turning a paper file into an
/// [`Extraction`].
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn TextExtractor>` and moved into `spawn_blocking`.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Extraction, ExtractError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TextExtractor>) {}
};

// ---------------------------------------------------------------------------
// PdfExtractor
// ---------------------------------------------------------------------------

/// Production extractor: decodes the PDF text layer with `pdf-extract` and
/// structures it with the [`heuristics`](crate::extract::heuristics).
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<Extraction, ExtractError> {
        if !path.exists() {
            return Err(ExtractError::NotFound(path.display().to_string()));
        }

        // pdf-extract panics on some malformed documents.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text(path))
            .map_err(|_| ExtractError::Unreadable(format!("{}: decoder panicked", path.display())))?
            .map_err(|e| ExtractError::Unreadable(e.to_string()))?;

        log::debug!(
            "extract: {} → {} chars of text",
            path.display(),
            text.chars().count()
        );

        Ok(structure_text(&text))
    }
}

// ---------------------------------------------------------------------------
// MockExtractor  (test-only)
// ---------------------------------------------------------------------------

/// Returns a fixed extraction (or error) for any path.
#[cfg(test)]
pub struct MockExtractor {
    response: Result<Extraction, ExtractError>,
}

#[cfg(test)]
impl MockExtractor {
    pub fn ok(extraction: Extraction) -> Self {
        Self {
            response: Ok(extraction),
        }
    }

    pub fn err(error: ExtractError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl TextExtractor for MockExtractor {
    fn extract(&self, _path: &Path) -> Result<Extraction, ExtractError> {
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
