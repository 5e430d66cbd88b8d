//! arXiv metadata, PDF download and literature search.
//!
//! This module provides:
//! * [`PaperSource`] — async trait the pipeline uses for retrieval.
//! * [`ArxivClient`] — production implementation over the arXiv Atom API.
//! * [`ArxivEntry`] — one parsed `<entry>` of an Atom feed.
//! * [`extract_arxiv_id`] — pull an identifier out of a URL or bare id.
//! * [`ArxivError`] — error variants for retrieval operations.

pub mod client;
pub mod feed;
pub mod id;

pub use client::{ArxivClient, ArxivError, PaperSource};
pub use feed::{parse_feed, ArxivEntry};
pub use id::extract_arxiv_id;

#[cfg(test)]
pub use client::MockPaperSource;
