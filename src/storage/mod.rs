//! Persistence collaborator: SQLite registry plus on-disk artifacts.
//!
//! This module provides:
//! * [`PaperStore`] — async trait for paper rows and artifact pointers.
//! * [`SqliteStore`] — `sqlx` implementation of [`PaperStore`].
//! * [`ArtifactStore`] — interpretation/podcast/PDF files by paper id.
//! * [`connect`] / [`connect_in_memory`] — pool creation with schema setup.

pub mod artifacts;
pub mod papers;
pub mod schema;

pub use artifacts::ArtifactStore;
pub use papers::{
    new_paper_id, ArxivMetadataUpdate, AudioPointer, InterpretationPointer, PaperMetadata,
    PaperRecord, PaperStore, SourceType, SqliteStore, StoreError,
};
pub use schema::{connect, connect_in_memory, init_schema, now_timestamp};
