//! Paper Axon — academic paper ingestion, interpretation and podcast pipeline.
//!
//! A paper (local PDF or arXiv identifier) is driven through
//! extraction → interpretation → persistence → audio synthesis by the
//! [`pipeline`] engine.  Long-running runs are submitted to the [`tasks`]
//! runner and polled through the [`tasks::TaskRegistry`].
//!
//! The external collaborators each live behind a narrow trait so the engine
//! can be exercised with deterministic fakes:
//!
//! | Module      | Trait            | Production implementation |
//! |-------------|------------------|---------------------------|
//! | [`extract`] | `TextExtractor`  | `PdfExtractor`            |
//! | [`arxiv`]   | `PaperSource`    | `ArxivClient`             |
//! | [`llm`]     | `Summarizer`     | `ApiSummarizer`           |
//! | [`tts`]     | `Synthesizer`    | `DashScopeSynthesizer`    |
//! | [`storage`] | `PaperStore`     | `SqliteStore`             |

pub mod arxiv;
pub mod config;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod tasks;
pub mod tts;
