//! Pipeline orchestration: routing, stage execution and the run loop.
//!
//! # Architecture
//!
//! ```text
//! StageResult ──▶ route() ──▶ NextStage
//!      ▲                         │
//!      │                         ▼
//!      └──── StageExecutor::execute(StageResult)
//!             Extract │ Interpret │ Persist │ Synthesize │ Retrieve
//! ```
//!
//! [`PipelineEngine::run`] repeats the loop until the router returns
//! [`NextStage::Done`] or a terminal stage has run.  Collaborator failures
//! never escape a stage: they become [`StageResult::error`], which the router
//! treats as an unconditional stop.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use paper_axon::pipeline::{PaperInput, PipelineEngine, PipelineMode, StageResult};
//! # use paper_axon::pipeline::Collaborators;
//! # fn collaborators() -> Collaborators { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = PipelineEngine::new(collaborators());
//!     let result = engine
//!         .run(
//!             StageResult::new(PipelineMode::Interpret)
//!                 .with_paper_id("a1b2c3d4e5f6")
//!                 .with_input(PaperInput::local("papers/a1b2c3d4e5f6.pdf")),
//!         )
//!         .await;
//!     assert!(result.memory_updated || result.error.is_some());
//! }
//! ```

pub mod engine;
pub mod error;
pub mod router;
pub mod stages;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use engine::{Collaborators, PipelineEngine, MAX_STAGE_EXECUTIONS};
pub use error::StageError;
pub use router::{route, NextStage};
pub use stages::{
    ExtractStage, InterpretStage, PersistStage, RetrieveStage, StageExecutor, SynthesizeStage,
};
pub use state::{Extraction, PaperInput, PipelineMode, RelatedPaper, StageResult};
