//! Stage routing — a pure decision table over [`StageResult`] field presence.
//!
//! ```text
//! error set                     → Done
//! RelatedOnly                   → Retrieve
//! PodcastOnly                   → Synthesize if interpretation + paper_id, else Done
//! Interpret / FullPipeline:
//!   no extraction, has source   → Extract
//!   extraction, no interp.      → Interpret
//!   interp., not persisted      → Persist
//!   persisted, paper_id         → Synthesize
//!   otherwise                   → Done
//! ```
//!
//! Synthesize additionally requires that no podcast path has been recorded
//! yet, so a fully populated record always routes straight to `Done`.
//! Retrieve and Synthesize are terminal for their modes: the engine stops
//! after them without consulting the table again (see
//! [`NextStage::is_terminal`]).

use super::state::{PipelineMode, StageResult};

/// What the engine should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextStage {
    Extract,
    Interpret,
    Persist,
    Synthesize,
    Retrieve,
    Done,
}

impl NextStage {
    pub fn label(&self) -> &'static str {
        match self {
            NextStage::Extract => "Extract",
            NextStage::Interpret => "Interpret",
            NextStage::Persist => "Persist",
            NextStage::Synthesize => "Synthesize",
            NextStage::Retrieve => "Retrieve",
            NextStage::Done => "Done",
        }
    }

    /// Stages after which a run ends regardless of the resulting state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NextStage::Synthesize | NextStage::Retrieve | NextStage::Done
        )
    }
}

/// Decide the next stage for `result`.  First match wins.
pub fn route(result: &StageResult) -> NextStage {
    if result.has_error() {
        return NextStage::Done;
    }

    match result.mode {
        PipelineMode::RelatedOnly => NextStage::Retrieve,
        PipelineMode::PodcastOnly => {
            if result.interpretation().is_some()
                && result.paper_id().is_some()
                && !result.has_podcast()
            {
                NextStage::Synthesize
            } else {
                NextStage::Done
            }
        }
        PipelineMode::Interpret | PipelineMode::FullPipeline => route_linear(result),
    }
}

fn route_linear(result: &StageResult) -> NextStage {
    let has_source = result.has_paper_input() || result.paper_id().is_some();

    if !result.has_extraction() && has_source {
        NextStage::Extract
    } else if result.has_extraction() && result.interpretation().is_none() {
        NextStage::Interpret
    } else if result.interpretation().is_some() && !result.memory_updated {
        NextStage::Persist
    } else if result.memory_updated && result.paper_id().is_some() && !result.has_podcast() {
        NextStage::Synthesize
    } else {
        NextStage::Done
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
