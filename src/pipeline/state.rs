//! The accumulating record threaded through the pipeline.
//!
//! [`StageResult`] is passed *by value* into every stage and a new value is
//! returned, so a caller's copy is never mutated behind its back.  Stages
//! only ever fill in fields; they never clear what an earlier stage produced.
//! The [`router`](super::router) decides what to run next purely from which
//! fields are present, which is what makes a run resumable from any
//! partially-populated record.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PipelineMode
// ---------------------------------------------------------------------------

/// The caller's declared intent; fixed for the lifetime of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Extract → Interpret → Persist → Synthesize.
    Interpret,
    /// Synthesize only, from an interpretation supplied by the caller.
    PodcastOnly,
    /// Retrieve related work and stop.
    RelatedOnly,
    /// Same stage sequence as [`PipelineMode::Interpret`].
    FullPipeline,
}

impl PipelineMode {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineMode::Interpret => "interpret",
            PipelineMode::PodcastOnly => "podcast_only",
            PipelineMode::RelatedOnly => "related_only",
            PipelineMode::FullPipeline => "full_pipeline",
        }
    }
}

// ---------------------------------------------------------------------------
// PaperInput
// ---------------------------------------------------------------------------

/// Raw source descriptor — present only before extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperInput {
    pub local_path: Option<PathBuf>,
    pub arxiv_id: Option<String>,
}

impl PaperInput {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: Some(path.into()),
            arxiv_id: None,
        }
    }

    pub fn arxiv(id: impl Into<String>) -> Self {
        Self {
            local_path: None,
            arxiv_id: Some(id.into()),
        }
    }

    /// `true` when neither a path nor a non-blank arXiv id is set.
    pub fn is_empty(&self) -> bool {
        self.local_path.is_none()
            && self
                .arxiv_id
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Structured text pulled out of a paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub title: String,
    /// Comma-joined author names (may be empty for heuristic extraction).
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    /// Section headings in document order.
    pub sections: Vec<String>,
    pub raw_text: String,
}

// ---------------------------------------------------------------------------
// RelatedPaper
// ---------------------------------------------------------------------------

/// One hit from the related-literature search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedPaper {
    pub title: String,
    pub authors: String,
    pub arxiv_id: String,
    pub summary: String,
    pub published_at: Option<String>,
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Snapshot of everything a pipeline run has accumulated so far.
///
/// Presence checks treat empty strings as absent, so a blank
/// `interpretation` or `paper_id` never satisfies a stage precondition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub mode: PipelineMode,
    pub paper_id: Option<String>,
    pub paper_input: Option<PaperInput>,
    pub extraction: Option<Extraction>,
    pub interpretation: Option<String>,
    pub related_papers: Option<Vec<RelatedPaper>>,
    pub memory_updated: bool,
    pub podcast_audio_path: Option<String>,
    pub error: Option<String>,
}

impl StageResult {
    /// An empty record for `mode`.
    pub fn new(mode: PipelineMode) -> Self {
        Self {
            mode,
            paper_id: None,
            paper_input: None,
            extraction: None,
            interpretation: None,
            related_papers: None,
            memory_updated: false,
            podcast_audio_path: None,
            error: None,
        }
    }

    pub fn with_paper_id(mut self, paper_id: impl Into<String>) -> Self {
        self.paper_id = Some(paper_id.into());
        self
    }

    pub fn with_input(mut self, input: PaperInput) -> Self {
        self.paper_input = Some(input);
        self
    }

    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = Some(extraction);
        self
    }

    pub fn with_interpretation(mut self, interpretation: impl Into<String>) -> Self {
        self.interpretation = Some(interpretation.into());
        self
    }

    /// Return a copy carrying `message` as its error and nothing else changed.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn has_error(&self) -> bool {
        non_blank(self.error.as_deref()).is_some()
    }

    pub fn paper_id(&self) -> Option<&str> {
        non_blank(self.paper_id.as_deref())
    }

    pub fn interpretation(&self) -> Option<&str> {
        non_blank(self.interpretation.as_deref())
    }

    pub fn has_paper_input(&self) -> bool {
        self.paper_input.as_ref().is_some_and(|input| !input.is_empty())
    }

    pub fn has_extraction(&self) -> bool {
        self.extraction.is_some()
    }

    pub fn has_podcast(&self) -> bool {
        non_blank(self.podcast_audio_path.as_deref()).is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
