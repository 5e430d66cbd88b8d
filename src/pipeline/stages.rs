//! The five stage executors.
//!
//! Every stage follows the same contract:
//! * an incoming record that already carries an error is returned untouched;
//! * a missing precondition sets `error` and changes nothing else;
//! * a collaborator failure is caught and recorded in `error`.
//!
//! Nothing escapes a stage as a Rust error or panic; the engine only ever
//! sees a new [`StageResult`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::arxiv::PaperSource;
use crate::extract::{truncate_chars, TextExtractor};
use crate::llm::prompt::{ABSTRACT_BUDGET, RAW_PREVIEW_BUDGET};
use crate::llm::Summarizer;
use crate::storage::{ArtifactStore, PaperStore};
use crate::tts::Synthesizer;

use super::error::StageError;
use super::state::{Extraction, PaperInput, RelatedPaper, StageResult};

/// Related-work hits requested per search.
pub const RELATED_MAX_RESULTS: usize = 10;
/// Characters of search query sent to the literature search.
pub const QUERY_MAX_CHARS: usize = 200;
/// Abstract characters folded into the search query.
pub const QUERY_ABSTRACT_CHARS: usize = 500;
/// Characters of each hit's summary kept in the result.
pub const RELATED_SUMMARY_CHARS: usize = 300;

// ---------------------------------------------------------------------------
// StageExecutor trait
// ---------------------------------------------------------------------------

/// One unit of pipeline work.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, result: StageResult) -> StageResult;
}

fn failed(stage: &str, result: StageResult, err: StageError) -> StageResult {
    log::warn!("pipeline: {stage}: {err}");
    result.fail(err.to_string())
}

// ---------------------------------------------------------------------------
// Extract
// ---------------------------------------------------------------------------

/// Resolves the paper file (downloading it from arXiv when needed) and
/// extracts its text.
pub struct ExtractStage {
    extractor: Arc<dyn TextExtractor>,
    source: Arc<dyn PaperSource>,
}

impl ExtractStage {
    pub fn new(extractor: Arc<dyn TextExtractor>, source: Arc<dyn PaperSource>) -> Self {
        Self { extractor, source }
    }

    async fn extract_file(&self, path: PathBuf) -> Result<Extraction, StageError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| StageError::collaborator("extract", e))?
            .map_err(|e| StageError::collaborator("extract", e))
    }
}

#[async_trait]
impl StageExecutor for ExtractStage {
    fn name(&self) -> &'static str {
        "Extract"
    }

    async fn execute(&self, mut result: StageResult) -> StageResult {
        if result.has_error() {
            return result;
        }
        let input = result.paper_input.clone().unwrap_or_default();
        let arxiv_id = input.arxiv_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        log::debug!("pipeline: Extract {:?}", input);

        // An arXiv id wins over a local path: its metadata is authoritative.
        if let Some(arxiv_id) = arxiv_id {
            let (entry, path) = match self.source.fetch_and_download(arxiv_id).await {
                Ok(found) => found,
                Err(e) => return failed(self.name(), result, StageError::collaborator("arxiv", e)),
            };
            let mut extraction = match self.extract_file(path.clone()).await {
                Ok(x) => x,
                Err(e) => return failed(self.name(), result, e),
            };
            extraction.title = entry.title.clone();
            extraction.authors = entry.authors_joined();
            extraction.abstract_text = entry.summary.clone();

            result.paper_input = Some(PaperInput {
                local_path: Some(path),
                ..input
            });
            result.extraction = Some(extraction);
            return result;
        }

        let Some(path) = input.local_path.clone() else {
            return failed(
                self.name(),
                result,
                StageError::Precondition("paper_input.local_path or paper_input.arxiv_id"),
            );
        };
        match self.extract_file(path).await {
            Ok(extraction) => {
                result.extraction = Some(extraction);
                result
            }
            Err(e) => failed(self.name(), result, e),
        }
    }
}

// ---------------------------------------------------------------------------
// Interpret
// ---------------------------------------------------------------------------

/// Produces the long-form interpretation from the extraction.
pub struct InterpretStage {
    summarizer: Arc<dyn Summarizer>,
}

impl InterpretStage {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }
}

/// The extraction as sent to the summarizer: abstract and body text cut to
/// their prompt budgets.
fn bounded(extraction: &Extraction) -> Extraction {
    Extraction {
        abstract_text: truncate_chars(&extraction.abstract_text, ABSTRACT_BUDGET),
        raw_text: truncate_chars(&extraction.raw_text, RAW_PREVIEW_BUDGET),
        ..extraction.clone()
    }
}

#[async_trait]
impl StageExecutor for InterpretStage {
    fn name(&self) -> &'static str {
        "Interpret"
    }

    async fn execute(&self, mut result: StageResult) -> StageResult {
        if result.has_error() {
            return result;
        }
        let Some(extraction) = result.extraction.as_ref() else {
            return failed(self.name(), result, StageError::Precondition("extraction"));
        };
        log::debug!("pipeline: Interpret \"{}\"", extraction.title);

        match self.summarizer.summarize(&bounded(extraction)).await {
            Ok(text) => {
                result.interpretation = Some(text);
                result
            }
            Err(e) => failed(self.name(), result, StageError::collaborator("summarize", e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

/// Writes the interpretation file and records its pointer.
pub struct PersistStage {
    artifacts: ArtifactStore,
    store: Arc<dyn PaperStore>,
}

impl PersistStage {
    pub fn new(artifacts: ArtifactStore, store: Arc<dyn PaperStore>) -> Self {
        Self { artifacts, store }
    }
}

#[async_trait]
impl StageExecutor for PersistStage {
    fn name(&self) -> &'static str {
        "Persist"
    }

    async fn execute(&self, mut result: StageResult) -> StageResult {
        if result.has_error() {
            return result;
        }
        let Some(paper_id) = result.paper_id().map(str::to_string) else {
            return failed(self.name(), result, StageError::Precondition("paper_id"));
        };
        let Some(interpretation) = result.interpretation() else {
            return failed(self.name(), result, StageError::Precondition("interpretation"));
        };
        log::debug!("pipeline: Persist {paper_id}");

        let path = match self
            .artifacts
            .write_interpretation(&paper_id, interpretation)
            .await
        {
            Ok(path) => path,
            Err(e) => return failed(self.name(), result, StageError::collaborator("persist", e)),
        };
        if let Err(e) = self
            .store
            .upsert_interpretation_pointer(&paper_id, &path.to_string_lossy())
            .await
        {
            return failed(self.name(), result, StageError::collaborator("persist", e));
        }

        result.memory_updated = true;
        result
    }
}

// ---------------------------------------------------------------------------
// Synthesize
// ---------------------------------------------------------------------------

/// Turns the interpretation into a podcast script, synthesizes it and records
/// the audio pointer.  Placeholder artifacts are recorded like real audio.
pub struct SynthesizeStage {
    summarizer: Arc<dyn Summarizer>,
    synthesizer: Arc<dyn Synthesizer>,
    artifacts: ArtifactStore,
    store: Arc<dyn PaperStore>,
}

impl SynthesizeStage {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        synthesizer: Arc<dyn Synthesizer>,
        artifacts: ArtifactStore,
        store: Arc<dyn PaperStore>,
    ) -> Self {
        Self {
            summarizer,
            synthesizer,
            artifacts,
            store,
        }
    }
}

#[async_trait]
impl StageExecutor for SynthesizeStage {
    fn name(&self) -> &'static str {
        "Synthesize"
    }

    async fn execute(&self, mut result: StageResult) -> StageResult {
        if result.has_error() {
            return result;
        }
        let Some(paper_id) = result.paper_id().map(str::to_string) else {
            return failed(self.name(), result, StageError::Precondition("paper_id"));
        };
        let Some(interpretation) = result.interpretation() else {
            return failed(self.name(), result, StageError::Precondition("interpretation"));
        };
        log::debug!("pipeline: Synthesize {paper_id}");

        let script = match self.summarizer.scriptify(interpretation).await {
            Ok(script) => script,
            Err(e) => return failed(self.name(), result, StageError::collaborator("scriptify", e)),
        };

        let output = self
            .synthesizer
            .synthesize(&script, &self.artifacts.podcast_output(&paper_id))
            .await;
        let path = output.path.to_string_lossy().into_owned();

        if let Err(e) = self
            .store
            .upsert_audio_pointer(&paper_id, &path, output.duration_secs)
            .await
        {
            return failed(self.name(), result, StageError::collaborator("synthesize", e));
        }

        result.podcast_audio_path = Some(path);
        result
    }
}

// ---------------------------------------------------------------------------
// Retrieve
// ---------------------------------------------------------------------------

/// Searches for related literature.  An unbuildable query yields an empty
/// list rather than an error.
pub struct RetrieveStage {
    source: Arc<dyn PaperSource>,
    store: Arc<dyn PaperStore>,
}

impl RetrieveStage {
    pub fn new(source: Arc<dyn PaperSource>, store: Arc<dyn PaperStore>) -> Self {
        Self { source, store }
    }

    async fn build_query(&self, result: &StageResult) -> Result<Option<String>, StageError> {
        if let Some(extraction) = &result.extraction {
            let query = search_query(&extraction.title, &extraction.abstract_text);
            if query.is_some() {
                return Ok(query);
            }
        }
        let Some(paper_id) = result.paper_id() else {
            return Ok(None);
        };
        let stored = self
            .store
            .get_paper_metadata(paper_id)
            .await
            .map_err(|e| StageError::collaborator("retrieve", e))?;
        Ok(stored.and_then(|meta| search_query(&meta.title, &meta.abstract_text)))
    }
}

/// `title + " " + abstract[..500]`, capped at 200 chars; `None` if blank.
fn search_query(title: &str, abstract_text: &str) -> Option<String> {
    let query = format!(
        "{} {}",
        title,
        truncate_chars(abstract_text, QUERY_ABSTRACT_CHARS)
    );
    let query = query.trim();
    if query.is_empty() {
        None
    } else {
        Some(truncate_chars(query, QUERY_MAX_CHARS))
    }
}

#[async_trait]
impl StageExecutor for RetrieveStage {
    fn name(&self) -> &'static str {
        "Retrieve"
    }

    async fn execute(&self, mut result: StageResult) -> StageResult {
        if result.has_error() {
            return result;
        }
        let query = match self.build_query(&result).await {
            Ok(Some(query)) => query,
            Ok(None) => {
                log::debug!("pipeline: Retrieve has no query, returning no related papers");
                result.related_papers = Some(Vec::new());
                return result;
            }
            Err(e) => return failed(self.name(), result, e),
        };
        log::debug!("pipeline: Retrieve \"{query}\"");

        match self.source.search(&query, RELATED_MAX_RESULTS).await {
            Ok(hits) => {
                let related = hits
                    .into_iter()
                    .map(|hit| RelatedPaper {
                        title: hit.title.clone(),
                        authors: hit.authors_joined(),
                        arxiv_id: hit.arxiv_id().to_string(),
                        summary: truncate_chars(&hit.summary, RELATED_SUMMARY_CHARS),
                        published_at: hit.published.clone(),
                    })
                    .collect();
                result.related_papers = Some(related);
                result
            }
            Err(e) => failed(self.name(), result, StageError::collaborator("search", e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
