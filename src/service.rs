//! [`PaperService`] — the façade the CLI (or any other front end) drives.
//!
//! # Operations
//!
//! | Operation             | Execution                    | Result                 |
//! |-----------------------|------------------------------|------------------------|
//! | `upload`              | inline                       | new `pdf` paper row    |
//! | `from_arxiv`          | inline                       | existing or new row    |
//! | `refresh_arxiv`       | inline                       | refreshed or new row   |
//! | `get_paper`           | inline                       | paper row              |
//! | `interpretation`      | inline (via pointer)         | Markdown text          |
//! | `podcast`             | inline (via pointer)         | playable audio file    |
//! | `trigger_interpret`   | task (`Interpret` mode)      | task id                |
//! | `trigger_podcast`     | task (`PodcastOnly` mode)    | task id                |
//! | `related`             | inline (`RelatedOnly` mode)  | related papers         |
//! | `poll_task`           | inline                       | task record            |
//! | `collect`             | inline                       | count of new papers    |
//!
//! Pipeline runs that write artifacts always go through the [`TaskRunner`],
//! which allows one in-flight task per paper.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::arxiv::{extract_arxiv_id, ArxivClient, ArxivEntry, ArxivError, PaperSource};
use crate::config::{AppConfig, ArxivConfig};
use crate::extract::PdfExtractor;
use crate::llm::ApiSummarizer;
use crate::pipeline::{
    Collaborators, Extraction, PaperInput, PipelineEngine, PipelineMode, RelatedPaper, StageResult,
};
use crate::storage::{
    connect, new_paper_id, ArtifactStore, ArxivMetadataUpdate, PaperRecord, PaperStore,
    SourceType, SqliteStore, StoreError,
};
use crate::tasks::{
    RegistryError, SqliteTaskRegistry, TaskError, TaskKind, TaskRecord, TaskRegistry, TaskRunner,
};
use crate::tts::{is_placeholder_artifact, DashScopeSynthesizer};

/// Papers considered by one `collect` run must have been updated this recently.
const COLLECT_WINDOW_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("paper not found: {0}")]
    NotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("no interpretation for {0}")]
    NoInterpretation(String),

    #[error("no podcast for {0}")]
    NoPodcast(String),

    /// A pointer names a file that is gone.
    #[error("artifact file missing: {0}")]
    ArtifactMissing(String),

    /// Synthesis was unavailable; only the script exists.
    #[error("only a text placeholder exists for {paper_id}: {script_path}")]
    PlaceholderOnly { paper_id: String, script_path: String },

    /// A real podcast already exists; nothing was scheduled.
    #[error("podcast already exists for {paper_id}: {audio_path}")]
    AlreadyExists { paper_id: String, audio_path: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("pipeline failed: {0}")]
    Pipeline(String),

    #[error("task {0} did not finish in time")]
    Timeout(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Arxiv(#[from] ArxivError),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// PodcastAudio
// ---------------------------------------------------------------------------

/// A playable podcast file resolved through the audio pointer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodcastAudio {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub media_type: &'static str,
}

// ---------------------------------------------------------------------------
// PaperService
// ---------------------------------------------------------------------------

pub struct PaperService {
    engine: Arc<PipelineEngine>,
    parts: Collaborators,
    runner: TaskRunner,
    arxiv: ArxivConfig,
}

impl PaperService {
    /// Production wiring: data directories, SQLite database and the HTTP
    /// collaborators described by `config`.
    pub async fn open(config: &AppConfig) -> Result<Self, ServiceError> {
        let layout = config.layout();
        layout.ensure_dirs()?;
        log::info!("service: data dir {}", layout.root.display());

        let pool = connect(&layout.db_file).await.map_err(StoreError::from)?;
        let parts = Collaborators {
            extractor: Arc::new(PdfExtractor::new()),
            source: Arc::new(ArxivClient::new(&config.arxiv, layout.papers_dir.clone())),
            summarizer: Arc::new(ApiSummarizer::from_config(&config.llm)),
            synthesizer: Arc::new(DashScopeSynthesizer::from_config(&config.tts)),
            store: Arc::new(SqliteStore::new(pool.clone())),
            artifacts: ArtifactStore::new(layout),
        };
        let registry = Arc::new(SqliteTaskRegistry::new(pool));
        Ok(Self::with_parts(parts, registry, config))
    }

    /// Service over caller-supplied collaborators and task registry.
    pub fn with_parts(
        parts: Collaborators,
        registry: Arc<dyn TaskRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self {
            engine: Arc::new(PipelineEngine::new(parts.clone())),
            runner: TaskRunner::new(registry, config.tasks.workers),
            arxiv: config.arxiv.clone(),
            parts,
        }
    }

    // --- core entry points --------------------------------------------------

    /// Run the pipeline to completion on the caller's task.
    pub async fn run_pipeline(&self, initial: StageResult) -> StageResult {
        self.engine.run(initial).await
    }

    pub async fn poll_task(&self, task_id: &str) -> Result<TaskRecord, ServiceError> {
        self.runner
            .registry()
            .get(task_id)
            .await?
            .ok_or_else(|| ServiceError::TaskNotFound(task_id.to_string()))
    }

    /// Poll `task_id` every `interval` until it is terminal.
    pub async fn wait_task(
        &self,
        task_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<TaskRecord, ServiceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let record = self.poll_task(task_id).await?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ServiceError::Timeout(task_id.to_string()));
            }
            tokio::time::sleep(interval).await;
        }
    }

    // --- ingest -------------------------------------------------------------

    /// Copy a local PDF into the library and register it.
    pub async fn upload(&self, path: &Path) -> Result<PaperRecord, ServiceError> {
        if !path.is_file() {
            return Err(ServiceError::InvalidInput(format!(
                "file not found: {}",
                path.display()
            )));
        }
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(ServiceError::InvalidInput("only PDF files are supported".into()));
        }

        let paper_id = new_paper_id();
        let dest = self.parts.artifacts.pdf_path(&paper_id);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &dest).await?;

        let extraction = self.extract_best_effort(dest.clone()).await;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut record = PaperRecord::new(&paper_id, SourceType::Pdf, dest.to_string_lossy());
        record.title = extraction
            .as_ref()
            .map(|x| x.title.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or(stem);
        if let Some(x) = extraction {
            record.authors = x.authors;
            record.abstract_text = x.abstract_text;
        }

        self.parts.store.insert_paper(&record).await?;
        log::info!("service: uploaded {} as {paper_id}", path.display());
        Ok(record)
    }

    async fn extract_best_effort(&self, path: PathBuf) -> Option<Extraction> {
        let extractor = Arc::clone(&self.parts.extractor);
        match tokio::task::spawn_blocking(move || extractor.extract(&path)).await {
            Ok(Ok(extraction)) => Some(extraction),
            Ok(Err(e)) => {
                log::warn!("service: metadata extraction failed: {e}");
                None
            }
            Err(e) => {
                log::warn!("service: metadata extraction aborted: {e}");
                None
            }
        }
    }

    /// Register an arXiv paper by URL or identifier.  A paper that is
    /// already known is returned as stored, without contacting arXiv.
    pub async fn from_arxiv(&self, url_or_id: &str) -> Result<PaperRecord, ServiceError> {
        let arxiv_id = parse_arxiv_input(url_or_id)?;
        if let Some(existing) = self.parts.store.find_by_arxiv_id(&arxiv_id).await? {
            log::info!("service: arXiv {arxiv_id} already registered as {}", existing.paper_id);
            return Ok(existing);
        }
        self.ingest_arxiv(&arxiv_id).await
    }

    /// Download the PDF and metadata again, updating a known paper in place
    /// (or registering it if new).
    pub async fn refresh_arxiv(&self, url_or_id: &str) -> Result<PaperRecord, ServiceError> {
        let arxiv_id = parse_arxiv_input(url_or_id)?;
        self.ingest_arxiv(&arxiv_id).await
    }

    async fn ingest_arxiv(&self, arxiv_id: &str) -> Result<PaperRecord, ServiceError> {
        let (entry, pdf) = self.parts.source.fetch_and_download(arxiv_id).await?;
        let update = metadata_update(&entry, &pdf);

        if let Some(paper_id) = self
            .parts
            .store
            .update_paper_by_arxiv_id(arxiv_id, &update)
            .await?
        {
            log::info!("service: refreshed arXiv {arxiv_id} ({paper_id})");
            return self
                .parts
                .store
                .get_paper(&paper_id)
                .await?
                .ok_or(ServiceError::NotFound(paper_id));
        }

        let mut record = PaperRecord::new(new_paper_id(), SourceType::Arxiv, update.source_path_or_url);
        record.title = update.title;
        record.authors = update.authors;
        record.abstract_text = update.abstract_text;
        record.published_at = update.published_at;
        record.arxiv_id = arxiv_id.to_string();

        self.parts.store.insert_paper(&record).await?;
        log::info!("service: added arXiv {arxiv_id} as {}", record.paper_id);
        Ok(record)
    }

    // --- triggers -----------------------------------------------------------

    /// Schedule a full interpretation (plus podcast) of a registered paper.
    pub async fn trigger_interpret(&self, paper_id: &str) -> Result<String, ServiceError> {
        let paper = self.get_paper(paper_id).await?;
        let pdf = PathBuf::from(&paper.source_path_or_url);
        let interpretation_path = self.parts.artifacts.interpretation_path(paper_id);

        let engine = Arc::clone(&self.engine);
        let id = paper_id.to_string();
        let job = async move {
            let initial = StageResult::new(PipelineMode::Interpret).with_paper_id(&id);
            if !pdf.is_file() {
                return initial.fail("PDF file missing");
            }
            engine.run(initial.with_input(PaperInput::local(pdf))).await
        };

        let id = paper_id.to_string();
        let summarize = move |result: &StageResult| {
            json!({
                "paper_id": id,
                "interpretation_path": interpretation_path.to_string_lossy(),
                "podcast_audio_path": result.podcast_audio_path,
                "is_placeholder": placeholder_flag(result),
            })
        };

        let task = self
            .runner
            .submit(TaskKind::Interpret, paper_id, job, summarize)
            .await?;
        Ok(task.task_id)
    }

    /// Schedule podcast generation from the stored interpretation.
    pub async fn trigger_podcast(&self, paper_id: &str) -> Result<String, ServiceError> {
        self.get_paper(paper_id).await?;
        if let Some(audio) = self.parts.artifacts.existing_audio(paper_id) {
            return Err(ServiceError::AlreadyExists {
                paper_id: paper_id.to_string(),
                audio_path: audio.to_string_lossy().into_owned(),
            });
        }

        let engine = Arc::clone(&self.engine);
        let artifacts = self.parts.artifacts.clone();
        let id = paper_id.to_string();
        let job = async move {
            let initial = StageResult::new(PipelineMode::PodcastOnly).with_paper_id(&id);
            match artifacts.read_interpretation(&id).await {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    engine.run(initial.with_interpretation(text)).await
                }
                Ok(_) => initial.fail("interpretation missing, run interpret first"),
                Err(e) => initial.fail(format!("interpretation unreadable: {e}")),
            }
        };

        let id = paper_id.to_string();
        let summarize = move |result: &StageResult| {
            json!({
                "paper_id": id,
                "podcast_audio_path": result.podcast_audio_path,
                "is_placeholder": placeholder_flag(result),
            })
        };

        let task = self
            .runner
            .submit(TaskKind::Podcast, paper_id, job, summarize)
            .await?;
        Ok(task.task_id)
    }

    /// Related literature for a registered paper.
    pub async fn related(&self, paper_id: &str) -> Result<Vec<RelatedPaper>, ServiceError> {
        let metadata = self
            .parts
            .store
            .get_paper_metadata(paper_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(paper_id.to_string()))?;

        let mut initial = StageResult::new(PipelineMode::RelatedOnly).with_paper_id(paper_id);
        if !metadata.title.is_empty() || !metadata.abstract_text.is_empty() {
            initial = initial.with_extraction(Extraction {
                title: metadata.title,
                abstract_text: metadata.abstract_text,
                ..Extraction::default()
            });
        }

        let result = self.engine.run(initial).await;
        if let Some(err) = result.error.filter(|e| !e.is_empty()) {
            return Err(ServiceError::Pipeline(err));
        }
        Ok(result.related_papers.unwrap_or_default())
    }

    // --- artifacts ----------------------------------------------------------

    /// Markdown interpretation, read through the interpretation pointer.
    pub async fn interpretation(&self, paper_id: &str) -> Result<String, ServiceError> {
        let pointer = self
            .parts
            .store
            .get_interpretation_pointer(paper_id)
            .await?
            .ok_or_else(|| ServiceError::NoInterpretation(paper_id.to_string()))?;
        match tokio::fs::read_to_string(&pointer.content_path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::ArtifactMissing(pointer.content_path))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Playable podcast audio, resolved through the audio pointer.  A text
    /// placeholder is reported as [`ServiceError::PlaceholderOnly`].
    pub async fn podcast(&self, paper_id: &str) -> Result<PodcastAudio, ServiceError> {
        let pointer = self
            .parts
            .store
            .get_audio_pointer(paper_id)
            .await?
            .ok_or_else(|| ServiceError::NoPodcast(paper_id.to_string()))?;
        let path = PathBuf::from(&pointer.audio_path);

        let placeholder = |script: &Path| ServiceError::PlaceholderOnly {
            paper_id: paper_id.to_string(),
            script_path: script.to_string_lossy().into_owned(),
        };
        if !path.is_file() {
            let script = path.with_extension("txt");
            if script.is_file() {
                return Err(placeholder(&script));
            }
            return Err(ServiceError::ArtifactMissing(pointer.audio_path));
        }
        if is_placeholder_artifact(&path) {
            return Err(placeholder(&path));
        }

        let is_wav = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        Ok(PodcastAudio {
            media_type: if is_wav { "audio/wav" } else { "audio/mpeg" },
            duration_secs: pointer.duration_secs,
            path,
        })
    }

    // --- library ------------------------------------------------------------

    pub async fn list(&self, limit: u32, offset: u32) -> Result<Vec<PaperRecord>, ServiceError> {
        Ok(self.parts.store.list_papers(limit, offset).await?)
    }

    /// Remove a paper, its pointers and its files.
    pub async fn delete(&self, paper_id: &str) -> Result<(), ServiceError> {
        let _claim = self.runner.claim(paper_id)?;
        let paper = self.get_paper(paper_id).await?;
        self.parts.store.delete_paper(paper_id).await?;

        // arXiv downloads are named after the arXiv id, not the paper id.
        let source = PathBuf::from(&paper.source_path_or_url);
        if source.starts_with(&self.parts.artifacts.layout().papers_dir) {
            match tokio::fs::remove_file(&source).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        self.parts.artifacts.remove_all(paper_id).await?;
        log::info!("service: deleted {paper_id}");
        Ok(())
    }

    /// Ingest recently updated papers of `category` (configured default when
    /// `None`).  Returns how many papers were new.
    pub async fn collect(&self, category: Option<&str>) -> Result<usize, ServiceError> {
        let category = category
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.arxiv.default_category)
            .to_string();
        let entries = self
            .parts
            .source
            .list_recent(&category, self.arxiv.collect_max_results)
            .await?;
        let cutoff = Utc::now() - chrono::Duration::hours(COLLECT_WINDOW_HOURS);

        let mut added = 0;
        for entry in &entries {
            if !updated_since(entry, cutoff) {
                continue;
            }
            let Some(arxiv_id) = extract_arxiv_id(entry.arxiv_id()) else {
                log::debug!("service: collect skips unparsable id {}", entry.entry_id);
                continue;
            };
            if self.parts.store.find_by_arxiv_id(&arxiv_id).await?.is_some() {
                continue;
            }
            match self.ingest_arxiv(&arxiv_id).await {
                Ok(_) => added += 1,
                Err(e) => log::warn!("service: collect {arxiv_id} failed: {e}"),
            }
        }

        self.parts.store.record_collect_run(&category, added).await?;
        log::info!("service: collected {added} new paper(s) from {category}");
        Ok(added)
    }

    pub async fn get_paper(&self, paper_id: &str) -> Result<PaperRecord, ServiceError> {
        self.parts
            .store
            .get_paper(paper_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(paper_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_arxiv_input(url_or_id: &str) -> Result<String, ServiceError> {
    extract_arxiv_id(url_or_id).ok_or_else(|| {
        ServiceError::InvalidInput(format!("not an arXiv URL or identifier: {url_or_id}"))
    })
}

fn metadata_update(entry: &ArxivEntry, pdf: &Path) -> ArxivMetadataUpdate {
    ArxivMetadataUpdate {
        source_path_or_url: pdf.to_string_lossy().into_owned(),
        title: entry.title.clone(),
        authors: entry.authors_joined(),
        abstract_text: entry.summary.clone(),
        published_at: entry.published.clone().unwrap_or_default(),
    }
}

fn placeholder_flag(result: &StageResult) -> bool {
    result
        .podcast_audio_path
        .as_deref()
        .is_some_and(|p| is_placeholder_artifact(Path::new(p)))
}

/// Entries without a parsable `updated` (or `published`) time are skipped.
fn updated_since(entry: &ArxivEntry, cutoff: DateTime<Utc>) -> bool {
    entry
        .updated
        .as_deref()
        .or(entry.published.as_deref())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .is_some_and(|t| t.with_timezone(&Utc) >= cutoff)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arxiv::MockPaperSource;
    use crate::config::DataLayout;
    use crate::extract::{ExtractError, MockExtractor, TextExtractor};
    use crate::llm::{MockSummarizer, Summarizer};
    use crate::storage::connect_in_memory;
    use crate::tasks::TaskStatus;
    use crate::tts::{MockSynthesizer, Synthesizer};
    use tempfile::TempDir;

    struct Harness {
        service: PaperService,
        dir: TempDir,
    }

    struct Setup {
        extractor: Arc<dyn TextExtractor>,
        source: MockPaperSource,
        summarizer: Arc<dyn Summarizer>,
        synthesizer: Arc<dyn Synthesizer>,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                extractor: Arc::new(MockExtractor::ok(Extraction {
                    title: "Extracted title".into(),
                    abstract_text: "Extracted abstract".into(),
                    raw_text: "body".into(),
                    ..Extraction::default()
                })),
                source: MockPaperSource::default(),
                summarizer: Arc::new(MockSummarizer::ok("# Interpretation", "Script.")),
                synthesizer: Arc::new(MockSynthesizer::audio()),
            }
        }
    }

    async fn harness(setup: Setup) -> Harness {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = DataLayout::new(dir.path());
        layout.ensure_dirs().expect("dirs");
        let pool = connect_in_memory().await.expect("pool");

        let parts = Collaborators {
            extractor: setup.extractor,
            source: Arc::new(setup.source),
            summarizer: setup.summarizer,
            synthesizer: setup.synthesizer,
            store: Arc::new(SqliteStore::new(pool.clone())),
            artifacts: ArtifactStore::new(layout),
        };
        let registry = Arc::new(SqliteTaskRegistry::new(pool));
        let service = PaperService::with_parts(parts, registry, &AppConfig::default());
        Harness { service, dir }
    }

    impl Harness {
        fn pdf(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"%PDF-1.4 fake").expect("write pdf");
            path
        }

        async fn wait(&self, task_id: &str) -> TaskRecord {
            self.service
                .wait_task(task_id, Duration::from_millis(10), Duration::from_secs(5))
                .await
                .expect("task finishes")
        }
    }

    fn recent_entry(id: &str, updated: DateTime<Utc>) -> ArxivEntry {
        ArxivEntry {
            entry_id: format!("http://arxiv.org/abs/{id}v1"),
            title: format!("Paper {id}"),
            authors: vec!["A. Author".into()],
            summary: "Abstract".into(),
            updated: Some(updated.to_rfc3339()),
            ..ArxivEntry::default()
        }
    }

    #[tokio::test]
    async fn upload_copies_pdf_and_uses_extracted_title() {
        let h = harness(Setup::default()).await;
        let record = h.service.upload(&h.pdf("paper.pdf")).await.expect("upload");

        assert_eq!(record.paper_id.len(), 12);
        assert_eq!(record.source_type, SourceType::Pdf);
        assert_eq!(record.title, "Extracted title");
        assert!(Path::new(&record.source_path_or_url).is_file());
        assert_eq!(h.service.list(10, 0).await.expect("list"), vec![record]);
    }

    #[tokio::test]
    async fn upload_falls_back_to_file_stem() {
        let h = harness(Setup {
            extractor: Arc::new(MockExtractor::err(ExtractError::Unreadable("bad xref".into()))),
            ..Setup::default()
        })
        .await;
        let record = h.service.upload(&h.pdf("quantum-notes.pdf")).await.expect("upload");
        assert_eq!(record.title, "quantum-notes");
        assert_eq!(record.abstract_text, "");
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf_and_missing_files() {
        let h = harness(Setup::default()).await;
        let txt = h.dir.path().join("notes.txt");
        std::fs::write(&txt, "x").expect("write");
        assert!(matches!(
            h.service.upload(&txt).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.upload(&h.dir.path().join("gone.pdf")).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn from_arxiv_inserts_then_reuses_row() {
        let h = harness(Setup {
            source: MockPaperSource::with_entry(recent_entry("2301.12345", Utc::now())),
            ..Setup::default()
        })
        .await;

        let first = h
            .service
            .from_arxiv("https://arxiv.org/abs/2301.12345v2")
            .await
            .expect("insert");
        assert_eq!(first.source_type, SourceType::Arxiv);
        assert_eq!(first.arxiv_id, "2301.12345");
        assert_eq!(first.title, "Paper 2301.12345");

        let second = h.service.from_arxiv("2301.12345").await.expect("existing");
        assert_eq!(second, first);
        assert_eq!(h.service.list(10, 0).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn known_arxiv_paper_is_returned_while_arxiv_is_down() {
        let h = harness(Setup {
            source: MockPaperSource {
                download_fails: true,
                ..MockPaperSource::default()
            },
            ..Setup::default()
        })
        .await;
        let mut known = PaperRecord::new("30da9a999f4a", SourceType::Arxiv, "/papers/2301.12345.pdf");
        known.arxiv_id = "2301.12345".into();
        known.title = "Stored title".into();
        h.service.parts.store.insert_paper(&known).await.expect("insert");

        let found = h
            .service
            .from_arxiv("https://arxiv.org/pdf/2301.12345")
            .await
            .expect("no network needed");
        assert_eq!(found, known);

        assert!(matches!(
            h.service.refresh_arxiv("2301.12345").await,
            Err(ServiceError::Arxiv(_))
        ));
    }

    #[tokio::test]
    async fn refresh_arxiv_updates_metadata_in_place() {
        let h = harness(Setup {
            source: MockPaperSource::with_entry(recent_entry("2301.12345", Utc::now())),
            ..Setup::default()
        })
        .await;
        let mut known = PaperRecord::new("p-known", SourceType::Arxiv, "/old/2301.12345.pdf");
        known.arxiv_id = "2301.12345".into();
        known.title = "Stale title".into();
        h.service.parts.store.insert_paper(&known).await.expect("insert");

        let refreshed = h.service.refresh_arxiv("2301.12345").await.expect("refresh");
        assert_eq!(refreshed.paper_id, "p-known");
        assert_eq!(refreshed.title, "Paper 2301.12345");
    }

    #[tokio::test]
    async fn from_arxiv_rejects_garbage() {
        let h = harness(Setup::default()).await;
        assert!(matches!(
            h.service.from_arxiv("not an id").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn interpret_task_succeeds_with_summary() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");

        let task_id = h.service.trigger_interpret(&paper.paper_id).await.expect("trigger");
        let record = h.wait(&task_id).await;

        assert_eq!(record.status, TaskStatus::Success, "{:?}", record.error);
        let result = record.result.expect("summary");
        assert_eq!(result["paper_id"], paper.paper_id.as_str());
        assert_eq!(result["is_placeholder"], false);
        assert!(result["podcast_audio_path"].as_str().expect("path").ends_with(".mp3"));
        let stored = std::fs::read_to_string(result["interpretation_path"].as_str().expect("path"))
            .expect("interpretation written");
        assert_eq!(stored, "# Interpretation");
    }

    #[tokio::test]
    async fn interpret_fails_when_pdf_is_gone() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");
        std::fs::remove_file(&paper.source_path_or_url).expect("remove");

        let task_id = h.service.trigger_interpret(&paper.paper_id).await.expect("trigger");
        let record = h.wait(&task_id).await;
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("PDF file missing"));
    }

    #[tokio::test]
    async fn unknown_paper_is_not_found() {
        let h = harness(Setup::default()).await;
        assert!(matches!(
            h.service.trigger_interpret("nope").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            h.service.trigger_podcast("nope").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            h.service.related("nope").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            h.service.poll_task("nope").await,
            Err(ServiceError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn podcast_needs_stored_interpretation() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");

        let task_id = h.service.trigger_podcast(&paper.paper_id).await.expect("trigger");
        let record = h.wait(&task_id).await;
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(
            record.error.as_deref(),
            Some("interpretation missing, run interpret first")
        );
    }

    #[tokio::test]
    async fn placeholder_podcast_is_flagged_success() {
        let h = harness(Setup {
            synthesizer: Arc::new(MockSynthesizer::placeholder()),
            ..Setup::default()
        })
        .await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");
        h.service
            .parts
            .artifacts
            .write_interpretation(&paper.paper_id, "# Stored")
            .await
            .expect("write");

        let task_id = h.service.trigger_podcast(&paper.paper_id).await.expect("trigger");
        let record = h.wait(&task_id).await;
        assert_eq!(record.status, TaskStatus::Success);
        let result = record.result.expect("summary");
        assert_eq!(result["is_placeholder"], true);
        assert!(result["podcast_audio_path"].as_str().expect("path").ends_with(".txt"));
    }

    #[tokio::test]
    async fn existing_audio_blocks_podcast_but_placeholder_does_not() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");
        let podcasts = &h.service.parts.artifacts.layout().podcasts_dir;

        std::fs::write(podcasts.join(format!("{}.txt", paper.paper_id)), "script").expect("write");
        let task_id = h.service.trigger_podcast(&paper.paper_id).await.expect("placeholder only");
        h.wait(&task_id).await;

        std::fs::write(podcasts.join(format!("{}.mp3", paper.paper_id)), b"ID3").expect("write");
        assert!(matches!(
            h.service.trigger_podcast(&paper.paper_id).await,
            Err(ServiceError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn related_uses_stored_metadata() {
        let source = MockPaperSource::with_hits(vec![recent_entry("2402.00001", Utc::now())]);
        let h = harness(Setup {
            source,
            ..Setup::default()
        })
        .await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");

        let related = h.service.related(&paper.paper_id).await.expect("related");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].arxiv_id, "2402.00001v1");
    }

    #[tokio::test]
    async fn related_surfaces_search_failure() {
        let h = harness(Setup {
            source: MockPaperSource {
                search_fails: true,
                ..MockPaperSource::default()
            },
            ..Setup::default()
        })
        .await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");
        assert!(matches!(
            h.service.related(&paper.paper_id).await,
            Err(ServiceError::Pipeline(_))
        ));
    }

    #[tokio::test]
    async fn get_paper_returns_stored_row() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");
        assert_eq!(h.service.get_paper(&paper.paper_id).await.expect("get"), paper);
        assert!(matches!(
            h.service.get_paper("nope").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn interpretation_reads_through_pointer() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");
        assert!(matches!(
            h.service.interpretation(&paper.paper_id).await,
            Err(ServiceError::NoInterpretation(_))
        ));

        let task_id = h.service.trigger_interpret(&paper.paper_id).await.expect("trigger");
        h.wait(&task_id).await;
        assert_eq!(
            h.service.interpretation(&paper.paper_id).await.expect("read"),
            "# Interpretation"
        );

        std::fs::remove_file(h.service.parts.artifacts.interpretation_path(&paper.paper_id))
            .expect("remove");
        assert!(matches!(
            h.service.interpretation(&paper.paper_id).await,
            Err(ServiceError::ArtifactMissing(_))
        ));
    }

    #[tokio::test]
    async fn podcast_lookup_separates_audio_from_placeholder() {
        let h = harness(Setup::default()).await;
        let store = &h.service.parts.store;
        let podcasts = h.service.parts.artifacts.layout().podcasts_dir.clone();
        assert!(matches!(
            h.service.podcast("p1").await,
            Err(ServiceError::NoPodcast(_))
        ));

        let script = podcasts.join("p1.txt");
        std::fs::write(&script, "script").expect("write");
        store
            .upsert_audio_pointer("p1", &script.to_string_lossy(), 0.0)
            .await
            .expect("pointer");
        assert!(matches!(
            h.service.podcast("p1").await,
            Err(ServiceError::PlaceholderOnly { .. })
        ));

        // Audio pointer whose file is gone but whose script survived.
        let mp3 = podcasts.join("p1.mp3");
        store
            .upsert_audio_pointer("p1", &mp3.to_string_lossy(), 30.0)
            .await
            .expect("pointer");
        assert!(matches!(
            h.service.podcast("p1").await,
            Err(ServiceError::PlaceholderOnly { .. })
        ));

        std::fs::write(&mp3, b"ID3").expect("write");
        let audio = h.service.podcast("p1").await.expect("audio");
        assert_eq!(audio.path, mp3);
        assert_eq!(audio.media_type, "audio/mpeg");
        assert_eq!(audio.duration_secs, 30.0);

        std::fs::remove_file(&mp3).expect("remove");
        std::fs::remove_file(&script).expect("remove");
        assert!(matches!(
            h.service.podcast("p1").await,
            Err(ServiceError::ArtifactMissing(_))
        ));
    }

    #[tokio::test]
    async fn delete_refuses_a_claimed_paper() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");

        let claim = h.service.runner.claim(&paper.paper_id).expect("claim");
        assert!(matches!(
            h.service.delete(&paper.paper_id).await,
            Err(ServiceError::Task(TaskError::PaperBusy(_)))
        ));
        drop(claim);

        h.service.delete(&paper.paper_id).await.expect("delete");
        assert!(!h.service.runner.is_busy(&paper.paper_id));
    }

    #[tokio::test]
    async fn delete_removes_row_and_files() {
        let h = harness(Setup::default()).await;
        let paper = h.service.upload(&h.pdf("p.pdf")).await.expect("upload");

        h.service.delete(&paper.paper_id).await.expect("delete");
        assert!(!Path::new(&paper.source_path_or_url).exists());
        assert!(h.service.list(10, 0).await.expect("list").is_empty());
        assert!(matches!(
            h.service.delete(&paper.paper_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn collect_adds_only_recent_unknown_papers() {
        let now = Utc::now();
        let mut source = MockPaperSource::with_hits(vec![
            recent_entry("2410.00001", now),
            recent_entry("2410.00002", now - chrono::Duration::hours(2)),
            recent_entry("2101.00003", now - chrono::Duration::days(30)),
        ]);
        source.entry = Some(recent_entry("2410.00001", now));
        let h = harness(Setup {
            source,
            ..Setup::default()
        })
        .await;

        h.service.from_arxiv("2410.00002").await.expect("already known");
        let added = h.service.collect(None).await.expect("collect");

        assert_eq!(added, 1);
        assert_eq!(h.service.list(10, 0).await.expect("list").len(), 2);
    }

    #[test]
    fn entries_without_timestamps_are_not_recent() {
        let entry = ArxivEntry::default();
        assert!(!updated_since(&entry, Utc::now()));
    }
}
