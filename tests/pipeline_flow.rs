//! End-to-end pipeline runs through the public API with deterministic
//! collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use paper_axon::arxiv::{ArxivEntry, ArxivError, PaperSource};
use paper_axon::config::{AppConfig, DataLayout, TtsConfig};
use paper_axon::extract::{ExtractError, TextExtractor};
use paper_axon::llm::{LlmError, Summarizer};
use paper_axon::pipeline::{
    Collaborators, Extraction, PaperInput, PipelineEngine, PipelineMode, StageResult,
};
use paper_axon::service::PaperService;
use paper_axon::storage::{connect_in_memory, ArtifactStore, PaperStore, SqliteStore};
use paper_axon::tasks::{SqliteTaskRegistry, TaskStatus};
use paper_axon::tts::{ArtifactKind, DashScopeSynthesizer, SynthesisOutput, Synthesizer};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FixedExtractor;

impl TextExtractor for FixedExtractor {
    fn extract(&self, _path: &Path) -> Result<Extraction, ExtractError> {
        Ok(Extraction {
            title: "On the History of Entropy".into(),
            abstract_text: "We trace the concept of entropy.".into(),
            sections: vec!["1 Introduction".into(), "2 Clausius".into()],
            raw_text: "Full text of the paper.".into(),
            ..Extraction::default()
        })
    }
}

/// arXiv stand-in whose downloads can be made to fail.
#[derive(Default)]
struct FakeArxiv {
    download_fails: bool,
    searches: AtomicUsize,
}

#[async_trait]
impl PaperSource for FakeArxiv {
    async fn fetch_and_download(
        &self,
        arxiv_id: &str,
    ) -> Result<(ArxivEntry, PathBuf), ArxivError> {
        if self.download_fails {
            return Err(ArxivError::Network("download timed out".into()));
        }
        let entry = ArxivEntry {
            entry_id: format!("http://arxiv.org/abs/{arxiv_id}v1"),
            title: "Authoritative title".into(),
            ..ArxivEntry::default()
        };
        Ok((entry, PathBuf::from(format!("/papers/{arxiv_id}.pdf"))))
    }

    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<ArxivEntry>, ArxivError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn list_recent(&self, _category: &str, _max: usize) -> Result<Vec<ArxivEntry>, ArxivError> {
        Ok(Vec::new())
    }
}

struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, extraction: &Extraction) -> Result<String, LlmError> {
        Ok(format!("# {}\n\nInterpretation.", extraction.title))
    }

    async fn scriptify(&self, interpretation: &str) -> Result<String, LlmError> {
        Ok(format!("Welcome. {interpretation}"))
    }
}

/// Reports an MP3 without touching the filesystem and counts calls.
#[derive(Default)]
struct CountingSynthesizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Synthesizer for CountingSynthesizer {
    async fn synthesize(&self, _text: &str, output: &Path) -> SynthesisOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SynthesisOutput {
            path: output.with_extension("mp3"),
            duration_secs: 42.0,
            kind: ArtifactKind::Audio,
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct World {
    dir: TempDir,
    parts: Collaborators,
    synthesizer: Arc<CountingSynthesizer>,
    source: Arc<FakeArxiv>,
    store: Arc<SqliteStore>,
}

async fn world_with(source: FakeArxiv) -> World {
    let dir = tempfile::tempdir().expect("temp dir");
    let layout = DataLayout::new(dir.path());
    layout.ensure_dirs().expect("dirs");

    let store = Arc::new(SqliteStore::new(connect_in_memory().await.expect("pool")));
    let synthesizer = Arc::new(CountingSynthesizer::default());
    let source = Arc::new(source);
    let parts = Collaborators {
        extractor: Arc::new(FixedExtractor),
        source: source.clone(),
        summarizer: Arc::new(EchoSummarizer),
        synthesizer: synthesizer.clone(),
        store: store.clone(),
        artifacts: ArtifactStore::new(layout),
    };
    World {
        dir,
        parts,
        synthesizer,
        source,
        store,
    }
}

async fn world() -> World {
    world_with(FakeArxiv::default()).await
}

impl World {
    fn engine(&self) -> PipelineEngine {
        PipelineEngine::new(self.parts.clone())
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interpret_from_local_pdf_completes() {
    let w = world().await;
    let initial = StageResult::new(PipelineMode::Interpret)
        .with_paper_id("p1")
        .with_input(PaperInput::local("p.pdf"));

    let out = w.engine().run(initial).await;

    assert_eq!(out.error, None);
    assert_eq!(
        out.extraction.as_ref().map(|x| x.title.as_str()),
        Some("On the History of Entropy")
    );
    assert!(out.interpretation().is_some());
    assert!(out.memory_updated);
    assert!(out.podcast_audio_path.as_deref().is_some_and(|p| p.ends_with("p1.mp3")));

    let pointer = w
        .store
        .get_audio_pointer("p1")
        .await
        .expect("read")
        .expect("audio pointer");
    assert_eq!(pointer.duration_secs, 42.0);
    assert!(w.store.get_interpretation_pointer("p1").await.expect("read").is_some());
}

#[tokio::test]
async fn related_only_without_any_metadata_is_empty() {
    let w = world().await;
    let out = w
        .engine()
        .run(StageResult::new(PipelineMode::RelatedOnly).with_paper_id("abc123"))
        .await;

    assert_eq!(out.related_papers, Some(Vec::new()));
    assert_eq!(out.error, None);
    assert_eq!(w.source.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn podcast_only_with_empty_interpretation_does_nothing() {
    let w = world().await;
    let initial = StageResult::new(PipelineMode::PodcastOnly)
        .with_paper_id("p1")
        .with_interpretation("");

    let out = w.engine().run(initial.clone()).await;

    assert_eq!(out, initial);
    assert_eq!(w.synthesizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn arxiv_download_failure_leaves_no_extraction() {
    let w = world_with(FakeArxiv {
        download_fails: true,
        ..FakeArxiv::default()
    })
    .await;
    let initial = StageResult::new(PipelineMode::Interpret)
        .with_paper_id("p1")
        .with_input(PaperInput::arxiv("1706.03762"));

    let out = w.engine().run(initial).await;

    assert!(out.error.as_deref().is_some_and(|e| e.contains("download timed out")));
    assert_eq!(out.extraction, None);
    assert!(!out.memory_updated);
}

#[tokio::test]
async fn arxiv_metadata_overrides_heuristic_title() {
    let w = world().await;
    let out = w
        .engine()
        .run(
            StageResult::new(PipelineMode::Interpret)
                .with_paper_id("p1")
                .with_input(PaperInput::arxiv("1706.03762")),
        )
        .await;

    assert_eq!(out.error, None);
    let extraction = out.extraction.expect("extraction");
    assert_eq!(extraction.title, "Authoritative title");
    assert_eq!(extraction.raw_text, "Full text of the paper.");
}

#[tokio::test]
async fn persist_write_failure_keeps_memory_unset() {
    let mut w = world().await;
    // A regular file where the interpretations directory should be.
    let blocked = w.dir.path().join("blocked");
    std::fs::write(&blocked, "not a dir").expect("write");
    let mut layout = w.parts.artifacts.layout().clone();
    layout.interpretations_dir = blocked;
    w.parts.artifacts = ArtifactStore::new(layout);

    let out = w
        .engine()
        .run(
            StageResult::new(PipelineMode::Interpret)
                .with_paper_id("p1")
                .with_input(PaperInput::local("p.pdf")),
        )
        .await;

    assert!(out.has_error());
    assert!(!out.memory_updated);
    assert_eq!(w.synthesizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn complete_result_is_a_fixed_point() {
    let w = world().await;
    let engine = w.engine();
    let first = engine
        .run(
            StageResult::new(PipelineMode::FullPipeline)
                .with_paper_id("p1")
                .with_input(PaperInput::local("p.pdf")),
        )
        .await;
    let second = engine.run(first.clone()).await;

    assert_eq!(first, second);
    assert_eq!(w.synthesizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_synthesis_backend_degrades_to_placeholder() {
    let dir = tempfile::tempdir().expect("temp dir");
    let synthesizer = DashScopeSynthesizer::from_config(&TtsConfig {
        endpoint: "http://127.0.0.1:1/synthesis".into(),
        api_key: Some("test-key".into()),
        timeout_secs: 2,
        ..TtsConfig::default()
    });

    let output = synthesizer
        .synthesize("Hello listeners.", &dir.path().join("p1.mp3"))
        .await;

    assert!(output.is_placeholder());
    assert_eq!(output.duration_secs, 0.0);
    assert_eq!(output.path, dir.path().join("p1.txt"));
    assert_eq!(
        std::fs::read_to_string(&output.path).expect("placeholder"),
        "Hello listeners."
    );
}

#[tokio::test]
async fn service_task_reports_success_summary() {
    let w = world().await;
    let registry = Arc::new(SqliteTaskRegistry::new(connect_in_memory().await.expect("pool")));
    let service = PaperService::with_parts(w.parts.clone(), registry, &AppConfig::default());

    let pdf = w.dir.path().join("entropy.pdf");
    std::fs::write(&pdf, b"%PDF-1.4").expect("write");
    let paper = service.upload(&pdf).await.expect("upload");

    let task_id = service.trigger_interpret(&paper.paper_id).await.expect("submit");
    let record = service
        .wait_task(&task_id, Duration::from_millis(10), Duration::from_secs(5))
        .await
        .expect("finished");

    assert_eq!(record.status, TaskStatus::Success, "{:?}", record.error);
    let summary = record.result.expect("summary");
    assert_eq!(summary["paper_id"], paper.paper_id.as_str());
    assert_eq!(summary["is_placeholder"], false);
}
