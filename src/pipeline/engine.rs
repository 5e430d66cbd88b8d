//! [`PipelineEngine`] — drives the router and the stage executors.
//!
//! ```text
//! loop:
//!   next = route(current)
//!   Done            → return current
//!   stage           → current = stage.execute(current)
//!   stage terminal  → return current
//! ```
//!
//! Each stage only adds fields the router checks for, so a valid route never
//! needs more than a handful of steps.  [`MAX_STAGE_EXECUTIONS`] turns a
//! routing bug into a failed result instead of an endless loop.

use std::sync::Arc;

use crate::arxiv::PaperSource;
use crate::extract::TextExtractor;
use crate::llm::Summarizer;
use crate::storage::{ArtifactStore, PaperStore};
use crate::tts::Synthesizer;

use super::error::StageError;
use super::router::{route, NextStage};
use super::stages::{
    ExtractStage, InterpretStage, PersistStage, RetrieveStage, StageExecutor, SynthesizeStage,
};
use super::state::StageResult;

/// Upper bound on stage executions within one run.
pub const MAX_STAGE_EXECUTIONS: usize = 10;

/// Everything the stages call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn TextExtractor>,
    pub source: Arc<dyn PaperSource>,
    pub summarizer: Arc<dyn Summarizer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub store: Arc<dyn PaperStore>,
    pub artifacts: ArtifactStore,
}

pub struct PipelineEngine {
    extract: Arc<dyn StageExecutor>,
    interpret: Arc<dyn StageExecutor>,
    persist: Arc<dyn StageExecutor>,
    synthesize: Arc<dyn StageExecutor>,
    retrieve: Arc<dyn StageExecutor>,
}

impl PipelineEngine {
    /// Engine with the production stages wired to `c`.
    pub fn new(c: Collaborators) -> Self {
        Self {
            extract: Arc::new(ExtractStage::new(c.extractor, Arc::clone(&c.source))),
            interpret: Arc::new(InterpretStage::new(Arc::clone(&c.summarizer))),
            persist: Arc::new(PersistStage::new(c.artifacts.clone(), Arc::clone(&c.store))),
            synthesize: Arc::new(SynthesizeStage::new(
                c.summarizer,
                c.synthesizer,
                c.artifacts,
                Arc::clone(&c.store),
            )),
            retrieve: Arc::new(RetrieveStage::new(c.source, c.store)),
        }
    }

    /// Engine over arbitrary executors, in router order.
    pub fn from_stages(
        extract: Arc<dyn StageExecutor>,
        interpret: Arc<dyn StageExecutor>,
        persist: Arc<dyn StageExecutor>,
        synthesize: Arc<dyn StageExecutor>,
        retrieve: Arc<dyn StageExecutor>,
    ) -> Self {
        Self {
            extract,
            interpret,
            persist,
            synthesize,
            retrieve,
        }
    }

    fn stage(&self, next: NextStage) -> Option<&dyn StageExecutor> {
        let stage = match next {
            NextStage::Extract => &self.extract,
            NextStage::Interpret => &self.interpret,
            NextStage::Persist => &self.persist,
            NextStage::Synthesize => &self.synthesize,
            NextStage::Retrieve => &self.retrieve,
            NextStage::Done => return None,
        };
        Some(stage.as_ref())
    }

    /// Run stages until the router says `Done`, a terminal stage has run, or
    /// the execution bound is hit.
    pub async fn run(&self, initial: StageResult) -> StageResult {
        let mode = initial.mode;
        let mut current = initial;

        for _ in 0..MAX_STAGE_EXECUTIONS {
            let next = route(&current);
            let Some(stage) = self.stage(next) else {
                log::debug!("pipeline: [{}] done", mode.label());
                return current;
            };

            log::debug!("pipeline: [{}] → {}", mode.label(), next.label());
            current = stage.execute(current).await;

            if let Some(err) = current.error.as_deref().filter(|e| !e.is_empty()) {
                log::info!("pipeline: [{}] {} failed: {err}", mode.label(), next.label());
                return current;
            }
            if next.is_terminal() {
                return current;
            }
        }

        if route(&current) == NextStage::Done {
            return current;
        }
        let err = StageError::IterationLimit(MAX_STAGE_EXECUTIONS);
        log::error!("pipeline: [{}] {err}", mode.label());
        current.fail(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::{Extraction, PaperInput, PipelineMode};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Applies `f` and counts calls.
    struct Scripted {
        calls: AtomicUsize,
        f: fn(StageResult) -> StageResult,
    }

    impl Scripted {
        fn new(f: fn(StageResult) -> StageResult) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                f,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StageExecutor for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn execute(&self, result: StageResult) -> StageResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if result.has_error() {
                return result;
            }
            (self.f)(result)
        }
    }

    struct Fixture {
        extract: Arc<Scripted>,
        interpret: Arc<Scripted>,
        persist: Arc<Scripted>,
        synthesize: Arc<Scripted>,
        retrieve: Arc<Scripted>,
    }

    impl Fixture {
        fn happy() -> Self {
            Self {
                extract: Scripted::new(|r| r.with_extraction(Extraction::default())),
                interpret: Scripted::new(|r| r.with_interpretation("# Report")),
                persist: Scripted::new(|mut r| {
                    r.memory_updated = true;
                    r
                }),
                synthesize: Scripted::new(|mut r| {
                    r.podcast_audio_path = Some("/podcasts/p1.mp3".into());
                    r
                }),
                retrieve: Scripted::new(|mut r| {
                    r.related_papers = Some(Vec::new());
                    r
                }),
            }
        }

        fn engine(&self) -> PipelineEngine {
            PipelineEngine::from_stages(
                self.extract.clone(),
                self.interpret.clone(),
                self.persist.clone(),
                self.synthesize.clone(),
                self.retrieve.clone(),
            )
        }

        fn calls(&self) -> [usize; 5] {
            [
                self.extract.calls(),
                self.interpret.calls(),
                self.persist.calls(),
                self.synthesize.calls(),
                self.retrieve.calls(),
            ]
        }
    }

    #[tokio::test]
    async fn interpret_runs_linear_pipeline_once_each() {
        let fx = Fixture::happy();
        let initial = StageResult::new(PipelineMode::Interpret)
            .with_paper_id("p1")
            .with_input(PaperInput::local("p.pdf"));

        let out = fx.engine().run(initial).await;

        assert_eq!(fx.calls(), [1, 1, 1, 1, 0]);
        assert!(out.has_extraction());
        assert!(out.memory_updated);
        assert_eq!(out.podcast_audio_path.as_deref(), Some("/podcasts/p1.mp3"));
        assert_eq!(out.error, None);
    }

    #[tokio::test]
    async fn completed_record_is_returned_unchanged() {
        let fx = Fixture::happy();
        let engine = fx.engine();
        let initial = StageResult::new(PipelineMode::FullPipeline)
            .with_paper_id("p1")
            .with_input(PaperInput::local("p.pdf"));

        let first = engine.run(initial).await;
        let second = engine.run(first.clone()).await;
        let third = engine.run(second.clone()).await;

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(fx.calls(), [1, 1, 1, 1, 0]);
    }

    #[tokio::test]
    async fn podcast_only_synthesizes_exactly_once() {
        let fx = Fixture::happy();
        let initial = StageResult::new(PipelineMode::PodcastOnly)
            .with_paper_id("p1")
            .with_interpretation("# Report");

        let out = fx.engine().run(initial).await;

        assert_eq!(fx.calls(), [0, 0, 0, 1, 0]);
        assert!(out.has_podcast());
    }

    #[tokio::test]
    async fn empty_interpretation_skips_synthesis() {
        let fx = Fixture::happy();
        let initial = StageResult::new(PipelineMode::PodcastOnly)
            .with_paper_id("p1")
            .with_interpretation("");

        let out = fx.engine().run(initial.clone()).await;

        assert_eq!(fx.calls(), [0, 0, 0, 0, 0]);
        assert_eq!(out, initial);
    }

    #[tokio::test]
    async fn related_only_retrieves_and_stops() {
        let fx = Fixture::happy();
        let out = fx
            .engine()
            .run(StageResult::new(PipelineMode::RelatedOnly).with_paper_id("abc123"))
            .await;

        assert_eq!(fx.calls(), [0, 0, 0, 0, 1]);
        assert_eq!(out.related_papers, Some(Vec::new()));
    }

    #[tokio::test]
    async fn stage_error_stops_the_run() {
        let fx = Fixture {
            interpret: Scripted::new(|r| r.fail("summarize failed: boom")),
            ..Fixture::happy()
        };
        let initial = StageResult::new(PipelineMode::Interpret)
            .with_paper_id("p1")
            .with_input(PaperInput::local("p.pdf"));

        let out = fx.engine().run(initial).await;

        assert_eq!(fx.calls(), [1, 1, 0, 0, 0]);
        assert_eq!(out.error.as_deref(), Some("summarize failed: boom"));
        assert!(!out.memory_updated);
    }

    #[tokio::test]
    async fn errored_input_runs_nothing() {
        let fx = Fixture::happy();
        let initial = StageResult::new(PipelineMode::Interpret)
            .with_input(PaperInput::local("p.pdf"))
            .fail("bad input");

        let out = fx.engine().run(initial.clone()).await;

        assert_eq!(fx.calls(), [0, 0, 0, 0, 0]);
        assert_eq!(out, initial);
    }

    #[tokio::test]
    async fn non_progressing_stage_hits_iteration_limit() {
        // An extractor that never produces an extraction keeps the router
        // pointing at Extract.
        let fx = Fixture {
            extract: Scripted::new(|r| r),
            ..Fixture::happy()
        };
        let initial = StageResult::new(PipelineMode::Interpret).with_input(PaperInput::local("p.pdf"));

        let out = fx.engine().run(initial).await;

        assert_eq!(fx.extract.calls(), MAX_STAGE_EXECUTIONS);
        assert_eq!(
            out.error.as_deref(),
            Some("pipeline did not finish within 10 stage executions")
        );
    }
}
