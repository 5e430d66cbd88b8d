//! Summarization collaborator: paper interpretation and podcast scripts.
//!
//! This module provides:
//! * [`Summarizer`] — async trait implemented by all LLM backends.
//! * [`ApiSummarizer`] — OpenAI-compatible REST implementation.
//! * [`PromptBuilder`] — builds Chinese/English interpretation and script prompts.
//! * [`LlmError`] — error variants for LLM operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use paper_axon::config::AppConfig;
//! use paper_axon::llm::{ApiSummarizer, Summarizer};
//! use paper_axon::pipeline::Extraction;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default().with_env_overrides();
//!     let summarizer = ApiSummarizer::from_config(&config.llm);
//!
//!     let extraction = Extraction {
//!         title: "Attention Is All You Need".into(),
//!         ..Extraction::default()
//!     };
//!     let report = summarizer.summarize(&extraction).await.unwrap();
//!     let script = summarizer.scriptify(&report).await.unwrap();
//!     println!("{script}");
//! }
//! ```

pub mod prompt;
pub mod summarizer;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use prompt::PromptBuilder;
pub use summarizer::{ApiSummarizer, LlmError, Summarizer};

#[cfg(test)]
pub use summarizer::MockSummarizer;
