//! Core `Summarizer` trait and `ApiSummarizer` implementation.
//!
//! `ApiSummarizer` calls any OpenAI-compatible `/chat/completions` endpoint;
//! the default points at DashScope's compatible mode.  All connection
//! details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::llm::prompt::PromptBuilder;
use crate::pipeline::Extraction;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while generating text.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport, connection or status error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Summarizer trait
// ---------------------------------------------------------------------------

/// Async trait for LLM-backed paper interpretation.
///
/// Implementors must be `Send + Sync` so they can be shared across workers
/// as `Arc<dyn Summarizer>`.  No retries happen at this layer.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Structured long-form report for an extracted paper.
    async fn summarize(&self, extraction: &Extraction) -> Result<String, LlmError>;

    /// Spoken-style podcast script for an existing report.
    async fn scriptify(&self, interpretation: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiSummarizer
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
pub struct ApiSummarizer {
    client: reqwest::Client,
    config: LlmConfig,
    prompt_builder: PromptBuilder,
}

impl ApiSummarizer {
    /// Build an `ApiSummarizer` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used if the
    /// builder fails.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            prompt_builder: PromptBuilder::new(&config.language),
            config: config.clone(),
        }
    }

    /// One chat completion.  The `Authorization: Bearer …` header is attached
    /// only when `config.api_key` is a non-empty string.
    async fn complete(
        &self,
        system_msg: String,
        user_msg: String,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": temperature
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?.error_for_status()?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LlmError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl Summarizer for ApiSummarizer {
    async fn summarize(&self, extraction: &Extraction) -> Result<String, LlmError> {
        let (system_msg, user_msg) = self.prompt_builder.interpretation(extraction);
        log::debug!(
            "llm: interpreting \"{}\" with {}",
            extraction.title,
            self.config.model
        );
        self.complete(system_msg, user_msg, self.config.temperature).await
    }

    async fn scriptify(&self, interpretation: &str) -> Result<String, LlmError> {
        let (system_msg, user_msg) = self.prompt_builder.script(interpretation);
        self.complete(system_msg, user_msg, self.config.script_temperature)
            .await
    }
}

// ---------------------------------------------------------------------------
// MockSummarizer  (test-only)
// ---------------------------------------------------------------------------

/// Canned summarizer.  Remembers the extractions it was asked to summarize.
#[cfg(test)]
pub struct MockSummarizer {
    summary: Result<String, String>,
    script: Result<String, String>,
    seen: std::sync::Mutex<Vec<Extraction>>,
}

#[cfg(test)]
impl MockSummarizer {
    pub fn ok(summary: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            summary: Ok(summary.into()),
            script: Ok(script.into()),
            seen: Default::default(),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            summary: Err(message.clone()),
            script: Err(message),
            seen: Default::default(),
        }
    }

    pub fn seen(&self) -> Vec<Extraction> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, extraction: &Extraction) -> Result<String, LlmError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(extraction.clone());
        }
        self.summary.clone().map_err(LlmError::Request)
    }

    async fn scriptify(&self, _interpretation: &str) -> Result<String, LlmError> {
        self.script.clone().map_err(LlmError::Request)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
