//! [`PaperSource`] trait and the arXiv API implementation.
//!
//! All connection details come from [`ArxivConfig`]; downloaded PDFs land in
//! the `papers/` directory handed to [`ArxivClient::new`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::arxiv::feed::{parse_feed, ArxivEntry};
use crate::config::ArxivConfig;

// ---------------------------------------------------------------------------
// ArxivError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArxivError {
    /// The identifier does not resolve to a paper.
    #[error("arXiv ID not found: {0}")]
    NotFound(String),

    /// Transport failure or non-success HTTP status.
    #[error("arXiv request failed: {0}")]
    Network(String),

    /// The response body was not a usable Atom feed.
    #[error("arXiv response could not be parsed: {0}")]
    Parse(String),

    /// The downloaded PDF could not be written.
    #[error("failed to store PDF: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ArxivError {
    fn from(e: reqwest::Error) -> Self {
        ArxivError::Network(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// PaperSource trait
// ---------------------------------------------------------------------------

/// Async interface to a remote paper repository.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Resolve `arxiv_id`, download its PDF, and return the metadata with
    /// the local file path.
    async fn fetch_and_download(&self, arxiv_id: &str)
        -> Result<(ArxivEntry, PathBuf), ArxivError>;

    /// Free-text search, best matches first.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<ArxivEntry>, ArxivError>;

    /// Most recently updated entries in `category`, newest first.
    async fn list_recent(&self, category: &str, max_results: usize)
        -> Result<Vec<ArxivEntry>, ArxivError>;
}

// ---------------------------------------------------------------------------
// ArxivClient
// ---------------------------------------------------------------------------

/// Talks to the arXiv Atom query API and `arxiv.org/pdf`.
pub struct ArxivClient {
    client: reqwest::Client,
    download_timeout: Duration,
    api_url: String,
    papers_dir: PathBuf,
}

impl ArxivClient {
    /// Build a client from config.  A default client is used if the builder
    /// fails.
    pub fn new(config: &ArxivConfig, papers_dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("paper-axon/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            api_url: config.api_url.clone(),
            papers_dir: papers_dir.into(),
        }
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Vec<ArxivEntry>, ArxivError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_feed(&body)
    }

    /// Destination for a downloaded PDF; old-style ids contain a `/`.
    fn pdf_path(&self, arxiv_id: &str) -> PathBuf {
        self.papers_dir
            .join(format!("{}.pdf", arxiv_id.replace('/', "_")))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ArxivError> {
        let bytes = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        log::debug!("arxiv: downloaded {} bytes → {}", bytes.len(), dest.display());
        Ok(())
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn fetch_and_download(
        &self,
        arxiv_id: &str,
    ) -> Result<(ArxivEntry, PathBuf), ArxivError> {
        let entries = self
            .query(&[("id_list", arxiv_id.to_string()), ("max_results", "1".into())])
            .await
            .map_err(|e| match e {
                ArxivError::Parse(_) => ArxivError::NotFound(arxiv_id.to_string()),
                other => other,
            })?;

        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| ArxivError::NotFound(arxiv_id.to_string()))?;

        let dest = self.pdf_path(arxiv_id);
        self.download(&entry.pdf_url(), &dest).await?;
        Ok((entry, dest))
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ArxivEntry>, ArxivError> {
        self.query(&[
            ("search_query", query.to_string()),
            ("start", "0".into()),
            ("max_results", max_results.to_string()),
        ])
        .await
    }

    async fn list_recent(
        &self,
        category: &str,
        max_results: usize,
    ) -> Result<Vec<ArxivEntry>, ArxivError> {
        self.query(&[
            ("search_query", format!("cat:{category}")),
            ("sortBy", "lastUpdatedDate".into()),
            ("sortOrder", "descending".into()),
            ("max_results", max_results.to_string()),
        ])
        .await
    }
}

// ---------------------------------------------------------------------------
// MockPaperSource  (test-only)
// ---------------------------------------------------------------------------

/// In-memory paper source.  Records every search query it receives.
#[cfg(test)]
#[derive(Default)]
pub struct MockPaperSource {
    pub entry: Option<ArxivEntry>,
    pub download_fails: bool,
    pub hits: Vec<ArxivEntry>,
    pub search_fails: bool,
    pub queries: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockPaperSource {
    pub fn with_entry(entry: ArxivEntry) -> Self {
        Self {
            entry: Some(entry),
            ..Self::default()
        }
    }

    pub fn with_hits(hits: Vec<ArxivEntry>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl PaperSource for MockPaperSource {
    async fn fetch_and_download(
        &self,
        arxiv_id: &str,
    ) -> Result<(ArxivEntry, PathBuf), ArxivError> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| ArxivError::NotFound(arxiv_id.to_string()))?;
        if self.download_fails {
            return Err(ArxivError::Network("PDF download timed out".into()));
        }
        Ok((entry, PathBuf::from(format!("/papers/{arxiv_id}.pdf"))))
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ArxivEntry>, ArxivError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        if self.search_fails {
            return Err(ArxivError::Network("connection reset".into()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    async fn list_recent(
        &self,
        _category: &str,
        max_results: usize,
    ) -> Result<Vec<ArxivEntry>, ArxivError> {
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
