//! Paper registry and artifact pointers.
//!
//! [`PaperStore`] is the persistence collaborator of the pipeline.  Pointer
//! writes are single-statement upserts keyed by `paper_id`, so each paper has
//! at most one interpretation and one audio pointer.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use thiserror::Error;

use crate::storage::schema::now_timestamp;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// How a paper entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Arxiv,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Arxiv => "arxiv",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(SourceType::Pdf),
            "arxiv" => Ok(SourceType::Arxiv),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

/// Random 12-character paper id.
pub fn new_paper_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// One row of the `papers` table.  Empty strings mean "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub paper_id: String,
    pub source_type: SourceType,
    /// Local PDF path for both source types.
    pub source_path_or_url: String,
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub arxiv_id: String,
    pub published_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PaperRecord {
    /// A new record with both timestamps set to now.
    pub fn new(paper_id: impl Into<String>, source_type: SourceType, source: impl Into<String>) -> Self {
        let now = now_timestamp();
        Self {
            paper_id: paper_id.into(),
            source_type,
            source_path_or_url: source.into(),
            title: String::new(),
            authors: String::new(),
            abstract_text: String::new(),
            arxiv_id: String::new(),
            published_at: String::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let source: String = row.try_get("source_type")?;
        let source_type = source.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
            index: "source_type".into(),
            source: e.into(),
        })?;
        Ok(Self {
            paper_id: row.try_get("paper_id")?,
            source_type,
            source_path_or_url: row.try_get("source_path_or_url")?,
            title: row.try_get("title")?,
            authors: row.try_get("authors")?,
            abstract_text: row.try_get("abstract")?,
            arxiv_id: row.try_get("arxiv_id")?,
            published_at: row.try_get("published_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Fresh metadata for an already-known arXiv paper.
#[derive(Debug, Clone, Default)]
pub struct ArxivMetadataUpdate {
    pub source_path_or_url: String,
    pub title: String,
    pub authors: String,
    pub abstract_text: String,
    pub published_at: String,
}

/// Stored title and abstract of a paper.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperMetadata {
    pub title: String,
    pub abstract_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpretationPointer {
    pub paper_id: String,
    pub content_path: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioPointer {
    pub paper_id: String,
    pub audio_path: String,
    pub duration_secs: f64,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// PaperStore trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Replace the interpretation pointer of `paper_id`.
    async fn upsert_interpretation_pointer(&self, paper_id: &str, path: &str)
        -> Result<(), StoreError>;

    /// Replace the audio pointer of `paper_id`.
    async fn upsert_audio_pointer(&self, paper_id: &str, path: &str, duration_secs: f64)
        -> Result<(), StoreError>;

    /// Title and abstract, or `None` when the paper is unknown.
    async fn get_paper_metadata(&self, paper_id: &str) -> Result<Option<PaperMetadata>, StoreError>;

    async fn insert_paper(&self, record: &PaperRecord) -> Result<(), StoreError>;

    /// Refresh an ingested arXiv paper; returns its `paper_id`, or `None`
    /// when no row has that arXiv id.
    async fn update_paper_by_arxiv_id(
        &self,
        arxiv_id: &str,
        update: &ArxivMetadataUpdate,
    ) -> Result<Option<String>, StoreError>;

    async fn get_paper(&self, paper_id: &str) -> Result<Option<PaperRecord>, StoreError>;

    async fn find_by_arxiv_id(&self, arxiv_id: &str) -> Result<Option<PaperRecord>, StoreError>;

    /// Most recently updated first.
    async fn list_papers(&self, limit: u32, offset: u32) -> Result<Vec<PaperRecord>, StoreError>;

    /// Remove the paper and both pointers.  Returns `false` if it did not exist.
    async fn delete_paper(&self, paper_id: &str) -> Result<bool, StoreError>;

    async fn get_interpretation_pointer(&self, paper_id: &str)
        -> Result<Option<InterpretationPointer>, StoreError>;

    async fn get_audio_pointer(&self, paper_id: &str) -> Result<Option<AudioPointer>, StoreError>;

    /// Append a row to the collection log.
    async fn record_collect_run(&self, category: &str, new_count: usize) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema is already initialised.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PaperStore for SqliteStore {
    async fn upsert_interpretation_pointer(
        &self,
        paper_id: &str,
        path: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO interpretations (paper_id, content_path, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(paper_id) DO UPDATE SET
                content_path = excluded.content_path,
                created_at = excluded.created_at
            "#,
        )
        .bind(paper_id)
        .bind(path)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_audio_pointer(
        &self,
        paper_id: &str,
        path: &str,
        duration_secs: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO podcasts (paper_id, audio_path, duration_sec, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(paper_id) DO UPDATE SET
                audio_path = excluded.audio_path,
                duration_sec = excluded.duration_sec,
                created_at = excluded.created_at
            "#,
        )
        .bind(paper_id)
        .bind(path)
        .bind(duration_secs)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_paper_metadata(
        &self,
        paper_id: &str,
    ) -> Result<Option<PaperMetadata>, StoreError> {
        let row = sqlx::query("SELECT title, abstract FROM papers WHERE paper_id = ?")
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(PaperMetadata {
                title: r.try_get("title")?,
                abstract_text: r.try_get("abstract")?,
            })
        })
        .transpose()
    }

    async fn insert_paper(&self, record: &PaperRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO papers (paper_id, source_type, source_path_or_url, title, authors,
                                abstract, arxiv_id, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.paper_id)
        .bind(record.source_type.as_str())
        .bind(&record.source_path_or_url)
        .bind(&record.title)
        .bind(&record.authors)
        .bind(&record.abstract_text)
        .bind(&record.arxiv_id)
        .bind(&record.published_at)
        .bind(&record.created_at)
        .bind(&record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_paper_by_arxiv_id(
        &self,
        arxiv_id: &str,
        update: &ArxivMetadataUpdate,
    ) -> Result<Option<String>, StoreError> {
        let done = sqlx::query(
            r#"
            UPDATE papers
            SET source_path_or_url = ?, title = ?, authors = ?, abstract = ?,
                published_at = ?, updated_at = ?
            WHERE arxiv_id = ?
            "#,
        )
        .bind(&update.source_path_or_url)
        .bind(&update.title)
        .bind(&update.authors)
        .bind(&update.abstract_text)
        .bind(&update.published_at)
        .bind(now_timestamp())
        .bind(arxiv_id)
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Ok(None);
        }
        let paper_id: Option<String> =
            sqlx::query_scalar("SELECT paper_id FROM papers WHERE arxiv_id = ? LIMIT 1")
                .bind(arxiv_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(paper_id)
    }

    async fn get_paper(&self, paper_id: &str) -> Result<Option<PaperRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM papers WHERE paper_id = ?")
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(PaperRecord::from_row).transpose()?)
    }

    async fn find_by_arxiv_id(&self, arxiv_id: &str) -> Result<Option<PaperRecord>, StoreError> {
        if arxiv_id.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query("SELECT * FROM papers WHERE arxiv_id = ? LIMIT 1")
            .bind(arxiv_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(PaperRecord::from_row).transpose()?)
    }

    async fn list_papers(&self, limit: u32, offset: u32) -> Result<Vec<PaperRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM papers ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(PaperRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn delete_paper(&self, paper_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM interpretations WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM podcasts WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;
        let done = sqlx::query("DELETE FROM papers WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(done.rows_affected() > 0)
    }

    async fn get_interpretation_pointer(
        &self,
        paper_id: &str,
    ) -> Result<Option<InterpretationPointer>, StoreError> {
        let row = sqlx::query("SELECT * FROM interpretations WHERE paper_id = ?")
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(InterpretationPointer {
                paper_id: r.try_get("paper_id")?,
                content_path: r.try_get("content_path")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn get_audio_pointer(&self, paper_id: &str) -> Result<Option<AudioPointer>, StoreError> {
        let row = sqlx::query("SELECT * FROM podcasts WHERE paper_id = ?")
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(AudioPointer {
                paper_id: r.try_get("paper_id")?,
                audio_path: r.try_get("audio_path")?,
                duration_secs: r.try_get("duration_sec")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn record_collect_run(&self, category: &str, new_count: usize) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO collect_logs (category, new_count, run_at) VALUES (?, ?, ?)")
            .bind(category)
            .bind(new_count as i64)
            .bind(now_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
