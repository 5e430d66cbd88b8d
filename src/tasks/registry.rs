//! Durable task records.
//!
//! A task is created `Pending`, moves to `Running` when a worker picks it up
//! and ends in exactly one of `Success` or `Failed`.  Terminal records are
//! never changed again; an attempt to do so is reported as
//! [`RegistryError::InvalidTransition`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use thiserror::Error;

use crate::storage::now_timestamp;

// ---------------------------------------------------------------------------
// Status & kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    /// States a record may be in for a move to `self` to be allowed.
    fn allowed_from(&self) -> &'static [TaskStatus] {
        match self {
            TaskStatus::Pending => &[],
            TaskStatus::Running => &[TaskStatus::Pending],
            TaskStatus::Success => &[TaskStatus::Running],
            TaskStatus::Failed => &[TaskStatus::Pending, TaskStatus::Running],
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        next.allowed_from().contains(self)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "success" => Ok(TaskStatus::Success),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// What a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Interpret,
    Podcast,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Interpret => "interpret",
            TaskKind::Podcast => "podcast",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interpret" => Ok(TaskKind::Interpret),
            "podcast" => Ok(TaskKind::Podcast),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Random 16-character task id.
pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
}

// ---------------------------------------------------------------------------
// TaskRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Summary payload, present only on `Success`.
    pub result: Option<serde_json::Value>,
    /// Failure message, present only on `Failed`.
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let decode = |column: &str, e: String| sqlx::Error::ColumnDecode {
            index: column.into(),
            source: e.into(),
        };
        let kind: String = row.try_get("type")?;
        let status: String = row.try_get("status")?;
        let result: Option<String> = row.try_get("result")?;
        Ok(Self {
            task_id: row.try_get("task_id")?,
            kind: kind.parse().map_err(|e| decode("type", e))?,
            status: status.parse().map_err(|e| decode("status", e))?,
            // A corrupt payload reads as absent rather than failing the poll.
            result: result.and_then(|r| serde_json::from_str(&r).ok()),
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task {task_id}: illegal transition {from} → {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// TaskRegistry trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Create a `Pending` record.
    async fn insert(&self, task_id: &str, kind: TaskKind) -> Result<TaskRecord, RegistryError>;

    /// Apply one allowed status transition.
    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), RegistryError>;

    async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, RegistryError>;
}

// ---------------------------------------------------------------------------
// SqliteTaskRegistry
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteTaskRegistry {
    pool: SqlitePool,
}

impl SqliteTaskRegistry {
    /// Wrap a pool whose schema is already initialised.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRegistry for SqliteTaskRegistry {
    async fn insert(&self, task_id: &str, kind: TaskKind) -> Result<TaskRecord, RegistryError> {
        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, type, status, result, error, created_at, updated_at)
            VALUES (?, ?, ?, NULL, NULL, ?, ?)
            "#,
        )
        .bind(task_id)
        .bind(kind.as_str())
        .bind(TaskStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(TaskRecord {
            task_id: task_id.to_string(),
            kind,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), RegistryError> {
        let allowed = status.allowed_from();
        let placeholders = vec!["?"; allowed.len().max(1)].join(", ");
        let sql = format!(
            "UPDATE tasks SET status = ?, result = ?, error = ?, updated_at = ? \
             WHERE task_id = ? AND status IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(result.map(|r| r.to_string()))
            .bind(error)
            .bind(now_timestamp())
            .bind(task_id);
        if allowed.is_empty() {
            // Nothing may move back to Pending.
            query = query.bind("");
        }
        for from in allowed {
            query = query.bind(from.as_str());
        }

        if query.execute(&self.pool).await?.rows_affected() == 1 {
            return Ok(());
        }

        match self.get(task_id).await? {
            None => Err(RegistryError::NotFound(task_id.to_string())),
            Some(record) => Err(RegistryError::InvalidTransition {
                task_id: task_id.to_string(),
                from: record.status,
                to: status,
            }),
        }
    }

    async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, RegistryError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(TaskRecord::from_row).transpose()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
