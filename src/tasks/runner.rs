//! [`TaskRunner`] — bounded background execution of pipeline jobs.
//!
//! ```text
//! submit(kind, paper_id, job)
//!   ├─ paper already in flight → Err(PaperBusy)
//!   ├─ registry.insert          → Pending
//!   └─ tokio::spawn ──▶ acquire worker permit
//!                        ├─ Running                (write fails → Failed)
//!                        ├─ tokio::spawn(job)      (isolates panics)
//!                        └─ Success(summary) │ Failed(message)
//! ```
//!
//! Submission returns as soon as the `Pending` record exists.  Every task
//! reaches exactly one terminal state, including when its job panics.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

use crate::pipeline::StageResult;

use super::registry::{new_task_id, RegistryError, TaskKind, TaskRegistry, TaskStatus};

// ---------------------------------------------------------------------------
// TaskError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TaskError {
    /// Another task for the same paper has not finished yet.
    #[error("paper {0} already has a task in progress")]
    PaperBusy(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// PaperClaim
// ---------------------------------------------------------------------------

type InFlightSet = Arc<Mutex<HashSet<String>>>;

/// Exclusive hold on a paper id.  While it lives, no task for the paper can
/// be submitted; dropping it frees the paper.
pub struct PaperClaim {
    set: InFlightSet,
    paper_id: String,
}

impl PaperClaim {
    fn acquire(set: &InFlightSet, paper_id: &str) -> Option<Self> {
        let mut papers = set.lock().unwrap_or_else(|p| p.into_inner());
        if !papers.insert(paper_id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            paper_id: paper_id.to_string(),
        })
    }
}

impl Drop for PaperClaim {
    fn drop(&mut self) {
        let mut papers = self.set.lock().unwrap_or_else(|p| p.into_inner());
        papers.remove(&self.paper_id);
    }
}

// ---------------------------------------------------------------------------
// TaskRunner
// ---------------------------------------------------------------------------

/// A task that has been accepted and recorded as `Pending`.
pub struct SubmittedTask {
    pub task_id: String,
    pub handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct TaskRunner {
    registry: Arc<dyn TaskRegistry>,
    permits: Arc<Semaphore>,
    in_flight: InFlightSet,
}

impl TaskRunner {
    /// Runner executing at most `workers` jobs at once (minimum one).
    pub fn new(registry: Arc<dyn TaskRegistry>, workers: usize) -> Self {
        Self {
            registry,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn registry(&self) -> &Arc<dyn TaskRegistry> {
        &self.registry
    }

    /// Hold `paper_id` outside of a task, e.g. while it is being deleted.
    pub fn claim(&self, paper_id: &str) -> Result<PaperClaim, TaskError> {
        PaperClaim::acquire(&self.in_flight, paper_id)
            .ok_or_else(|| TaskError::PaperBusy(paper_id.to_string()))
    }

    /// Whether `paper_id` has a pending or running task or is otherwise claimed.
    pub fn is_busy(&self, paper_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(paper_id)
    }

    /// Record a `Pending` task and schedule `job` on the worker pool.
    ///
    /// A job result without an error becomes `Success` with `summarize`'s
    /// payload; an error string is stored verbatim as the failure message.
    pub async fn submit<J, S>(
        &self,
        kind: TaskKind,
        paper_id: &str,
        job: J,
        summarize: S,
    ) -> Result<SubmittedTask, TaskError>
    where
        J: Future<Output = StageResult> + Send + 'static,
        S: FnOnce(&StageResult) -> serde_json::Value + Send + 'static,
    {
        let guard = self.claim(paper_id)?;

        let task_id = new_task_id();
        self.registry.insert(&task_id, kind).await?;
        log::info!("tasks: {task_id} → pending ({kind}, paper {paper_id})");

        let registry = Arc::clone(&self.registry);
        let permits = Arc::clone(&self.permits);
        let id = task_id.clone();

        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let message = Some("worker pool closed".to_string());
                    record(&*registry, &id, TaskStatus::Failed, None, message).await;
                    return;
                }
            };

            log::info!("tasks: {id} → running");
            if let Err(e) = registry.update_status(&id, TaskStatus::Running, None, None).await {
                drop(guard);
                let message = format!("could not mark task running: {e}");
                log::error!("tasks: {id} → failed: {message}");
                record(&*registry, &id, TaskStatus::Failed, None, Some(message)).await;
                return;
            }

            let outcome = match tokio::spawn(job).await {
                Ok(result) => match result.error.as_deref().filter(|e| !e.is_empty()) {
                    Some(err) => Err(err.to_string()),
                    None => Ok(summarize(&result)),
                },
                Err(join_err) => Err(panic_message(join_err)),
            };

            // The paper is free by the time the terminal status is visible.
            drop(guard);
            match outcome {
                Ok(payload) => {
                    log::info!("tasks: {id} → success");
                    record(&*registry, &id, TaskStatus::Success, Some(payload), None).await;
                }
                Err(message) => {
                    log::error!("tasks: {id} → failed: {message}");
                    record(&*registry, &id, TaskStatus::Failed, None, Some(message)).await;
                }
            }
        });

        Ok(SubmittedTask { task_id, handle })
    }
}

/// Registry writes from a worker have no caller to report to.
async fn record(
    registry: &dyn TaskRegistry,
    task_id: &str,
    status: TaskStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
) {
    if let Err(e) = registry.update_status(task_id, status, result, error).await {
        log::error!("tasks: {task_id} could not record {status}: {e}");
    }
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            format!("task panicked: {detail}")
        }
        Err(_) => "task cancelled".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
