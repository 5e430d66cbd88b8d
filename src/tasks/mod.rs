//! Background task execution with durable status records.
//!
//! This module provides:
//! * [`TaskRegistry`] — async trait over task records.
//! * [`SqliteTaskRegistry`] — `sqlx` implementation sharing the paper database.
//! * [`TaskRunner`] — bounded worker pool with one task per paper at a time.
//! * [`TaskStatus`] / [`TaskKind`] / [`TaskRecord`] — the record model.

pub mod registry;
pub mod runner;

pub use registry::{
    new_task_id, RegistryError, SqliteTaskRegistry, TaskKind, TaskRecord, TaskRegistry, TaskStatus,
};
pub use runner::{PaperClaim, SubmittedTask, TaskError, TaskRunner};
