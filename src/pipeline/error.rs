//! Failure taxonomy for stage execution.
//!
//! Stages never let these escape: each one is rendered with `to_string()`
//! into [`StageResult::error`](super::StageResult), which ends the run.
//! Degraded synthesis is not an error at all; see
//! [`tts::is_placeholder_artifact`](crate::tts::is_placeholder_artifact).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    /// A required field was missing from the incoming record.
    #[error("missing {0}")]
    Precondition(&'static str),

    /// An external collaborator failed or returned unusable data.
    #[error("{stage} failed: {message}")]
    Collaborator {
        stage: &'static str,
        message: String,
    },

    /// The engine ran more stages than any valid route needs.
    #[error("pipeline did not finish within {0} stage executions")]
    IterationLimit(usize),
}

impl StageError {
    pub fn collaborator(stage: &'static str, err: impl std::fmt::Display) -> Self {
        StageError::Collaborator {
            stage,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            StageError::Precondition("interpretation").to_string(),
            "missing interpretation"
        );
        assert_eq!(
            StageError::collaborator("extract", "PDF not found: p.pdf").to_string(),
            "extract failed: PDF not found: p.pdf"
        );
        assert_eq!(
            StageError::IterationLimit(10).to_string(),
            "pipeline did not finish within 10 stage executions"
        );
    }
}
