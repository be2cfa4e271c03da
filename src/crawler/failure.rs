//! Per-task failure taxonomy

use crate::adapter::ExtractionError;
use crate::crawler::task::{Task, TaskKind};
use crate::crawler::transport::FetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Why a task ended without a result
///
/// Every variant is scoped to its task; none of them stops the run.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Network, timeout or server-side failure that outlived its retries
    #[error("transient fetch error: {0}")]
    Transient(FetchError),

    /// Failure that retrying cannot fix
    #[error("permanent fetch error: {0}")]
    Permanent(FetchError),

    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
}

impl From<FetchError> for TaskError {
    fn from(error: FetchError) -> Self {
        if error.is_transient() {
            Self::Transient(error)
        } else {
            Self::Permanent(error)
        }
    }
}

impl TaskError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::Permanent(_) => "permanent",
            Self::Extraction(_) => "extraction",
        }
    }
}

/// A terminal task failure as recorded in the run summary
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub identity: String,
    pub reference: String,
    pub kind: TaskKind,
    /// `transient`, `permanent` or `extraction`
    pub error_kind: String,
    pub message: String,
    /// Fetch attempts made before giving up
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl TaskFailure {
    pub fn new(task: &Task, error: &TaskError, attempts: u32) -> Self {
        Self {
            identity: task.identity().to_string(),
            reference: task.reference().to_string(),
            kind: task.kind(),
            error_kind: error.kind().to_string(),
            message: error.to_string(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}
