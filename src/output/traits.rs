//! Sink trait and error types
//!
//! A sink receives every record the pipeline emits and, once the run is
//! over, its summary. Implementations must be thread-safe: extractors call
//! `emit` concurrently.

use crate::crawler::{Record, RunSummary};
use crate::storage::StorageError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while writing output
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The sink refused the record
    #[error("Record rejected: {0}")]
    Rejected(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination of harvested records
#[async_trait]
pub trait Sink: Send + Sync {
    /// Accepts one record
    ///
    /// Called at most once per record identity within a run.
    async fn emit(&self, record: Record) -> SinkResult<()>;

    /// Called exactly once after all workers have stopped
    async fn finish(&self, _summary: &RunSummary) -> SinkResult<()> {
        Ok(())
    }
}
