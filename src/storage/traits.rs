//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::{Record, RunSummary, TaskFailure};
use crate::storage::{RunRecord, RunStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every database operation needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Stores the final counters of a run and marks it finished
    ///
    /// Cancelled runs are marked interrupted, all others completed.
    fn complete_run(&mut self, run_id: i64, summary: &RunSummary) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts a batch of records in one transaction
    ///
    /// # Returns
    ///
    /// The number of records written (records already stored for this run
    /// are skipped)
    fn insert_records(&mut self, run_id: i64, records: &[Record]) -> StorageResult<usize>;

    /// Loads all records of a run in insertion order
    fn get_records(&self, run_id: i64) -> StorageResult<Vec<Record>>;

    /// Counts the records of a run
    fn count_records(&self, run_id: i64) -> StorageResult<u64>;

    // ===== Failures =====

    /// Inserts terminal task failures
    fn insert_failures(&mut self, run_id: i64, failures: &[TaskFailure]) -> StorageResult<()>;

    /// Counts failures per error kind for a run
    fn get_failure_summary(&self, run_id: i64) -> StorageResult<BTreeMap<String, u64>>;
}
