//! SQLite sink
//!
//! Records are buffered and written in batches; `finish` flushes the rest
//! and stores the run counters and every task failure.

use crate::crawler::{Record, RunSummary};
use crate::output::traits::{Sink, SinkError, SinkResult};
use crate::storage::{SqliteStorage, Storage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Persists records of one run into SQLite
///
/// Database writes run on the blocking pool. A batch that fails to write
/// goes back to the front of the buffer and is retried by the next flush.
pub struct SqliteSink {
    storage: Arc<Mutex<SqliteStorage>>,
    buffer: Mutex<Vec<Record>>,
    run_id: i64,
    batch_size: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl SqliteSink {
    /// Opens a new run in `storage` and returns a sink writing into it
    ///
    /// # Arguments
    ///
    /// * `storage` - The database to write into
    /// * `config_hash` - Hash of the configuration driving the run
    /// * `batch_size` - Number of records buffered before a write
    pub fn new(mut storage: SqliteStorage, config_hash: &str, batch_size: usize) -> SinkResult<Self> {
        let run_id = storage.create_run(config_hash)?;
        debug!("Opened run {} in database", run_id);
        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
            buffer: Mutex::new(Vec::with_capacity(batch_size)),
            run_id,
            batch_size: batch_size.max(1),
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs `op` against the database on the blocking pool
    async fn with_storage<T, F>(&self, op: F) -> SinkResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteStorage, i64) -> SinkResult<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let run_id = self.run_id;
        tokio::task::spawn_blocking(move || op(&mut lock(&*storage), run_id))
            .await
            .map_err(|e| SinkError::Write(format!("database writer task failed: {}", e)))?
    }

    /// Writes everything buffered so far
    async fn flush(&self) -> SinkResult<()> {
        let batch = std::mem::take(&mut *lock(&self.buffer));
        if batch.is_empty() {
            return Ok(());
        }

        let result = self
            .with_storage(move |storage, run_id| {
                let written = storage.insert_records(run_id, &batch);
                Ok((batch, written))
            })
            .await?;

        match result {
            (batch, Ok(written)) => {
                debug!("Wrote {} of {} buffered records", written, batch.len());
                Ok(())
            }
            (mut batch, Err(e)) => {
                warn!(
                    "Batch write failed, keeping {} records for the next flush: {}",
                    batch.len(),
                    e
                );
                let mut buffer = lock(&self.buffer);
                batch.append(&mut buffer);
                *buffer = batch;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn emit(&self, record: Record) -> SinkResult<()> {
        let full = {
            let mut buffer = lock(&self.buffer);
            buffer.push(record);
            buffer.len() >= self.batch_size
        };
        if full {
            self.flush().await?;
        }
        Ok(())
    }

    async fn finish(&self, summary: &RunSummary) -> SinkResult<()> {
        self.flush().await?;
        let summary = summary.clone();
        self.with_storage(move |storage, run_id| {
            storage.insert_failures(run_id, &summary.failures)?;
            storage.complete_run(run_id, &summary)?;
            Ok(())
        })
        .await
    }
}
