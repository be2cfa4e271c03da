//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::{Record, RunSummary, TaskFailure};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, records_emitted, \
     tasks_completed, tasks_failed, duplicates_dropped, sink_errors, tasks_abandoned";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        records_emitted: row.get::<_, i64>(5)? as u64,
        tasks_completed: row.get::<_, i64>(6)? as u64,
        tasks_failed: row.get::<_, i64>(7)? as u64,
        duplicates_dropped: row.get::<_, i64>(8)? as u64,
        sink_errors: row.get::<_, i64>(9)? as u64,
        tasks_abandoned: row.get::<_, i64>(10)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64, summary: &RunSummary) -> StorageResult<()> {
        let status = if summary.cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, records_emitted = ?3,
                tasks_completed = ?4, tasks_failed = ?5, duplicates_dropped = ?6,
                sink_errors = ?7, tasks_abandoned = ?8
             WHERE id = ?9",
            params![
                status.to_db_string(),
                summary.finished_at.to_rfc3339(),
                summary.records_emitted as i64,
                summary.tasks_completed as i64,
                summary.tasks_failed as i64,
                summary.duplicates_dropped() as i64,
                summary.sink_errors as i64,
                summary.tasks_abandoned as i64,
                run_id,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Records =====

    fn insert_records(&mut self, run_id: i64, records: &[Record]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO records (run_id, identity, source, fields, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let fields = serde_json::to_string(&record.fields)?;
                written += stmt.execute(params![
                    run_id,
                    record.identity,
                    record.source,
                    fields,
                    record.created_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn get_records(&self, run_id: i64) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity, source, fields, created_at FROM records
             WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (identity, source, fields, created_at) in rows {
            let fields: Map<String, Value> = serde_json::from_str(&fields)?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            records.push(Record {
                identity,
                source,
                fields,
                created_at,
            });
        }
        Ok(records)
    }

    fn count_records(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Failures =====

    fn insert_failures(&mut self, run_id: i64, failures: &[TaskFailure]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO task_failures
                    (run_id, identity, reference, task_kind, error_kind, message, attempts, failed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for failure in failures {
                stmt.execute(params![
                    run_id,
                    failure.identity,
                    failure.reference,
                    failure.kind.as_str(),
                    failure.error_kind,
                    failure.message,
                    failure.attempts,
                    failure.failed_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_failure_summary(&self, run_id: i64) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_kind, COUNT(*) FROM task_failures WHERE run_id = ?1 GROUP BY error_kind",
        )?;

        let mut summary = BTreeMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            summary.insert(kind, count as u64);
        }
        Ok(summary)
    }
}
