//! Statistics of stored runs and of the run just finished

use crate::crawler::RunSummary;
use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::BTreeMap;

/// Statistics of one stored run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run: RunRecord,

    /// Records actually present in the database
    pub stored_records: u64,

    /// Failure counts by error kind
    pub failures_by_kind: BTreeMap<String, u64>,
}

/// Loads statistics of the most recent run
///
/// # Returns
///
/// * `Ok(None)` - The database holds no runs yet
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<Option<RunStatistics>> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };
    let stored_records = storage.count_records(run.id)?;
    let failures_by_kind = storage.get_failure_summary(run.id)?;

    Ok(Some(RunStatistics {
        run,
        stored_records,
        failures_by_kind,
    }))
}

/// Prints statistics of a stored run to stdout
pub fn print_statistics(stats: &RunStatistics) {
    let run = &stats.run;
    println!("=== Harvest Statistics (run {}) ===\n", run.id);

    println!("Run:");
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", run.config_hash);
    println!();

    println!("Overview:");
    println!("  Records emitted: {}", run.records_emitted);
    println!("  Records stored: {}", stats.stored_records);
    println!("  Tasks completed: {}", run.tasks_completed);
    println!("  Tasks failed: {}", run.tasks_failed);
    println!("  Duplicates dropped: {}", run.duplicates_dropped);
    println!("  Sink errors: {}", run.sink_errors);
    println!("  Tasks abandoned: {}", run.tasks_abandoned);
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failures by Kind:");
        for (kind, count) in &stats.failures_by_kind {
            println!("  {}: {}", kind, count);
        }
        println!();
    }
}

/// Prints the summary of a finished run to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Complete ===\n");
    println!(
        "  Records: {} emitted, {} duplicates dropped",
        summary.records_emitted,
        summary.duplicates_dropped()
    );
    println!(
        "  Tasks: {} completed, {} failed, {} empty, {} abandoned",
        summary.tasks_completed, summary.tasks_failed, summary.empty_results, summary.tasks_abandoned
    );
    if summary.sink_errors > 0 {
        println!("  Sink errors: {}", summary.sink_errors);
    }
    println!(
        "  Duration: {:.1}s{}",
        summary.duration().num_milliseconds() as f64 / 1000.0,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
}
