//! Observable outcome of a finished run

use crate::crawler::failure::TaskFailure;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counts and failures of one run, available once it reached `Done`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Records handed to the sink (including ones the sink then rejected)
    pub records_emitted: usize,

    /// Tasks that ended in a terminal failure
    pub tasks_failed: usize,

    /// Tasks dropped at enqueue because their identity was already claimed
    pub duplicate_tasks: usize,

    /// Records dropped because their identity was already emitted
    pub duplicate_records: usize,

    /// Pages recognized but carrying no data
    pub empty_results: usize,

    /// Pages whose references were enqueued as further tasks
    pub tasks_expanded: usize,

    /// Records the sink failed to accept
    pub sink_errors: usize,

    pub tasks_completed: usize,

    /// Tasks still outstanding when a cancelled run stopped
    pub tasks_abandoned: usize,

    pub cancelled: bool,

    pub failures: Vec<TaskFailure>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Creates a summary with every count at zero
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            records_emitted: 0,
            tasks_failed: 0,
            duplicate_tasks: 0,
            duplicate_records: 0,
            empty_results: 0,
            tasks_expanded: 0,
            sink_errors: 0,
            tasks_completed: 0,
            tasks_abandoned: 0,
            cancelled: false,
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    /// Duplicate tasks and duplicate records together
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicate_tasks + self.duplicate_records
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// True if every task reached a non-failure outcome
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.tasks_failed == 0 && self.tasks_abandoned == 0
    }

    /// Percentage of completed tasks that did not fail
    pub fn success_rate(&self) -> f64 {
        if self.tasks_completed == 0 {
            return 0.0;
        }
        let succeeded = self.tasks_completed - self.tasks_failed.min(self.tasks_completed);
        (succeeded as f64 / self.tasks_completed as f64) * 100.0
    }
}
