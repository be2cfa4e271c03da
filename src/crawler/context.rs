//! State shared by the worker pools of one run

use crate::config::EngineConfig;
use crate::crawler::counter::WorkCounter;
use crate::crawler::dedup::Deduplicator;
use crate::crawler::failure::{TaskError, TaskFailure};
use crate::crawler::queue::TaskQueue;
use crate::crawler::summary::RunSummary;
use crate::crawler::task::Task;
use crate::output::SinkError;
use crate::state::TaskOutcome;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Completed tasks between two progress log lines
const PROGRESS_INTERVAL: usize = 25;

#[derive(Debug, Default)]
struct RunStats {
    tasks_completed: AtomicUsize,
    records_emitted: AtomicUsize,
    duplicate_records: AtomicUsize,
    expanded: AtomicUsize,
    empty_results: AtomicUsize,
    tasks_failed: AtomicUsize,
    sink_errors: AtomicUsize,
}

impl RunStats {
    /// Counts an outcome and returns the number of completed tasks
    fn record(&self, outcome: TaskOutcome) -> usize {
        let bucket = match outcome {
            TaskOutcome::Emitted => &self.records_emitted,
            TaskOutcome::DuplicateRecord => &self.duplicate_records,
            TaskOutcome::Expanded => &self.expanded,
            TaskOutcome::Empty => &self.empty_results,
            TaskOutcome::Failed => &self.tasks_failed,
            // Abandoned tasks are never completed; they stay outstanding
            TaskOutcome::Abandoned => return self.tasks_completed.load(Ordering::Relaxed),
        };
        bucket.fetch_add(1, Ordering::Relaxed);
        self.tasks_completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Everything the fetcher and extractor workers of one run share
///
/// One context is built per run, so concurrent runs never see each other's
/// queue, seen-sets or counters.
pub(crate) struct PipelineContext {
    pub engine: EngineConfig,
    pub queue: TaskQueue,
    pub counter: Arc<WorkCounter>,
    pub in_flight: Arc<WorkCounter>,
    pub records_seen: Deduplicator,
    pub cancel: CancellationToken,
    stats: RunStats,
    failures: Mutex<Vec<TaskFailure>>,
    fatal: Mutex<Option<HarvestError>>,
}

impl PipelineContext {
    pub fn new(engine: EngineConfig, cancel: CancellationToken) -> Self {
        let counter = Arc::new(WorkCounter::new());
        let queue = TaskQueue::new(
            engine.queue_capacity,
            Arc::new(Deduplicator::new()),
            Arc::clone(&counter),
        );

        Self {
            engine,
            queue,
            counter,
            in_flight: Arc::new(WorkCounter::new()),
            records_seen: Deduplicator::new(),
            cancel,
            stats: RunStats::default(),
            failures: Mutex::new(Vec::new()),
            fatal: Mutex::new(None),
        }
    }

    /// Marks a task complete after all of its effects are committed
    pub fn complete(&self, task: &Task, outcome: TaskOutcome) {
        let completed = self.stats.record(outcome);

        match self.counter.decrement() {
            Ok(outstanding) => {
                tracing::debug!("{} {} -> {}", task.kind(), task.identity(), outcome);
                if completed % PROGRESS_INTERVAL == 0 {
                    tracing::info!(
                        "Progress: {} tasks completed, {} outstanding, {} queued, {} records emitted",
                        completed,
                        outstanding,
                        self.queue.len(),
                        RunStats::get(&self.stats.records_emitted)
                    );
                }
            }
            Err(e) => self.abort(e),
        }
    }

    /// Records a terminal task failure and completes the task
    pub fn fail(&self, task: &Task, error: TaskError, attempts: u32) {
        tracing::warn!(
            "Task {} failed after {} attempt(s): {}",
            task.reference(),
            attempts,
            error
        );
        self.lock_failures()
            .push(TaskFailure::new(task, &error, attempts));
        self.complete(task, TaskOutcome::Failed);
    }

    /// Counts a sink error, aborting the run if sink errors are fatal
    pub fn sink_error(&self, identity: &str, error: SinkError) {
        self.stats.sink_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Sink rejected record {}: {}", identity, error);

        if self.engine.sink_errors_fatal {
            self.abort(HarvestError::Sink(error));
        }
    }

    /// Stops the run because of a process-fatal error
    ///
    /// The first error wins; later ones are only logged.
    pub fn abort(&self, error: HarvestError) {
        tracing::error!("Aborting run: {}", error);
        {
            let mut fatal = self.fatal.lock().unwrap_or_else(|p| p.into_inner());
            if fatal.is_none() {
                *fatal = Some(error);
            }
        }
        self.cancel.cancel();
    }

    pub fn take_fatal(&self) -> Option<HarvestError> {
        self.fatal.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    pub fn summary(&self, started_at: DateTime<Utc>, cancelled: bool) -> RunSummary {
        let stats = &self.stats;
        RunSummary {
            records_emitted: RunStats::get(&stats.records_emitted),
            tasks_failed: RunStats::get(&stats.tasks_failed),
            duplicate_tasks: self.queue.duplicates(),
            duplicate_records: RunStats::get(&stats.duplicate_records),
            empty_results: RunStats::get(&stats.empty_results),
            tasks_expanded: RunStats::get(&stats.expanded),
            sink_errors: RunStats::get(&stats.sink_errors),
            tasks_completed: RunStats::get(&stats.tasks_completed),
            tasks_abandoned: self.counter.get(),
            cancelled,
            failures: self.lock_failures().clone(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, Vec<TaskFailure>> {
        self.failures.lock().unwrap_or_else(|p| p.into_inner())
    }
}
