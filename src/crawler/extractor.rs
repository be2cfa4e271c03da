//! Extractor pool workers
//!
//! Extractors receive fetched documents, run the site adapter on the
//! blocking thread pool and route the result:
//! - discovered references are enqueued as new tasks
//! - a record is claimed in the record seen-set and emitted
//! - an empty page just completes
//!
//! A task is completed only after its children are enqueued or its record
//! has been handed to the sink.

use crate::adapter::{Extracted, ExtractionError, SiteAdapter};
use crate::crawler::context::PipelineContext;
use crate::crawler::fetcher::Fetched;
use crate::crawler::queue::Enqueued;
use crate::crawler::task::{Document, ExtractionResult, Task, TaskKind};
use crate::output::Sink;
use crate::state::TaskOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

pub(crate) async fn run_extractor(
    id: usize,
    ctx: Arc<PipelineContext>,
    adapter: Arc<dyn SiteAdapter>,
    sink: Arc<dyn Sink>,
    handoff: Arc<Mutex<mpsc::Receiver<Fetched>>>,
) {
    tracing::debug!("Extractor {} started", id);

    loop {
        let fetched = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            fetched = async { handoff.lock().await.recv().await } => match fetched {
                Some(fetched) => fetched,
                None => break,
            },
        };

        let Fetched {
            task,
            document,
            in_flight,
        } = fetched;

        let timeout = ctx.engine.per_task_timeout();
        match extract(Arc::clone(&adapter), task.clone(), document, timeout).await {
            Ok(result) => match route(&ctx, sink.as_ref(), &task, result).await {
                Some(outcome) => ctx.complete(&task, outcome),
                None => tracing::debug!("Abandoning {} after shutdown", task.identity()),
            },
            Err(error) => ctx.fail(&task, error.into(), 1),
        }

        drop(in_flight);
    }

    tracing::debug!("Extractor {} stopped", id);
}

/// Runs the adapter off the async workers, bounded by `timeout`
///
/// A panicking or stuck adapter becomes an extraction error for this task
/// only.
pub(crate) async fn extract(
    adapter: Arc<dyn SiteAdapter>,
    task: Task,
    document: Document,
    timeout: Duration,
) -> Result<ExtractionResult, ExtractionError> {
    let handle = tokio::task::spawn_blocking(move || classify(adapter.as_ref(), &task, &document));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ExtractionError::Panicked(join_error.to_string())),
        Err(_) => Err(ExtractionError::TimedOut(timeout)),
    }
}

fn classify(
    adapter: &dyn SiteAdapter,
    task: &Task,
    document: &Document,
) -> Result<ExtractionResult, ExtractionError> {
    if task.kind() == TaskKind::DiscoveryPage {
        let items: Vec<Task> = adapter
            .discover(document)?
            .into_iter()
            .map(Task::item)
            .collect();
        if items.is_empty() {
            return Ok(ExtractionResult::Empty);
        }
        return Ok(ExtractionResult::Tasks(items));
    }

    Ok(match adapter.extract_record(task, document)? {
        Extracted::Record(record) => ExtractionResult::Record(record),
        Extracted::References(children) if children.is_empty() => ExtractionResult::Empty,
        Extracted::References(children) => {
            ExtractionResult::Tasks(children.into_iter().map(Task::composite_child).collect())
        }
        Extracted::Empty => ExtractionResult::Empty,
    })
}

/// Applies an extraction result and returns the task's outcome
///
/// Returns `None` when the queue shut down before every child was placed;
/// the task then stays outstanding and is reported as abandoned.
async fn route(
    ctx: &PipelineContext,
    sink: &dyn Sink,
    task: &Task,
    result: ExtractionResult,
) -> Option<TaskOutcome> {
    match result {
        ExtractionResult::Record(record) => {
            if !ctx.records_seen.try_claim(&record.identity) {
                tracing::debug!("Dropping duplicate record {}", record.identity);
                return Some(TaskOutcome::DuplicateRecord);
            }

            let identity = record.identity.clone();
            if let Err(e) = sink.emit(record).await {
                ctx.sink_error(&identity, e);
            }
            Some(TaskOutcome::Emitted)
        }
        ExtractionResult::Tasks(children) => {
            let found = children.len();
            let wait = ctx.engine.discovered_overflow_wait();
            let mut added = 0;

            for child in children {
                match ctx.queue.enqueue_discovered(child, wait).await {
                    Ok(Enqueued::Added) => added += 1,
                    Ok(Enqueued::Duplicate) => {}
                    Err(_) => return None,
                }
            }

            tracing::debug!(
                "{} listed {} references ({} new)",
                task.reference(),
                found,
                added
            );
            Some(TaskOutcome::Expanded)
        }
        ExtractionResult::Empty => Some(TaskOutcome::Empty),
    }
}
