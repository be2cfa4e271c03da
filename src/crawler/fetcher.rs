//! Fetcher pool workers
//!
//! Each worker loops: dequeue a task, fetch it with a per-attempt timeout,
//! retry transient errors with exponential backoff, then either hand the
//! document to the extractors or record the task as failed. The handoff is a
//! bounded channel, so a slow extractor pool holds the fetchers back.

use crate::crawler::context::PipelineContext;
use crate::crawler::counter::InFlightGuard;
use crate::crawler::failure::TaskError;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::task::{Document, Task};
use crate::crawler::transport::{FetchError, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A fetched task on its way to the extractor pool
pub(crate) struct Fetched {
    pub task: Task,
    pub document: Document,
    /// Keeps the task counted as in flight until extraction completes it
    pub in_flight: InFlightGuard,
}

enum Attempted {
    Fetched(Document),
    Failed(TaskError, u32),
    Cancelled,
}

pub(crate) async fn run_fetcher(
    id: usize,
    ctx: Arc<PipelineContext>,
    transport: Arc<dyn Transport>,
    handoff: mpsc::Sender<Fetched>,
) {
    let policy = RetryPolicy::from_engine(&ctx.engine);
    tracing::debug!("Fetcher {} started", id);

    loop {
        let task = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            task = ctx.queue.dequeue() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let in_flight = ctx.in_flight.enter();

        match fetch_with_retry(&ctx, transport.as_ref(), &task, &policy).await {
            Attempted::Fetched(document) => {
                let fetched = Fetched {
                    task,
                    document,
                    in_flight,
                };
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => break,
                    sent = handoff.send(fetched) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Attempted::Failed(error, attempts) => ctx.fail(&task, error, attempts),
            Attempted::Cancelled => break,
        }
    }

    tracing::debug!("Fetcher {} stopped", id);
}

async fn fetch_with_retry(
    ctx: &PipelineContext,
    transport: &dyn Transport,
    task: &Task,
    policy: &RetryPolicy,
) -> Attempted {
    let timeout = ctx.engine.per_task_timeout();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(timeout, transport.fetch(task.reference())).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };

        match result {
            Ok(document) => return Attempted::Fetched(document),
            Err(error) if error.is_transient() && attempt < policy.max_attempts() => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    "Attempt {} for {} failed ({}), retrying in {:?}",
                    attempt,
                    task.reference(),
                    error,
                    delay
                );
                tokio::select! {
                    _ = ctx.cancel.cancelled() => return Attempted::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(error) => return Attempted::Failed(TaskError::from(error), attempt),
        }
    }
}
