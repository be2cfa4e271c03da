//! Bounded task queue shared by every pipeline stage
//!
//! The queue couples three things that must change together:
//! - claiming a task identity in the task seen-set
//! - raising the work counter for the claimed task
//! - making the task available to fetchers
//!
//! Producers block while `capacity` tasks are pending. Tasks discovered by
//! extractor workers wait only a bounded time for room and are then admitted
//! over capacity, since the extractors are also what drains the fetchers
//! feeding the queue.

use crate::crawler::counter::WorkCounter;
use crate::crawler::dedup::Deduplicator;
use crate::crawler::task::Task;
use crate::HarvestError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Returned when a task is offered to a queue that has been shut down
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("task queue is closed")]
pub struct QueueClosed;

/// Whether an offered task entered the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Added,
    /// The identity was already claimed; the work counter is unchanged
    Duplicate,
}

pub struct TaskQueue {
    pending: Mutex<VecDeque<Task>>,
    capacity: usize,
    /// Free places below capacity
    slots: Semaphore,
    /// One permit per pending task
    ready: Semaphore,
    /// Pending tasks admitted without a slot
    overflow: AtomicUsize,
    duplicates: AtomicUsize,
    closed: AtomicBool,
    seen: Arc<Deduplicator>,
    counter: Arc<WorkCounter>,
}

impl TaskQueue {
    pub fn new(capacity: usize, seen: Arc<Deduplicator>, counter: Arc<WorkCounter>) -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            slots: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            overflow: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            seen,
            counter,
        }
    }

    /// Offers a task, waiting for room while the queue is full
    pub async fn enqueue(&self, task: Task) -> Result<Enqueued, QueueClosed> {
        if !self.claim(&task)? {
            return Ok(Enqueued::Duplicate);
        }
        self.push(task).await?;
        Ok(Enqueued::Added)
    }

    /// Offers a task discovered inside the pipeline
    ///
    /// Waits at most `wait` for room, then admits the task over capacity.
    pub async fn enqueue_discovered(
        &self,
        task: Task,
        wait: Duration,
    ) -> Result<Enqueued, QueueClosed> {
        if !self.claim(&task)? {
            return Ok(Enqueued::Duplicate);
        }

        match tokio::time::timeout(wait, self.slots.acquire()).await {
            Ok(Ok(permit)) => permit.forget(),
            Ok(Err(_)) => return Err(QueueClosed),
            Err(_) => {
                self.overflow.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    "Queue full for {:?}, admitting {} over capacity",
                    wait,
                    task.identity()
                );
            }
        }

        self.make_ready(task);
        Ok(Enqueued::Added)
    }

    /// Claims the task identity and counts it as outstanding work
    ///
    /// Returns false for a duplicate. A claimed task must then be handed to
    /// [`TaskQueue::push`], or the run will never drain.
    pub(crate) fn claim(&self, task: &Task) -> Result<bool, QueueClosed> {
        if self.is_closed() {
            return Err(QueueClosed);
        }

        if !self.seen.try_claim(task.identity()) {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dropping duplicate task {}", task.identity());
            return Ok(false);
        }

        self.counter.increment();
        Ok(true)
    }

    /// Places an already claimed task, waiting for room
    pub(crate) async fn push(&self, task: Task) -> Result<(), QueueClosed> {
        let permit = self.slots.acquire().await.map_err(|_| QueueClosed)?;
        permit.forget();
        self.make_ready(task);
        Ok(())
    }

    /// Takes the oldest pending task, waiting until one is available
    ///
    /// Returns `None` once the queue is closed.
    pub async fn dequeue(&self) -> Option<Task> {
        let permit = self.ready.acquire().await.ok()?;
        permit.forget();

        let task = self.lock().pop_front();

        let admitted_over_capacity = self
            .overflow
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !admitted_over_capacity {
            self.slots.add_permits(1);
        }

        task
    }

    /// Closes the queue after the run drained
    ///
    /// Closing while work is outstanding would strand those tasks, so it is
    /// refused as an invariant violation.
    pub fn close(&self) -> Result<(), HarvestError> {
        let outstanding = self.counter.get();
        if outstanding > 0 {
            return Err(HarvestError::InvariantViolation(format!(
                "task queue closed with {} outstanding tasks",
                outstanding
            )));
        }
        self.shutdown();
        Ok(())
    }

    /// Closes the queue unconditionally (cancellation)
    pub(crate) fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.ready.close();
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks dropped because their identity was already claimed
    pub fn duplicates(&self) -> usize {
        self.duplicates.load(Ordering::Relaxed)
    }

    fn make_ready(&self, task: Task) {
        self.lock().push_back(task);
        self.ready.add_permits(1);
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
