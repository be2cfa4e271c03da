//! Outstanding-work counter and in-flight gauge

use crate::HarvestError;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared counter whose transitions can be awaited
///
/// As the work counter it equals the number of tasks created minus the
/// number that reached a terminal outcome; reaching zero ends the run.
/// A second instance serves as the in-flight gauge of busy workers.
#[derive(Debug)]
pub struct WorkCounter {
    tx: watch::Sender<usize>,
}

impl WorkCounter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    pub fn increment(&self) {
        self.tx.send_modify(|n| *n += 1);
    }

    /// Decrements the counter and returns the remaining count
    ///
    /// Going below zero means a task was completed twice or never counted,
    /// which is reported as an invariant violation and leaves the counter at
    /// zero.
    pub fn decrement(&self) -> Result<usize, HarvestError> {
        let mut remaining = None;
        self.tx.send_if_modified(|n| {
            if *n == 0 {
                return false;
            }
            *n -= 1;
            remaining = Some(*n);
            true
        });

        remaining.ok_or_else(|| {
            HarvestError::InvariantViolation("work counter decremented below zero".to_string())
        })
    }

    pub fn get(&self) -> usize {
        *self.tx.borrow()
    }

    /// Resolves once the counter is zero
    pub async fn wait_for_zero(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Counts one busy worker until the returned guard is dropped
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.increment();
        InFlightGuard {
            gauge: Arc::clone(self),
        }
    }
}

impl Default for WorkCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the in-flight gauge raised while a worker holds a task
#[derive(Debug)]
pub struct InFlightGuard {
    gauge: Arc<WorkCounter>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.tx.send_modify(|n| *n = n.saturating_sub(1));
    }
}
