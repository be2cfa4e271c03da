//! Seen-set for task and record identities

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Linearizable set of claimed identities
///
/// `try_claim` is a single check-and-insert under one lock: of any number of
/// concurrent claims for the same identity exactly one wins.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `identity`, returning false if it was claimed before
    pub fn try_claim(&self, identity: &str) -> bool {
        let mut seen = self.lock();
        if seen.contains(identity) {
            return false;
        }
        seen.insert(identity.to_string())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().contains(identity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
