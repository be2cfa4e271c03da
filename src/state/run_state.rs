/// Run state definitions for the pipeline coordinator
use std::fmt;

/// Lifecycle of a pipeline run
///
/// Transitions only move forward: `Seeding → Running → Draining → Done`.
/// A run may also jump straight to `Done` when seeding produced no work or
/// the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RunState {
    /// Root tasks are being enumerated and enqueued
    Seeding,

    /// Worker pools are fetching and extracting
    Running,

    /// Outstanding work reached zero; waiting for workers to go idle
    Draining,

    /// Queue closed, workers stopped, summary available
    Done,
}

impl RunState {
    /// Returns true if the coordinator may move from `self` to `next`
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Seeding, Self::Running)
                | (Self::Seeding, Self::Done)
                | (Self::Running, Self::Draining)
                | (Self::Running, Self::Done)
                | (Self::Draining, Self::Done)
        )
    }

    /// Returns true once no further tasks are accepted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Converts the state to its storage string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }

    /// Parses a state from its storage string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "seeding" => Some(Self::Seeding),
            "running" => Some(Self::Running),
            "draining" => Some(Self::Draining),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
