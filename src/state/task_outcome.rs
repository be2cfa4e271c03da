use std::fmt;

/// Terminal outcome of a single task's fetch + extract cycle
///
/// Every task that entered the queue ends in exactly one of these, and each
/// one completes the task in the work counter exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
    /// A record was produced and handed to the sink
    Emitted,

    /// A record was produced but its identity had already been emitted
    DuplicateRecord,

    /// The page listed further references that were enqueued
    Expanded,

    /// The page was recognized but carried no data
    Empty,

    /// Fetch or extraction failed terminally
    Failed,

    /// The run was cancelled before the task finished
    Abandoned,
}

impl TaskOutcome {
    /// Returns true if this outcome represents a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Abandoned)
    }

    /// Short label used in logs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emitted => "emitted",
            Self::DuplicateRecord => "duplicate_record",
            Self::Expanded => "expanded",
            Self::Empty => "empty",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
