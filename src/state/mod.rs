//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `RunState`: lifecycle of one pipeline run (seeding, running, draining, done)
//! - `TaskOutcome`: how a single task reached its terminal state

mod run_state;
mod task_outcome;

pub use run_state::RunState;
pub use task_outcome::TaskOutcome;
