//! Crawler module: the crawl pipeline engine
//!
//! This module contains the core pipeline, including:
//! - Tasks, documents and records flowing through the pipeline
//! - The bounded task queue, seen-sets and outstanding-work counter
//! - Fetcher and extractor worker pools with retry logic
//! - HTTP transport and catalog page enumeration
//! - Overall run coordination and the run summary

mod catalog;
mod context;
mod coordinator;
mod counter;
mod dedup;
mod extractor;
mod failure;
mod fetcher;
mod queue;
mod retry;
mod summary;
mod task;
mod transport;

pub use catalog::enumerate_catalog_pages;
pub use coordinator::{root_tasks, Coordinator};
pub use counter::{InFlightGuard, WorkCounter};
pub use dedup::Deduplicator;
pub use failure::{TaskError, TaskFailure};
pub use queue::{Enqueued, QueueClosed, TaskQueue};
pub use retry::RetryPolicy;
pub use summary::RunSummary;
pub use task::{Document, ExtractionResult, Record, Task, TaskKind};
pub use transport::{build_http_client, FetchError, HttpTransport, Transport};

use crate::config::Config;
use crate::output::Sink;
use crate::Result;
use std::sync::Arc;

/// Runs a complete harvest from a configuration
///
/// Builds the HTTP transport and selector adapter, seeds the configured
/// root tasks (and catalog pages) and runs until all work is done.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `sink` - Where records go
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run finished (possibly with task failures)
/// * `Err(HarvestError)` - The run could not start or was aborted
pub async fn harvest(config: &Config, sink: Arc<dyn Sink>) -> Result<RunSummary> {
    let mut coordinator = Coordinator::from_config(config, sink)?;
    coordinator.run(root_tasks(&config.catalog)).await
}
