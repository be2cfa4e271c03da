//! Output module: where harvested records go
//!
//! This module handles:
//! - The `Sink` trait records are emitted through
//! - Console and SQLite sinks, and fan-out to several of them
//! - The markdown run report and run statistics

mod console;
mod fanout;
mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use console::ConsoleSink;
pub use fanout::FanoutSink;
pub use markdown::{format_markdown_report, generate_markdown_report, MarkdownReport};
pub use sqlite_output::SqliteSink;
pub use stats::{load_statistics, print_statistics, print_summary, RunStatistics};
pub use traits::{Sink, SinkError, SinkResult};

use crate::config::OutputConfig;
use crate::storage::open_storage;
use std::path::Path;
use std::sync::Arc;

/// Builds the sinks named by the output configuration
///
/// # Arguments
///
/// * `output` - The `[output]` section
/// * `config_hash` - Hash of the configuration, stored with the run
pub fn sink_from_config(output: &OutputConfig, config_hash: &str) -> SinkResult<FanoutSink> {
    let mut fanout = FanoutSink::default();

    if output.console {
        fanout.push(Arc::new(ConsoleSink::stdout()));
    }
    if let Some(path) = &output.database_path {
        let storage = open_storage(Path::new(path))?;
        fanout.push(Arc::new(SqliteSink::new(storage, config_hash, output.batch_size)?));
    }
    if let Some(path) = &output.summary_path {
        fanout.push(Arc::new(MarkdownReport::new(path, config_hash)));
    }

    Ok(fanout)
}
