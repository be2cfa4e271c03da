//! Markdown run report
//!
//! This module renders a human-readable markdown report of a finished run:
//! counters, outcome breakdown and the list of failed tasks.

use crate::crawler::{Record, RunSummary};
use crate::output::traits::{Sink, SinkResult};
use async_trait::async_trait;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Failures listed individually before the report truncates
const MAX_LISTED_FAILURES: usize = 50;

/// Writes the markdown report to `output_path`
///
/// # Arguments
///
/// * `summary` - The finished run
/// * `config_hash` - Hash of the configuration driving the run
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_report(
    summary: &RunSummary,
    config_hash: &str,
    output_path: &Path,
) -> SinkResult<()> {
    let markdown = format_markdown_report(summary, config_hash);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_report(summary: &RunSummary, config_hash: &str) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Harvest Run Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at.to_rfc3339()));
    let seconds = summary.duration().num_milliseconds() as f64 / 1000.0;
    md.push_str(&format!("- **Duration**: {:.1} seconds\n", seconds));
    let status = if summary.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    md.push_str(&format!("- **Status**: {}\n", status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", config_hash));

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Records Emitted**: {}\n", summary.records_emitted));
    md.push_str(&format!("- **Tasks Completed**: {}\n", summary.tasks_completed));
    md.push_str(&format!("- **Tasks Failed**: {}\n", summary.tasks_failed));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    md.push_str("## Task Outcomes\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Records emitted | {} |\n", summary.records_emitted));
    md.push_str(&format!("| Pages expanded | {} |\n", summary.tasks_expanded));
    md.push_str(&format!("| Empty pages | {} |\n", summary.empty_results));
    md.push_str(&format!("| Duplicate tasks | {} |\n", summary.duplicate_tasks));
    md.push_str(&format!("| Duplicate records | {} |\n", summary.duplicate_records));
    md.push_str(&format!("| Failed | {} |\n", summary.tasks_failed));
    md.push_str(&format!("| Sink errors | {} |\n", summary.sink_errors));
    md.push_str(&format!("| Abandoned | {} |\n\n", summary.tasks_abandoned));

    if !summary.failures.is_empty() {
        md.push_str("## Failed Tasks\n\n");
        md.push_str("| Reference | Kind | Error | Attempts |\n");
        md.push_str("|-----------|------|-------|----------|\n");

        for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!(
                "| {} | {} | {}: {} | {} |\n",
                failure.reference,
                failure.kind,
                failure.error_kind,
                failure.message.replace('|', "\\|"),
                failure.attempts
            ));
        }
        if summary.failures.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.failures.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md
}

/// Sink that ignores records and writes the markdown report on `finish`
pub struct MarkdownReport {
    path: PathBuf,
    config_hash: String,
}

impl MarkdownReport {
    pub fn new(path: impl Into<PathBuf>, config_hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            config_hash: config_hash.into(),
        }
    }
}

#[async_trait]
impl Sink for MarkdownReport {
    async fn emit(&self, _record: Record) -> SinkResult<()> {
        Ok(())
    }

    async fn finish(&self, summary: &RunSummary) -> SinkResult<()> {
        generate_markdown_report(summary, &self.config_hash, &self.path)
    }
}
