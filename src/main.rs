//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest catalog harvester.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::{root_tasks, Coordinator};
use sumi_harvest::output::{load_statistics, print_statistics, print_summary, sink_from_config};
use sumi_harvest::storage::open_storage;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a polite catalog harvester
///
/// Sumi-Harvest walks paginated HTML catalogs, follows composite pages to
/// any depth and emits one record per catalog entry.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be seeded without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the latest run from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Records go to stdout; keep the log on stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be seeded
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    let engine = &config.engine;
    println!("Engine:");
    println!("  Fetchers: {}", engine.fetcher_concurrency);
    println!("  Extractors: {}", engine.extractor_concurrency);
    println!("  Queue capacity: {}", engine.queue_capacity);
    println!("  Handoff capacity: {}", engine.handoff_capacity());
    println!(
        "  Retries: {} (backoff {}ms, max {}ms)",
        engine.per_task_retries, engine.retry_backoff_ms, engine.max_backoff_ms
    );
    println!("  Per-task timeout: {}ms", engine.per_task_timeout_ms);
    println!("  Respect robots.txt: {}", engine.respect_robots);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Console: {}", config.output.console);
    if let Some(path) = &config.output.database_path {
        println!("  Database: {} (batch size {})", path, config.output.batch_size);
    }
    if let Some(path) = &config.output.summary_path {
        println!("  Report: {}", path);
    }

    let roots = root_tasks(&config.catalog);
    println!("\nRoot Tasks ({}):", roots.len());
    for task in &roots {
        println!("  - {}", task.reference());
    }

    let catalog = &config.catalog;
    if let Some(template) = &catalog.listing_url {
        println!("\nCatalog Listing:");
        println!("  Template: {}", template);
        println!("  First page: {}", catalog.first_page);
        println!("  Max pages: {}", catalog.max_pages);
    }

    println!("\nAdapter:");
    println!("  Fields: {}", config.adapter.fields.len());
    for field in &config.adapter.fields {
        let required = if field.required { " (required)" } else { "" };
        println!("    * {} <- {}{}", field.name, field.selector, required);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start harvesting with {} root tasks", roots.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    let Some(path) = &config.output.database_path else {
        bail!("No database-path configured under [output]");
    };
    println!("Database: {}\n", path);

    let storage = open_storage(Path::new(path))
        .with_context(|| format!("Failed to open database {}", path))?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No harvest runs recorded yet"),
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, config_hash: &str) -> Result<()> {
    let sink = sink_from_config(&config.output, config_hash).context("Failed to open output")?;
    let mut coordinator = Coordinator::from_config(config, Arc::new(sink))?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight tasks");
            cancel.cancel();
        }
    });

    let summary = coordinator
        .run(root_tasks(&config.catalog))
        .await
        .context("Harvest failed")?;

    if !config.output.console {
        print_summary(&summary);
    }
    Ok(())
}
