//! Sumi-Harvest: a catalog harvesting pipeline
//!
//! This crate implements a crawl pipeline that fetches records from paginated
//! HTML catalogs where some entries are simple item pages and others are
//! composite pages that list further sub-pages, to any depth. Fetching,
//! extraction and record output are pluggable; the engine owns the queue,
//! the worker pools, deduplication and termination detection.

pub mod adapter;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("Queue error: {0}")]
    QueueClosed(#[from] crawler::QueueClosed),

    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::RunState,
        to: state::RunState,
    },

    /// A broken engine invariant (counter underflow, early close). These are
    /// programming defects, never data conditions, and abort the run.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use adapter::{Extracted, SelectorAdapter, SiteAdapter};
pub use config::{Config, EngineConfig};
pub use crawler::{
    Coordinator, Document, ExtractionResult, FetchError, Record, RunSummary, Task, TaskKind,
    Transport,
};
pub use output::Sink;
pub use state::RunState;
pub use url::canonical_identity;
