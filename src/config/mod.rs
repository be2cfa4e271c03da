//! Configuration module for Sumi-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Fetchers: {}", config.engine.fetcher_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AdapterConfig, CatalogConfig, Config, EngineConfig, FieldConfig, FieldKind, OutputConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

pub use validation::validate_engine;
