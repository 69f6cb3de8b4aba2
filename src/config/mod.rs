//! Configuration module for Mason-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and preparing the output directories before a run starts.
//!
//! # Example
//!
//! ```no_run
//! use mason_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting products from {}", config.target.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, Discovery, FetcherConfig, ImageConfig, OutputConfig, TargetConfig,
};

// Re-export parser and validation functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{ensure_output_dirs, validate, MAX_DOWNLOAD_CONCURRENCY};
