//! Mason-Harvest: a polite, resumable product catalogue harvester
//!
//! This crate walks a single storefront's product catalogue (via its sitemap or
//! its paginated listing), extracts structured product records from each detail
//! page, downloads product images in every available resolution, and persists the
//! results to JSON/CSV with crash-resumable checkpoints.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod images;
pub mod output;
pub mod product;
pub mod source;
pub mod state;

use thiserror::Error;

/// Main error type for Mason-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid crawl phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

    #[error("Directory {path} is not writable: {reason}")]
    Unwritable { path: String, reason: String },
}

/// Network errors surfaced by the fetcher
///
/// `Status` and `Transport` are the retryable transport failures; `Exhausted`
/// wraps the last of them once the retry policy gives up.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Returns the URL the failed request was addressed to
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Transport { url, .. } | Self::Exhausted { url, .. } => {
                url
            }
        }
    }
}

/// Result type alias for Mason-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator, CrawlOutcome, CrawlReport};
pub use product::{ProductRecord, ProductSet};
pub use state::CrawlPhase;
