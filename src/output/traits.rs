//! Exporter trait and run summary types
//!
//! This module defines the trait interface for product exporters and the
//! summary a crawl hands back to its caller.

use crate::images::DownloadStats;
use crate::product::ProductRecord;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary statistics for one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Products held after the run, including ones restored on resume
    pub products: usize,

    /// Products processed in this run
    pub processed: usize,

    /// Items that failed and were skipped
    pub errors: usize,

    /// GET attempts issued
    pub requests: u64,

    pub images: DownloadStats,

    pub elapsed: Duration,

    pub interrupted: bool,

    pub config_hash: String,
}

impl RunSummary {
    /// Returns the share of attempted items that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let attempted = self.processed + self.errors;
        if attempted == 0 {
            return 0.0;
        }
        (self.processed as f64 / attempted as f64) * 100.0
    }
}

/// Trait for product exporters
///
/// An exporter writes the whole product list to one file, replacing any
/// previous export atomically.
pub trait ProductExporter {
    /// Short format name for logs
    fn format_name(&self) -> &'static str;

    /// Destination file
    fn path(&self) -> &Path;

    /// Writes every product
    ///
    /// # Arguments
    ///
    /// * `products` - The records to export, in order
    fn export(&self, products: &[ProductRecord]) -> OutputResult<()>;
}

/// Writes `bytes` to `path` through a temporary sibling file
pub fn write_atomic(path: &Path, bytes: &[u8]) -> OutputResult<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        OutputError::Write(format!("{}: {}", path.display(), e))
    })
}
