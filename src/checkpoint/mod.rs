//! Checkpoint store for crash-resumable runs
//!
//! The checkpoint is a small JSON document next to the exports:
//!
//! ```json
//! { "mode": "listing", "last_page": 7, "completed_ids": ["a", "b"], "timestamp": "2024-05-01 12:00:00" }
//! ```
//!
//! `last_page` is only meaningful together with `mode`: a listing page number
//! in listing mode, a product count in sitemap mode.
//!
//! It is rewritten atomically at every checkpoint interval and on interrupt, and
//! removed once a run finishes without interruption. A missing or corrupt file is
//! treated as "no prior progress".

use crate::product::ProductRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Discovery mode that wrote a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Sitemap,
    Listing,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Sitemap => "sitemap",
            SourceMode::Listing => "listing",
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted crawl progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Mode that wrote `last_page`; absent in checkpoints from older runs
    #[serde(default)]
    pub mode: Option<SourceMode>,

    /// Last completed position: a listing page number, or a product count in
    /// sitemap mode
    #[serde(default)]
    pub last_page: u32,

    /// Identifiers of fully processed products, without duplicates
    #[serde(default)]
    pub completed_ids: Vec<String>,

    #[serde(default)]
    pub timestamp: String,
}

impl CrawlState {
    /// Builds a state from the products recorded so far
    pub fn from_products(mode: SourceMode, last_page: u32, products: &[ProductRecord]) -> Self {
        let mut seen = HashSet::new();
        let completed_ids = products
            .iter()
            .filter(|p| !p.id.is_empty())
            .filter(|p| seen.insert(p.id.as_str()))
            .map(|p| p.id.clone())
            .collect();

        Self {
            mode: Some(mode),
            last_page,
            completed_ids,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Returns true when no progress has been recorded
    pub fn is_empty(&self) -> bool {
        self.last_page == 0 && self.completed_ids.is_empty()
    }

    /// `last_page` if it was written by `mode`, `None` otherwise
    pub fn position_for(&self, mode: SourceMode) -> Option<u32> {
        (self.mode == Some(mode)).then_some(self.last_page)
    }

    pub fn completed_set(&self) -> HashSet<String> {
        self.completed_ids.iter().cloned().collect()
    }
}

/// File-backed checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes the checkpoint for `products` at `last_page`
    ///
    /// The document is written to a sibling temporary file and renamed over the
    /// previous checkpoint, so a crash mid-write leaves the old one intact. A
    /// failed write or rename removes the temporary file.
    pub fn save(
        &self,
        mode: SourceMode,
        last_page: u32,
        products: &[ProductRecord],
    ) -> std::io::Result<CrawlState> {
        let state = CrawlState::from_products(mode, last_page, products);
        let json = serde_json::to_string_pretty(&state)?;

        let tmp = self.path.with_extension("json.tmp");
        let written = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        tracing::debug!(
            "Checkpoint saved: {} last_page={}, {} completed ids",
            mode,
            state.last_page,
            state.completed_ids.len()
        );
        Ok(state)
    }

    /// Reads the previous checkpoint, falling back to an empty state
    pub fn load(&self) -> CrawlState {
        if !self.path.exists() {
            return CrawlState::default();
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<CrawlState>(&content).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable checkpoint {}: {}",
                    self.path.display(),
                    e
                );
                CrawlState::default()
            }
        }
    }

    /// Removes the checkpoint after a clean run
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
