//! Shared state threaded through one crawl

use super::fetcher::Fetcher;
use super::progress::Progress;
use super::scheduler;
use crate::config::Config;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Owns the fetcher, the run counters, and the interrupt token
#[derive(Debug)]
pub struct CrawlContext {
    fetcher: Fetcher,
    progress: Progress,
    cancel: CancellationToken,
}

impl CrawlContext {
    /// Creates a context with a fresh, uncancelled token
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Creates a context driven by an existing token
    pub fn with_cancellation(
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            fetcher: Fetcher::new(&config.fetcher, &config.target)?,
            progress: Progress::new(0, config.crawler.progress_interval),
            cancel,
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut Progress {
        &mut self.progress
    }

    /// A handle that can interrupt the crawl from another task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleeps for `duration` unless interrupted; `false` when cut short
    pub async fn pause(&self, duration: Duration) -> bool {
        scheduler::pause(duration, &self.cancel).await
    }
}
