//! Crawler module for fetching and processing product pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and identity rotation
//! - Pacing: per-item delays, long breaks, and checkpoint cadence
//! - Progress reporting
//! - Overall crawl coordination and interrupt handling

mod context;
mod coordinator;
mod fetcher;
mod identity;
pub mod progress;
mod retry;
pub mod scheduler;

pub use context::CrawlContext;
pub use coordinator::{run_crawl, Coordinator, CrawlOutcome, CrawlReport};
pub use fetcher::{build_http_client, FetchedPage, Fetcher};
pub use identity::{BrowserIdentity, USER_AGENTS};
pub use progress::Progress;
pub use retry::RetryPolicy;
pub use scheduler::Scheduler;

use tokio_util::sync::CancellationToken;

/// Cancels `token` on the first Ctrl-C
///
/// A second Ctrl-C exits the process immediately without saving.
pub fn install_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Could not listen for Ctrl-C; interrupts will not save progress");
            return;
        }
        tracing::warn!("Interrupt received, finishing the current item and saving progress");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received, exiting without saving");
            std::process::exit(130);
        }
    });
}
