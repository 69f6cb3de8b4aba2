//! Crawl coordinator that orchestrates the entire harvest
//!
//! The coordinator is responsible for:
//! - Restoring progress from the checkpoint and previous exports
//! - Resolving the work queue (sitemap or listing pages)
//! - Driving each item through fetch, extract, and record
//! - Checkpointing, periodic breaks, and pacing
//! - Downloading images and writing the final exports

use super::context::CrawlContext;
use super::scheduler::Scheduler;
use crate::checkpoint::{CheckpointStore, CrawlState, SourceMode};
use crate::config::{ensure_output_dirs, validate, Config};
use crate::extract;
use crate::images::{DownloadStats, ImageDownloader};
use crate::output::{export_all, log_run_summary, RunSummary};
use crate::product::ProductSet;
use crate::source::{self, filter_pending, pagination, Discovered, WorkItem};
use crate::state::CrawlPhase;
use crate::HarvestError;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every item was attempted and images were downloaded
    Completed,

    /// The interrupt token fired; progress was saved for `--resume`
    Interrupted,
}

/// Outcome plus the run's statistics
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub outcome: CrawlOutcome,
    pub summary: RunSummary,
}

/// Main crawl coordinator
pub struct Coordinator {
    config: Config,
    context: CrawlContext,
    scheduler: Scheduler,
    checkpoint: CheckpointStore,
    products: ProductSet,
    completed: HashSet<String>,
    resume: bool,
    restored: CrawlState,
    phase: CrawlPhase,
    base_url: Url,
    mode: SourceMode,
    last_page: u32,
    config_hash: String,
}

impl Coordinator {
    /// Creates a new coordinator
    ///
    /// The configuration is validated and the output directories are created
    /// and checked for writability before any network activity.
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `resume` - Continue from the checkpoint and previous exports
    pub fn new(config: Config, resume: bool) -> Result<Self, HarvestError> {
        Self::with_cancellation(config, resume, CancellationToken::new())
    }

    /// Creates a coordinator interrupted by `cancel`
    pub fn with_cancellation(
        config: Config,
        resume: bool,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        validate(&config)?;
        ensure_output_dirs(&config.output)?;

        let base_url = Url::parse(&config.target.base_url)?;
        let context = CrawlContext::with_cancellation(&config, cancel)?;
        let scheduler = Scheduler::new(&config.crawler);
        let checkpoint = CheckpointStore::new(config.output.checkpoint_path());

        Ok(Self {
            config,
            context,
            scheduler,
            checkpoint,
            products: ProductSet::new(),
            completed: HashSet::new(),
            resume,
            restored: CrawlState::default(),
            phase: CrawlPhase::Init,
            base_url,
            mode: SourceMode::Sitemap,
            last_page: 0,
            config_hash: String::new(),
        })
    }

    /// Attaches the configuration hash reported in the run summary
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// A handle that interrupts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.cancellation_token()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn products(&self) -> &ProductSet {
        &self.products
    }

    /// Runs the harvest to completion or interruption
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Completed or interrupted, with statistics
    /// * `Err(HarvestError)` - Discovery failed in a forced mode, or the final
    ///   exports could not be written
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        tracing::info!("Starting harvest of {}", self.config.target.base_url);

        if self.resume {
            self.restore();
        } else if self.checkpoint.exists() {
            tracing::warn!(
                "Ignoring existing checkpoint {}; pass --resume to continue it",
                self.checkpoint.path().display()
            );
        }

        if !self.context.is_cancelled() {
            match source::discover(self.context.fetcher(), &self.config.target).await? {
                Discovered::Products(items) => self.crawl_products(items).await?,
                Discovered::Listing { total_pages } => self.crawl_listing(total_pages).await?,
            }
        }

        self.finish().await
    }

    /// Loads the checkpoint and merges the previous export
    fn restore(&mut self) {
        let state = self.checkpoint.load();
        if state.is_empty() {
            tracing::info!("No checkpoint found, starting from the beginning");
        }
        self.completed = state.completed_set();

        let json_path = self.config.output.json_path();
        if json_path.exists() {
            match ProductSet::load_json(&json_path) {
                Ok(products) => {
                    tracing::info!("Loaded {} previously exported products", products.len());
                    self.products = products;
                }
                Err(e) => tracing::warn!("Could not load {}: {}", json_path.display(), e),
            }
        }

        tracing::info!(
            "Resuming: {} products already completed (checkpoint from {})",
            self.completed.len(),
            if state.timestamp.is_empty() { "never" } else { state.timestamp.as_str() }
        );
        self.restored = state;
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!("Phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Sitemap mode: every product URL is known up front
    async fn crawl_products(&mut self, items: Vec<WorkItem>) -> Result<(), HarvestError> {
        self.mode = SourceMode::Sitemap;
        // Only the completed ids carry over; this warns on a listing checkpoint
        self.restored_position();

        let listed = items.len();
        let pending = filter_pending(items, &self.completed);
        tracing::info!(
            "Products to scrape: {} ({} of {} already done)",
            pending.len(),
            listed - pending.len(),
            listed
        );
        self.context.progress_mut().set_total(pending.len());

        for item in pending {
            if self.context.is_cancelled() {
                break;
            }
            self.process_item(item).await?;
        }
        Ok(())
    }

    /// Pagination mode: products are found page by page
    async fn crawl_listing(&mut self, total_pages: u32) -> Result<(), HarvestError> {
        self.mode = SourceMode::Listing;

        self.last_page = self.restored_position().unwrap_or(0);
        let start = self.last_page.saturating_add(1);

        let remaining_pages = total_pages.saturating_sub(self.last_page) as usize;
        let page_size = self.config.target.page_size as usize;
        self.context
            .progress_mut()
            .set_total(remaining_pages * page_size);
        tracing::info!("Crawling listing pages {} to {}", start, total_pages);

        let mut contiguous = true;
        for page in start..=total_pages {
            if self.context.is_cancelled() {
                break;
            }

            self.transition(CrawlPhase::Listing)?;
            let fetched =
                pagination::fetch_listing_page(self.context.fetcher(), &self.config.target, page)
                    .await;
            let items = match fetched {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!("Error fetching listing page {}: {}", page, e);
                    self.context.progress_mut().record_error();
                    contiguous = false;
                    self.transition(CrawlPhase::Delay)?;
                    self.context.pause(self.scheduler.error_delay()).await;
                    continue;
                }
            };

            let found = items.len();
            let pending = filter_pending(items, &self.completed);
            tracing::info!(
                "Listing page {}/{}: {} products, {} pending",
                page,
                total_pages,
                found,
                pending.len()
            );
            self.transition(CrawlPhase::Delay)?;
            self.context.pause(self.scheduler.steady_delay()).await;

            let mut page_complete = true;
            for item in pending {
                if self.context.is_cancelled() {
                    page_complete = false;
                    break;
                }
                page_complete &= self.process_item(item).await?;
            }

            if contiguous && page_complete {
                self.last_page = page;
            } else {
                contiguous = false;
            }
        }
        Ok(())
    }

    /// Fetches, extracts, and records one product
    ///
    /// Returns `Ok(false)` when the item failed and was skipped.
    async fn process_item(&mut self, item: WorkItem) -> Result<bool, HarvestError> {
        self.transition(CrawlPhase::Fetch)?;
        tracing::debug!("Fetching {} ({})", item.id, item.url);

        let fetched = self
            .context
            .fetcher()
            .fetch(&item.url, item.referer.as_deref())
            .await;
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Error scraping {}: {}", item.id, e);
                self.context.progress_mut().record_error();
                self.transition(CrawlPhase::Delay)?;
                self.context.pause(self.scheduler.error_delay()).await;
                return Ok(false);
            }
        };

        self.transition(CrawlPhase::Extract)?;
        let mut record = item.into_record();
        extract::extract_product(&page, &mut record, &self.base_url);

        self.transition(CrawlPhase::Record)?;
        self.completed.insert(record.id.clone());
        self.products.upsert(record);
        let completed = self.context.progress_mut().record_success();
        if self.context.progress().should_report() {
            self.context.progress().log();
        }

        if self.scheduler.checkpoint_due(completed) {
            self.transition(CrawlPhase::Checkpoint)?;
            tracing::info!("Saving checkpoint at {} products", completed);
            if let Err(e) = self.persist() {
                tracing::error!("Checkpoint failed: {}", e);
            }
        }

        let total = self.context.progress().total();
        if self.scheduler.break_due(completed, Some(total)) {
            self.transition(CrawlPhase::Break)?;
            let length = self.scheduler.break_duration();
            tracing::info!(
                "Taking a {}s break after {} products",
                length.as_secs(),
                completed
            );
            self.context.pause(length).await;
            self.context.fetcher().rotate_identity();
        }

        self.transition(CrawlPhase::Delay)?;
        self.context.pause(self.scheduler.steady_delay()).await;
        Ok(true)
    }

    /// The restored checkpoint position, if it was written in the current mode
    ///
    /// A position from the other mode (or from a checkpoint that predates the
    /// mode field) is not comparable and is dropped; completed ids still apply.
    fn restored_position(&self) -> Option<u32> {
        if !self.resume || self.restored.is_empty() {
            return None;
        }
        let position = self.restored.position_for(self.mode);
        if position.is_none() {
            tracing::warn!(
                "Checkpoint position {} was written by {} discovery, now running {} discovery; \
                 restarting from the beginning and skipping {} completed products",
                self.restored.last_page,
                self.restored.mode.map_or("an older", |mode| mode.as_str()),
                self.mode,
                self.completed.len()
            );
        }
        position
    }

    fn checkpoint_position(&self) -> u32 {
        match self.mode {
            SourceMode::Sitemap => u32::try_from(self.products.len()).unwrap_or(u32::MAX),
            SourceMode::Listing => self.last_page,
        }
    }

    /// Writes the checkpoint and both exports from the same product list
    fn persist(&self) -> Result<(), HarvestError> {
        self.checkpoint.save(
            self.mode,
            self.checkpoint_position(),
            self.products.as_slice(),
        )?;
        export_all(&self.config.output, self.products.as_slice())?;
        Ok(())
    }

    /// Downloads images (unless interrupted) and writes the final state
    async fn finish(&mut self) -> Result<CrawlReport, HarvestError> {
        self.transition(CrawlPhase::Finalizing)?;

        let mut images = DownloadStats::default();
        if self.context.is_cancelled() {
            tracing::warn!("Interrupted, saving progress...");
        } else {
            tracing::info!("Downloading images for {} products", self.products.len());
            let downloader = ImageDownloader::new(
                self.context.fetcher(),
                &self.config.images,
                self.config.output.images_dir(),
                self.context.cancellation_token(),
            );
            images = downloader.run(self.products.records_mut()).await;
        }

        let interrupted = self.context.is_cancelled();
        if interrupted {
            self.persist()?;
            tracing::info!(
                "Progress saved with {} products. Run with --resume to continue.",
                self.products.len()
            );
        } else {
            export_all(&self.config.output, self.products.as_slice())?;
            self.checkpoint.clear()?;
        }

        self.transition(CrawlPhase::Done)?;

        let progress = self.context.progress();
        let summary = RunSummary {
            products: self.products.len(),
            processed: progress.completed(),
            errors: progress.errors(),
            requests: self.context.fetcher().request_count(),
            images,
            elapsed: progress.elapsed(),
            interrupted,
            config_hash: self.config_hash.clone(),
        };
        log_run_summary(&summary);

        Ok(CrawlReport {
            outcome: if interrupted {
                CrawlOutcome::Interrupted
            } else {
                CrawlOutcome::Completed
            },
            summary,
        })
    }
}

/// Runs a complete harvest with a Ctrl-C handler installed
///
/// # Example
///
/// ```no_run
/// use mason_harvest::config::Config;
/// use mason_harvest::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = run_crawl(Config::default(), false).await?;
/// println!("{} products", report.summary.products);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, resume: bool) -> Result<CrawlReport, HarvestError> {
    let mut coordinator = Coordinator::new(config, resume)?;
    super::install_interrupt_handler(coordinator.cancellation_token());
    coordinator.run().await
}
