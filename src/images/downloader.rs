//! Bounded-concurrency image downloader
//!
//! The downloader runs in two passes over the product list:
//! 1. Planning: every candidate variant gets a local path. Files already on
//!    disk are recorded without touching the network; the rest are probed
//!    with HEAD and queued when they exist with a nonzero size.
//! 2. Execution: queued tasks run on a semaphore-limited `JoinSet` with a
//!    fixed dispatch delay and a longer pause every N completed downloads.
//!
//! Only the coordinating task writes to the product records, after all tasks
//! finish, in task order.

use super::variants::{extension_of, local_file_name, variant_candidates, ImageVariant};
use super::DownloadError;
use crate::config::ImageConfig;
use crate::crawler::scheduler::{pause, random_between};
use crate::crawler::Fetcher;
use crate::product::ProductRecord;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// A queued download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    /// Final location; also the task's identity
    pub destination: PathBuf,
    /// Position of the owning product in the record slice
    pub product_index: usize,
    pub product_id: String,
}

/// Counters for one downloader run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Files fetched in this run
    pub downloaded: usize,
    /// Files found on disk and reused
    pub already_present: usize,
    /// Variants that failed to download
    pub failed: usize,
    /// Candidates whose probe found nothing
    pub unavailable: usize,
}

type TaskOutcome = (usize, Result<u64, DownloadError>);

/// Downloads every available variant of every product image
pub struct ImageDownloader<'a> {
    fetcher: &'a Fetcher,
    config: ImageConfig,
    images_dir: PathBuf,
    cancel: CancellationToken,
}

impl<'a> ImageDownloader<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        config: &ImageConfig,
        images_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            config: config.clone(),
            images_dir: images_dir.into(),
            cancel,
        }
    }

    /// Plans and runs downloads, then records local paths on the products
    ///
    /// Each product's `local_images` is rebuilt from scratch, so a rerun over
    /// a complete image directory reproduces the same list.
    pub async fn run(&self, products: &mut [ProductRecord]) -> DownloadStats {
        let mut stats = DownloadStats::default();
        let mut tasks = Vec::new();

        for (index, product) in products.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("Interrupted while planning image downloads");
                break;
            }
            product.local_images.clear();
            let planned = self.plan_product(index, product, &mut stats).await;
            tasks.extend(planned);
        }

        if tasks.is_empty() {
            tracing::info!(
                "No images to download ({} already present)",
                stats.already_present
            );
            return stats;
        }

        tracing::info!(
            "Downloading {} images (max {} concurrent)",
            tasks.len(),
            self.config.max_concurrent
        );

        let mut outcomes = self.execute(&tasks, &mut stats).await;
        outcomes.sort_by_key(|(task_index, _)| *task_index);

        for (task_index, result) in outcomes {
            let task = &tasks[task_index];
            match result {
                Ok(_) => {
                    if let Some(product) = products.get_mut(task.product_index) {
                        product.local_images.push(path_string(&task.destination));
                    }
                }
                Err(e) => tracing::warn!("Failed to download {}: {}", task.url, e),
            }
        }

        tracing::info!(
            "Images: {} downloaded, {} already present, {} failed",
            stats.downloaded,
            stats.already_present,
            stats.failed
        );
        stats
    }

    /// Resolves local paths for every variant of a product's images
    ///
    /// Existing files are appended to `local_images` directly; missing ones are
    /// probed and returned as tasks.
    async fn plan_product(
        &self,
        product_index: usize,
        product: &mut ProductRecord,
        stats: &mut DownloadStats,
    ) -> Vec<DownloadTask> {
        let mut tasks = Vec::new();

        for (image_index, image_url) in product.image_urls.iter().enumerate() {
            for candidate in variant_candidates(image_url, &self.config.variant_sizes) {
                let file_name = local_file_name(
                    &product.id,
                    image_index + 1,
                    &candidate.label,
                    &extension_of(&candidate.url),
                );
                let destination = self.images_dir.join(file_name);

                if destination.exists() {
                    stats.already_present += 1;
                    product.local_images.push(path_string(&destination));
                    continue;
                }

                match self.probe(&candidate.url, &candidate.label).await {
                    Some(variant) => {
                        tracing::trace!("{} {} is {} bytes", product.id, variant.label, variant.size);
                        tasks.push(DownloadTask {
                            url: variant.url,
                            destination,
                            product_index,
                            product_id: product.id.clone(),
                        });
                    }
                    None => stats.unavailable += 1,
                }
            }
        }

        tasks
    }

    async fn probe(&self, url: &str, label: &str) -> Option<ImageVariant> {
        let size = self.fetcher.head(url).await.filter(|size| *size > 0)?;
        Some(ImageVariant {
            url: url.to_string(),
            label: label.to_string(),
            size,
        })
    }

    /// Runs the queued tasks on the bounded pool
    async fn execute(&self, tasks: &[DownloadTask], stats: &mut DownloadStats) -> Vec<TaskOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let dispatch_delay = Duration::from_millis(self.config.dispatch_delay_ms);
        let pause_every = self.config.pause_every.max(1);
        let (pause_min, pause_max) = self.config.pause_range();

        let client = self.fetcher.client();
        let headers = self.fetcher.identity_headers();
        let timeout = self.fetcher.page_timeout();

        let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
        let mut outcomes = Vec::with_capacity(tasks.len());

        for (task_index, task) in tasks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Interrupted, {} image downloads not dispatched",
                    tasks.len() - task_index
                );
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let client = client.clone();
            let headers = headers.clone();
            let url = task.url.clone();
            let destination = task.destination.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = download_to(&client, headers, &url, &destination, timeout).await;
                (task_index, result)
            });

            pause(dispatch_delay, &self.cancel).await;

            while let Some(joined) = join_set.try_join_next() {
                if record_outcome(joined, stats, &mut outcomes)
                    && stats.downloaded % pause_every == 0
                {
                    let length = random_between(pause_min, pause_max);
                    tracing::info!(
                        "Downloaded {} images, pausing for {}s",
                        stats.downloaded,
                        length.as_secs()
                    );
                    pause(length, &self.cancel).await;
                }
            }
        }

        while let Some(joined) = join_set.join_next().await {
            record_outcome(joined, stats, &mut outcomes);
        }

        outcomes
    }
}

/// Counts a finished task; returns true for a successful download
fn record_outcome(
    joined: Result<TaskOutcome, JoinError>,
    stats: &mut DownloadStats,
    outcomes: &mut Vec<TaskOutcome>,
) -> bool {
    match joined {
        Ok((task_index, result)) => {
            let succeeded = result.is_ok();
            if succeeded {
                stats.downloaded += 1;
            } else {
                stats.failed += 1;
            }
            outcomes.push((task_index, result));
            succeeded
        }
        Err(e) => {
            tracing::error!("Image download task failed: {}", e);
            stats.failed += 1;
            false
        }
    }
}

/// Downloads `url` into `destination` through a temporary sibling file
async fn download_to(
    client: &Client,
    headers: HeaderMap,
    url: &str,
    destination: &Path,
    timeout: Duration,
) -> Result<u64, DownloadError> {
    let response = client.get(url).headers(headers).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status(status.as_u16()));
    }
    let bytes = response.bytes().await?;
    write_via_partial(destination, &bytes).await?;

    tracing::debug!("Saved {} ({} bytes)", destination.display(), bytes.len());
    Ok(bytes.len() as u64)
}

/// Writes `bytes` to a `.part` sibling and renames it over `destination`
///
/// The `.part` file is removed if either step fails.
async fn write_via_partial(destination: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(destination);
    let written = match tokio::fs::write(&partial, bytes).await {
        Ok(()) => tokio::fs::rename(&partial, destination).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    written
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
