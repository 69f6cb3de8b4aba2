use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Mason-Harvest
///
/// Every section and key has a default, so an empty file (or no file at all)
/// yields a working configuration for the default target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    pub images: ImageConfig,
    pub output: OutputConfig,
}

/// How product URLs are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discovery {
    /// Sitemap when available, listing pages otherwise
    #[default]
    Auto,
    Sitemap,
    Listing,
}

/// The storefront being harvested
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Scheme and host of the storefront, without a trailing slash
    pub base_url: String,

    /// Path prefix shared by every product detail page
    pub product_prefix: String,

    /// Path of the paginated product listing
    pub listing_path: String,

    /// Path of the sitemap feed
    pub sitemap_path: String,

    /// Products per listing page, used with the item-count hint
    pub page_size: u32,

    /// Page count assumed when the listing gives no pagination signal
    pub fallback_page_count: u32,

    pub discovery: Discovery,

    /// Local sitemap file used instead of the remote feed
    pub sitemap_file: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://masonstores.com".to_string(),
            product_prefix: "/products/".to_string(),
            listing_path: "/products".to_string(),
            sitemap_path: "/sitemap.xml".to_string(),
            page_size: 24,
            fallback_page_count: 139,
            discovery: Discovery::Auto,
            sitemap_file: None,
        }
    }
}

impl TargetConfig {
    /// Absolute URL of the product listing root
    pub fn listing_url(&self) -> String {
        format!("{}{}", self.base_url, self.listing_path)
    }

    /// Absolute URL of the remote sitemap
    pub fn sitemap_url(&self) -> String {
        format!("{}{}", self.base_url, self.sitemap_path)
    }

    /// Absolute URL prefix every product detail URL starts with
    pub fn product_url_prefix(&self) -> String {
        format!("{}{}", self.base_url, self.product_prefix)
    }
}

/// Crawl pacing configuration (all durations in milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Lower bound of the delay after each processed item
    pub delay_min_ms: u64,

    /// Upper bound of the delay after each processed item
    pub delay_max_ms: u64,

    /// Bounds of the extra delay after a failed item
    pub error_delay_min_ms: u64,
    pub error_delay_max_ms: u64,

    /// Save a checkpoint (and export) every N completed items
    pub checkpoint_interval: usize,

    /// Take a long break every N completed items
    pub break_interval: usize,

    pub break_min_ms: u64,
    pub break_max_ms: u64,

    /// Log progress every N completed items (plus the 1st and 5th)
    pub progress_interval: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: 3_000,
            delay_max_ms: 6_000,
            error_delay_min_ms: 5_000,
            error_delay_max_ms: 10_000,
            checkpoint_interval: 25,
            break_interval: 100,
            break_min_ms: 30_000,
            break_max_ms: 60_000,
            progress_interval: 10,
        }
    }
}

impl CrawlerConfig {
    pub fn delay_range(&self) -> (Duration, Duration) {
        millis_range(self.delay_min_ms, self.delay_max_ms)
    }

    pub fn error_delay_range(&self) -> (Duration, Duration) {
        millis_range(self.error_delay_min_ms, self.error_delay_max_ms)
    }

    pub fn break_range(&self) -> (Duration, Duration) {
        millis_range(self.break_min_ms, self.break_max_ms)
    }
}

/// HTTP behaviour of the fetcher
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Timeout for page and image GET requests (seconds)
    pub timeout_secs: u64,

    /// Timeout for HEAD probes (seconds)
    pub head_timeout_secs: u64,

    /// Timeout for the remote sitemap download (seconds)
    pub sitemap_timeout_secs: u64,

    pub connect_timeout_secs: u64,

    /// Attempts per request before giving up
    pub max_attempts: u32,

    /// First retry wait (milliseconds)
    pub backoff_min_ms: u64,

    /// Longest retry wait (milliseconds)
    pub backoff_max_ms: u64,

    /// Growth factor between consecutive retry waits
    pub backoff_multiplier: f64,

    /// Rotate the browser identity every N requests
    pub rotate_every: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            head_timeout_secs: 5,
            sitemap_timeout_secs: 120,
            connect_timeout_secs: 10,
            max_attempts: 3,
            backoff_min_ms: 5_000,
            backoff_max_ms: 30_000,
            backoff_multiplier: 2.0,
            rotate_every: 50,
        }
    }
}

/// Image downloader configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImageConfig {
    /// Size of the download pool
    pub max_concurrent: usize,

    /// Delay between task dispatches (milliseconds)
    pub dispatch_delay_ms: u64,

    /// Pause the pool after every N completed downloads
    pub pause_every: usize,

    pub pause_min_ms: u64,
    pub pause_max_ms: u64,

    /// Resolution suffixes probed next to the original, e.g. "800x800"
    pub variant_sizes: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            dispatch_delay_ms: 500,
            pause_every: 200,
            pause_min_ms: 10_000,
            pause_max_ms: 20_000,
            variant_sizes: vec!["800x800".to_string(), "400x400".to_string()],
        }
    }
}

impl ImageConfig {
    pub fn pause_range(&self) -> (Duration, Duration) {
        millis_range(self.pause_min_ms, self.pause_max_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory receiving exports, images and the checkpoint
    pub output_dir: String,

    /// Directory receiving the log file
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn images_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join("images")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join("progress.json")
    }

    pub fn json_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join("products.json")
    }

    pub fn csv_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join("products.csv")
    }
}

fn millis_range(min: u64, max: u64) -> (Duration, Duration) {
    (Duration::from_millis(min), Duration::from_millis(max))
}
