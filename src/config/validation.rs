use crate::config::types::{
    Config, CrawlerConfig, FetcherConfig, ImageConfig, OutputConfig, TargetConfig,
};
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Largest download pool the harvester will run
pub const MAX_DOWNLOAD_CONCURRENCY: usize = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_image_config(&config.images)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the target storefront settings
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.base_url.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "base_url must not end with '/', got '{}'",
            config.base_url
        )));
    }

    if !config.product_prefix.starts_with('/') || config.product_prefix.len() < 2 {
        return Err(ConfigError::Validation(format!(
            "product_prefix must be a non-root path starting with '/', got '{}'",
            config.product_prefix
        )));
    }

    if config.page_size == 0 {
        return Err(ConfigError::Validation(
            "page_size must be >= 1".to_string(),
        ));
    }

    if config.fallback_page_count == 0 {
        return Err(ConfigError::Validation(
            "fallback_page_count must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates pacing settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_range("delay", config.delay_min_ms, config.delay_max_ms)?;
    validate_range(
        "error_delay",
        config.error_delay_min_ms,
        config.error_delay_max_ms,
    )?;
    validate_range("break", config.break_min_ms, config.break_max_ms)?;

    if config.checkpoint_interval == 0 {
        return Err(ConfigError::Validation(
            "checkpoint_interval must be >= 1".to_string(),
        ));
    }

    if config.break_interval == 0 {
        return Err(ConfigError::Validation(
            "break_interval must be >= 1".to_string(),
        ));
    }

    if config.progress_interval == 0 {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher settings
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.head_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request timeouts must be >= 1 second".to_string(),
        ));
    }

    validate_range("backoff", config.backoff_min_ms, config.backoff_max_ms)?;

    if config.backoff_multiplier.is_nan() || config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_multiplier must be >= 1.0, got {}",
            config.backoff_multiplier
        )));
    }

    if config.rotate_every == 0 {
        return Err(ConfigError::Validation(
            "rotate_every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates image downloader settings
fn validate_image_config(config: &ImageConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > MAX_DOWNLOAD_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and {}, got {}",
            MAX_DOWNLOAD_CONCURRENCY, config.max_concurrent
        )));
    }

    if config.pause_every == 0 {
        return Err(ConfigError::Validation(
            "pause_every must be >= 1".to_string(),
        ));
    }

    validate_range("pause", config.pause_min_ms, config.pause_max_ms)?;

    for size in &config.variant_sizes {
        if !is_size_label(size) {
            return Err(ConfigError::Validation(format!(
                "variant size must look like '800x800', got '{}'",
                size
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if config.log_dir.is_empty() {
        return Err(ConfigError::Validation(
            "log_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_range(name: &str, min: u64, max: u64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{}_min ({}ms) must not exceed {}_max ({}ms)",
            name, min, name, max
        )));
    }
    Ok(())
}

/// Matches `<digits>x<digits>`
fn is_size_label(label: &str) -> bool {
    match label.split_once('x') {
        Some((w, h)) => {
            !w.is_empty()
                && !h.is_empty()
                && w.chars().all(|c| c.is_ascii_digit())
                && h.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Creates the output, image and log directories and checks they accept writes
///
/// Called once at startup so an unusable output location fails the run before
/// any request is sent.
pub fn ensure_output_dirs(config: &OutputConfig) -> Result<(), ConfigError> {
    for dir in [
        Path::new(&config.output_dir).to_path_buf(),
        config.images_dir(),
        Path::new(&config.log_dir).to_path_buf(),
    ] {
        ensure_writable(&dir)?;
    }
    Ok(())
}

fn ensure_writable(dir: &Path) -> Result<(), ConfigError> {
    let unwritable = |e: std::io::Error| ConfigError::Unwritable {
        path: dir.display().to_string(),
        reason: e.to_string(),
    };

    std::fs::create_dir_all(dir).map_err(unwritable)?;

    let probe = dir.join(".write-probe");
    std::fs::write(&probe, b"").map_err(unwritable)?;
    std::fs::remove_file(&probe).map_err(unwritable)?;
    Ok(())
}
