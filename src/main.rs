//! Mason-Harvest main entry point
//!
//! This is the command-line interface for the Mason-Harvest product harvester.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mason_harvest::config::{compute_config_hash, parse_config, validate, Config, Discovery};
use mason_harvest::crawler::{install_interrupt_handler, Coordinator, CrawlOutcome};
use mason_harvest::output::{load_statistics, print_statistics};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Mason-Harvest: a polite, resumable product catalogue harvester
///
/// Walks the storefront's sitemap or product listing, extracts every product
/// page into JSON and CSV, and downloads all available image resolutions.
#[derive(Parser, Debug)]
#[command(name = "mason-harvest")]
#[command(version)]
#[command(about = "A polite, resumable product catalogue harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (optional; defaults apply otherwise)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory for exports, images and the checkpoint
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Minimum delay between products, in seconds
    #[arg(long, value_name = "SECS")]
    delay_min: Option<f64>,

    /// Maximum delay between products, in seconds
    #[arg(long, value_name = "SECS")]
    delay_max: Option<f64>,

    /// Resume from the last checkpoint
    #[arg(short, long)]
    resume: bool,

    /// Local sitemap file to read product URLs from
    #[arg(short, long, value_name = "FILE")]
    sitemap: Option<String>,

    /// How product URLs are discovered
    #[arg(long, value_enum)]
    discovery: Option<DiscoveryArg>,

    /// Concurrent image downloads (1-10)
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Directory for harvest.log
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the configuration and print it without any network access
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics for an existing output directory and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DiscoveryArg {
    Auto,
    Sitemap,
    Listing,
}

impl From<DiscoveryArg> for Discovery {
    fn from(arg: DiscoveryArg) -> Self {
        match arg {
            DiscoveryArg::Auto => Discovery::Auto,
            DiscoveryArg::Sitemap => Discovery::Sitemap,
            DiscoveryArg::Listing => Discovery::Listing,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_effective_config(&cli)?;
    let _guard = setup_logging(&config.output.log_dir, cli.verbose, cli.quiet)?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, config_hash, cli.resume).await
}

/// Reads the config file (if any) and applies command-line overrides
fn load_effective_config(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config = parse_config(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            (config, compute_config_hash(path)?)
        }
        None => (Config::default(), "defaults".to_string()),
    };

    if let Some(output) = &cli.output {
        config.output.output_dir = output.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.output.log_dir = log_dir.clone();
    }
    if let Some(secs) = cli.delay_min {
        config.crawler.delay_min_ms = seconds_to_millis(secs)?;
    }
    if let Some(secs) = cli.delay_max {
        config.crawler.delay_max_ms = seconds_to_millis(secs)?;
    }
    if let Some(sitemap) = &cli.sitemap {
        config.target.sitemap_file = Some(sitemap.clone());
    }
    if let Some(discovery) = cli.discovery {
        config.target.discovery = discovery.into();
    }
    if let Some(concurrency) = cli.concurrency {
        config.images.max_concurrent = concurrency;
    }

    Ok((config, hash))
}

fn seconds_to_millis(secs: f64) -> anyhow::Result<u64> {
    anyhow::ensure!(
        secs.is_finite() && secs >= 0.0,
        "delays must be non-negative, got {}",
        secs
    );
    Ok((secs * 1000.0).round() as u64)
}

fn env_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbose {
        0 => EnvFilter::new("mason_harvest=info,warn"),
        1 => EnvFilter::new("mason_harvest=debug,info"),
        2 => EnvFilter::new("mason_harvest=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Sets up stdout and file logging based on verbosity level
///
/// The returned guard flushes the file writer when dropped and must live
/// until the process exits.
fn setup_logging(log_dir: &str, verbose: u8, quiet: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir))?;

    let appender = tracing_appender::rolling::never(Path::new(log_dir), "harvest.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(env_filter(verbose, quiet));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .compact()
        .with_filter(env_filter(verbose, quiet));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Mason-Harvest Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Product prefix: {}", config.target.product_prefix);
    println!("  Discovery: {:?}", config.target.discovery);
    println!("  Listing: {}", config.target.listing_url());
    println!("  Sitemap: {}", config.target.sitemap_url());
    if let Some(file) = &config.target.sitemap_file {
        println!("  Local sitemap: {}", file);
    }

    println!("\nPacing:");
    println!(
        "  Delay: {}-{}ms (errors {}-{}ms)",
        config.crawler.delay_min_ms,
        config.crawler.delay_max_ms,
        config.crawler.error_delay_min_ms,
        config.crawler.error_delay_max_ms
    );
    println!(
        "  Checkpoint every {} products, break every {} ({}-{}ms)",
        config.crawler.checkpoint_interval,
        config.crawler.break_interval,
        config.crawler.break_min_ms,
        config.crawler.break_max_ms
    );

    println!("\nFetcher:");
    println!(
        "  Timeouts: page {}s, HEAD {}s, sitemap {}s",
        config.fetcher.timeout_secs,
        config.fetcher.head_timeout_secs,
        config.fetcher.sitemap_timeout_secs
    );
    println!(
        "  Attempts: {} (backoff {}-{}ms x{})",
        config.fetcher.max_attempts,
        config.fetcher.backoff_min_ms,
        config.fetcher.backoff_max_ms,
        config.fetcher.backoff_multiplier
    );

    println!("\nImages:");
    println!("  Concurrency: {}", config.images.max_concurrent);
    println!("  Variants: {}", config.images.variant_sizes.join(", "));

    println!("\nOutput:");
    println!("  Directory: {}", config.output.output_dir);
    println!("  Logs: {}", config.output.log_dir);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: summarizes an existing output directory
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Output directory: {}\n", config.output.output_dir);
    let stats = load_statistics(&config.output)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest
async fn handle_crawl(config: Config, config_hash: String, resume: bool) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(config, resume)?.with_config_hash(config_hash);
    install_interrupt_handler(coordinator.cancellation_token());

    match coordinator.run().await {
        Ok(report) => {
            match report.outcome {
                CrawlOutcome::Completed => tracing::info!("Harvest completed successfully"),
                CrawlOutcome::Interrupted => {
                    tracing::info!("Harvest interrupted; run again with --resume to continue")
                }
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
