//! Statistics over an existing output directory
//!
//! This module backs the `--stats` command: it reads `products.json` and the
//! checkpoint, and reports field coverage and image state without any network
//! access.

use super::traits::RunSummary;
use crate::checkpoint::CheckpointStore;
use crate::config::OutputConfig;
use crate::crawler::progress::format_duration;
use crate::product::ProductSet;
use crate::HarvestError;
use std::path::Path;

/// Output directory statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputStatistics {
    /// Total number of exported products
    pub total_products: usize,

    pub with_name: usize,
    pub with_price: usize,
    pub with_sku: usize,
    pub with_specifications: usize,

    /// Products with at least one remote image URL
    pub with_images: usize,

    /// Local image paths recorded across all products
    pub local_images: usize,

    /// Recorded local paths whose file is gone
    pub missing_local_images: usize,

    /// Products marked in stock
    pub in_stock: usize,

    /// Ids in a leftover checkpoint (an interrupted run), if any
    pub checkpoint_ids: Option<usize>,

    pub checkpoint_timestamp: Option<String>,
}

/// Loads statistics from an output directory
///
/// # Returns
///
/// * `Ok(OutputStatistics)` - Statistics, empty if nothing was exported yet
/// * `Err(HarvestError)` - `products.json` exists but cannot be read
pub fn load_statistics(output: &OutputConfig) -> Result<OutputStatistics, HarvestError> {
    let json_path = output.json_path();
    let products = if json_path.exists() {
        ProductSet::load_json(&json_path)?
    } else {
        ProductSet::new()
    };

    let mut stats = OutputStatistics {
        total_products: products.len(),
        ..OutputStatistics::default()
    };

    for product in products.as_slice() {
        stats.with_name += usize::from(product.name.is_some());
        stats.with_price += usize::from(product.price.is_some());
        stats.with_sku += usize::from(product.sku.is_some());
        stats.with_specifications += usize::from(!product.specifications.is_empty());
        stats.with_images += usize::from(!product.image_urls.is_empty());
        stats.in_stock += usize::from(product.in_stock == Some(true));
        stats.local_images += product.local_images.len();
        stats.missing_local_images += product
            .local_images
            .iter()
            .filter(|path| !Path::new(path).exists())
            .count();
    }

    let checkpoint = CheckpointStore::new(output.checkpoint_path());
    if checkpoint.exists() {
        let state = checkpoint.load();
        stats.checkpoint_ids = Some(state.completed_ids.len());
        stats.checkpoint_timestamp = Some(state.timestamp);
    }

    Ok(stats)
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64) * 100.0
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &OutputStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total products: {}", stats.total_products);
    println!();

    println!("Field Coverage:");
    let total = stats.total_products;
    for (label, count) in [
        ("Name", stats.with_name),
        ("Price", stats.with_price),
        ("SKU", stats.with_sku),
        ("Specifications", stats.with_specifications),
        ("Images", stats.with_images),
        ("In stock", stats.in_stock),
    ] {
        println!("  {}: {} ({:.1}%)", label, count, share(count, total));
    }
    println!();

    println!("Local Images:");
    println!("  Recorded: {}", stats.local_images);
    if stats.missing_local_images > 0 {
        println!("  Missing on disk: {}", stats.missing_local_images);
    }
    println!();

    match (&stats.checkpoint_ids, &stats.checkpoint_timestamp) {
        (Some(ids), Some(timestamp)) => {
            println!(
                "Unfinished run: {} products checkpointed at {} (rerun with --resume)",
                ids, timestamp
            );
        }
        _ => println!("No unfinished run."),
    }
}

/// Logs the end-of-run summary
pub fn log_run_summary(summary: &RunSummary) {
    tracing::info!(
        "Run {}: {} products total, {} processed, {} errors ({:.1}% success), {} requests in {}",
        if summary.interrupted { "interrupted" } else { "completed" },
        summary.products,
        summary.processed,
        summary.errors,
        summary.success_rate(),
        summary.requests,
        format_duration(summary.elapsed)
    );
    if !summary.interrupted {
        tracing::info!(
            "Images: {} downloaded, {} already present, {} failed",
            summary.images.downloaded,
            summary.images.already_present,
            summary.images.failed
        );
    }
}
