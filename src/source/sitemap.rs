//! Sitemap mode: product URLs from a sitemap document or a saved feed

use super::{product_id_from_url, WorkItem};
use crate::config::TargetConfig;
use crate::crawler::Fetcher;
use crate::HarvestError;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

/// Builds the pattern for product URLs wrapped in `<loc>` or `<td class="url">`
fn product_url_pattern(target: &TargetConfig) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r#"(?:<loc>|<td class="url">)\s*({}[^<\s]+)\s*(?:</loc>|</td>)"#,
        regex::escape(&target.product_url_prefix())
    ))
}

/// Extracts product URLs from sitemap text
///
/// Duplicates are removed and first-seen order is kept.
pub fn extract_product_urls(content: &str, target: &TargetConfig) -> Vec<String> {
    let pattern = match product_url_pattern(target) {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::error!("Cannot build sitemap pattern: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    pattern
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Turns product URLs into work items, skipping URLs without an identifier
/// and repeated identifiers
pub fn work_items_from_urls(urls: Vec<String>, target: &TargetConfig) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter_map(|url| {
            let id = product_id_from_url(&url, &target.product_prefix)?;
            seen.insert(id.clone()).then(|| WorkItem::new(id, url))
        })
        .collect()
}

/// Reads the sitemap (local feed first, remote otherwise) into work items
///
/// A configured feed file that does not exist is reported and the remote
/// sitemap is used instead.
pub async fn load_work_items(
    fetcher: &Fetcher,
    target: &TargetConfig,
) -> Result<Vec<WorkItem>, HarvestError> {
    let content = match target.sitemap_file.as_deref().map(Path::new) {
        Some(path) if path.exists() => {
            tracing::info!("Loading sitemap from local file {}", path.display());
            tokio::fs::read_to_string(path).await?
        }
        Some(path) => {
            tracing::warn!(
                "Sitemap file {} not found, fetching the remote sitemap",
                path.display()
            );
            fetch_remote(fetcher, target).await?
        }
        None => fetch_remote(fetcher, target).await?,
    };

    let urls = extract_product_urls(&content, target);
    tracing::info!("Found {} product URLs in sitemap", urls.len());
    Ok(work_items_from_urls(urls, target))
}

async fn fetch_remote(fetcher: &Fetcher, target: &TargetConfig) -> Result<String, HarvestError> {
    let url = target.sitemap_url();
    tracing::info!("Fetching sitemap from {}", url);
    Ok(fetcher.fetch_sitemap(&url).await?.body)
}
