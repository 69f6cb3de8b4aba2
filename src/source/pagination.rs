//! Pagination mode: walk `listing?page=N` and seed records from product cards

use super::WorkItem;
use crate::config::TargetConfig;
use crate::crawler::Fetcher;
use crate::extract::parse_listing_cards;
use crate::{FetchError, HarvestError};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// URL of listing page `page` (1-based)
pub fn listing_page_url(target: &TargetConfig, page: u32) -> String {
    format!("{}?page={}", target.listing_url(), page)
}

/// Reads the page count from a listing document
///
/// The highest `page=N` among pagination links wins. Without pagination links,
/// an "N items" hint is divided by the page size, rounding up. Failing both,
/// the configured fallback count is returned.
pub fn parse_total_pages(document: &Html, target: &TargetConfig) -> u32 {
    let page_param = Regex::new(r"page=(\d+)").ok();
    let link_pages = Selector::parse("ul.pagination li a")
        .ok()
        .zip(page_param)
        .and_then(|(selector, page_param)| {
            document
                .select(&selector)
                .filter_map(|link| link.value().attr("href"))
                .filter_map(|href| page_param.captures(href)?.get(1)?.as_str().parse::<u32>().ok())
                .max()
        });
    if let Some(pages) = link_pages {
        return pages;
    }

    let item_count = Regex::new(r"(\d+)\s*items").ok().and_then(|pattern| {
        document
            .root_element()
            .text()
            .find_map(|text| pattern.captures(text)?.get(1)?.as_str().parse::<u32>().ok())
    });
    if let Some(items) = item_count {
        let page_size = target.page_size.max(1);
        return items.div_ceil(page_size);
    }

    tracing::warn!(
        "Could not determine total pages, defaulting to {}",
        target.fallback_page_count
    );
    target.fallback_page_count
}

/// Fetches the listing root and determines the page count
pub async fn discover_total_pages(fetcher: &Fetcher, target: &TargetConfig) -> Result<u32, FetchError> {
    let page = fetcher.fetch(&target.listing_url(), None).await?;
    let total = parse_total_pages(&page.document(), target);
    tracing::info!("Listing has {} pages", total);
    Ok(total)
}

/// Fetches listing page `page` and returns its products as seeded work items
pub async fn fetch_listing_page(
    fetcher: &Fetcher,
    target: &TargetConfig,
    page: u32,
) -> Result<Vec<WorkItem>, HarvestError> {
    let url = listing_page_url(target, page);
    let fetched = fetcher.fetch(&url, None).await?;
    let base = Url::parse(&target.base_url)?;

    let seeds = parse_listing_cards(&fetched.document(), &base, &target.product_prefix);
    tracing::debug!("Listing page {}: {} product cards", page, seeds.len());

    Ok(seeds
        .into_iter()
        .map(|seed| WorkItem::from_seed(seed, url.as_str()))
        .collect())
}
