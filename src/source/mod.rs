//! URL sources: where the work queue comes from
//!
//! Two discovery modes produce the same kind of work item:
//! - Sitemap mode reads a local feed file or the site's sitemap
//! - Pagination mode walks `listing?page=N` and seeds records from product cards
//!
//! `auto` discovery prefers the sitemap and falls back to pagination.

pub mod pagination;
pub mod sitemap;

use crate::config::{Discovery, TargetConfig};
use crate::crawler::Fetcher;
use crate::product::ProductRecord;
use crate::HarvestError;
use std::collections::HashSet;

/// One product to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: String,
    pub url: String,

    /// Partial record from a listing card, extended by the detail page
    pub seed: Option<ProductRecord>,

    /// Page the item was found on, sent as the referer
    pub referer: Option<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            seed: None,
            referer: None,
        }
    }

    /// Builds an item around a listing-card record
    pub fn from_seed(seed: ProductRecord, referer: impl Into<String>) -> Self {
        Self {
            id: seed.id.clone(),
            url: seed.product_url.clone(),
            seed: Some(seed),
            referer: Some(referer.into()),
        }
    }

    /// The record the detail page is extracted into
    pub fn into_record(self) -> ProductRecord {
        match self.seed {
            Some(seed) => seed,
            None => ProductRecord::new(self.id, self.url),
        }
    }
}

/// The resolved work queue
#[derive(Debug, Clone, PartialEq)]
pub enum Discovered {
    /// Every product URL is known up front
    Products(Vec<WorkItem>),

    /// Products are found page by page
    Listing { total_pages: u32 },
}

/// Derives a product identifier from its detail URL
///
/// The identifier is the path segment after the product prefix, without query,
/// fragment, or surrounding slashes.
///
/// # Example
///
/// ```
/// use mason_harvest::source::product_id_from_url;
///
/// let id = product_id_from_url("https://masonstores.com/products/oak-table/?ref=1", "/products/");
/// assert_eq!(id.as_deref(), Some("oak-table"));
/// ```
pub fn product_id_from_url(url: &str, product_prefix: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let (_, tail) = without_query.rsplit_once(product_prefix)?;
    let id = tail.trim_matches('/');
    (!id.is_empty()).then(|| id.to_string())
}

/// Drops completed items, preserving the order of the rest
pub fn filter_pending(items: Vec<WorkItem>, completed: &HashSet<String>) -> Vec<WorkItem> {
    items
        .into_iter()
        .filter(|item| !completed.contains(&item.id))
        .collect()
}

/// Resolves the work queue according to the configured discovery mode
///
/// # Returns
///
/// * `Ok(Discovered)` - Sitemap items or the listing page count
/// * `Err(HarvestError)` - A forced mode could not be resolved
pub async fn discover(fetcher: &Fetcher, target: &TargetConfig) -> Result<Discovered, HarvestError> {
    match target.discovery {
        Discovery::Sitemap => Ok(Discovered::Products(
            sitemap::load_work_items(fetcher, target).await?,
        )),
        Discovery::Listing => Ok(Discovered::Listing {
            total_pages: pagination::discover_total_pages(fetcher, target).await?,
        }),
        Discovery::Auto => match sitemap::load_work_items(fetcher, target).await {
            Ok(items) if !items.is_empty() => Ok(Discovered::Products(items)),
            Ok(_) => {
                tracing::warn!("Sitemap lists no products, falling back to listing pages");
                Ok(Discovered::Listing {
                    total_pages: pagination::discover_total_pages(fetcher, target).await?,
                })
            }
            Err(e) if target.sitemap_file.is_none() => {
                tracing::warn!("Sitemap unavailable ({}), falling back to listing pages", e);
                Ok(Discovered::Listing {
                    total_pages: pagination::discover_total_pages(fetcher, target).await?,
                })
            }
            Err(e) => Err(e),
        },
    }
}
