//! Product field extraction
//!
//! This module turns fetched HTML into product fields:
//! - Detail pages, through the ordered rule table in [`rules`]
//! - Specifications parsed from the description text
//! - Gallery image URLs
//! - Listing-page product cards, as seed records
//!
//! Extraction never fails: a rule that matches nothing leaves its field as it
//! was.

mod gallery;
mod listing;
mod price;
pub mod rules;
mod specs;

pub use gallery::{extract_image_urls, MAX_IMAGES};
pub use listing::parse_listing_cards;
pub use price::parse_price;
pub use specs::{extract_specifications, KNOWN_SPEC_KEYS};

use crate::crawler::FetchedPage;
use crate::product::ProductRecord;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parses a selector, logging and skipping invalid ones
pub(crate) fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!("Skipping invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

/// Text content of an element with whitespace runs collapsed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Enriches `record` from a fetched detail page
///
/// The page is parsed here, in synchronous code, so the document never lives
/// across an await point.
pub fn extract_product(page: &FetchedPage, record: &mut ProductRecord, base: &Url) {
    let document = page.document();
    extract_detail(&document, record, base);
}

/// Enriches `record` from a parsed detail document
pub fn extract_detail(document: &Html, record: &mut ProductRecord, base: &Url) {
    rules::apply_detail_rules(document, record);

    if let Some(description) = record.description.as_deref() {
        let specifications = extract_specifications(description);
        if !specifications.is_empty() {
            record.specifications = specifications;
        }
    }

    let images = extract_image_urls(document, base);
    if !images.is_empty() {
        record.image_urls = images;
    }
}
