//! Product cards on paginated listing pages

use super::{element_text, parse_selector, price::parse_price};
use crate::product::ProductRecord;
use crate::source::product_id_from_url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

const CARD_SELECTOR: &str = "div.product-card, div.product-item, article.product";
const LOOSE_CARD_SELECTOR: &str = "[class*='product']";
const NAME_SELECTOR: &str = "h3, h4, h5, .product-title, .product-name";
const PRICE_SELECTOR: &str = ".price, .sale-price, .current-price, [class*='price']";
const ORIGINAL_PRICE_SELECTOR: &str = ".original-price, .old-price, del, s, [class*='original']";
const CATEGORY_SELECTOR: &str = ".category, .product-category, [class*='category']";

fn first_in<'a>(card: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = parse_selector(css)?;
    let found = card.select(&selector).next();
    found
}

/// Parses every product card on a listing page into a seed record
///
/// Cards are matched with the specific card classes first and a loose
/// `[class*='product']` fallback otherwise. Only cards with a product link and
/// a name are kept; repeated ids keep their first card.
pub fn parse_listing_cards(document: &Html, base: &Url, product_prefix: &str) -> Vec<ProductRecord> {
    let mut cards: Vec<ElementRef<'_>> = parse_selector(CARD_SELECTOR)
        .map(|selector| document.select(&selector).collect())
        .unwrap_or_default();
    if cards.is_empty() {
        cards = parse_selector(LOOSE_CARD_SELECTOR)
            .map(|selector| document.select(&selector).collect())
            .unwrap_or_default();
    }

    let Some(link_selector) = parse_selector(&format!("a[href*='{}']", product_prefix)) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    cards
        .into_iter()
        .filter_map(|card| parse_card(card, base, product_prefix, &link_selector))
        .filter(|record| seen.insert(record.id.clone()))
        .collect()
}

fn parse_card(
    card: ElementRef<'_>,
    base: &Url,
    product_prefix: &str,
    link_selector: &Selector,
) -> Option<ProductRecord> {
    let link = card.select(link_selector).next()?;
    let url = base.join(link.value().attr("href")?).ok()?.to_string();
    let id = product_id_from_url(&url, product_prefix)?;

    let name = first_in(card, NAME_SELECTOR)
        .map(element_text)
        .filter(|name| !name.is_empty())
        .or_else(|| Some(element_text(link)).filter(|name| !name.is_empty()))?;

    let mut record = ProductRecord::new(id, url);
    record.name = Some(name);
    record.price = first_in(card, PRICE_SELECTOR).and_then(|e| parse_price(&element_text(e)));
    record.original_price =
        first_in(card, ORIGINAL_PRICE_SELECTOR).and_then(|e| parse_price(&element_text(e)));
    record.category = first_in(card, CATEGORY_SELECTOR)
        .map(element_text)
        .filter(|category| !category.is_empty());

    if let Some(img) = first_in(card, "img") {
        let value = img.value();
        let src = value
            .attr("src")
            .or_else(|| value.attr("data-src"))
            .or_else(|| value.attr("data-lazy"));
        if let Some(image_url) = src.and_then(|src| base.join(src.trim()).ok()) {
            record.image_urls = vec![image_url.to_string()];
        }
    }

    Some(record)
}
