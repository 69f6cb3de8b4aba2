//! Ordered field rules for product detail pages
//!
//! Each scalar field has one or more rules, tried in table order until one
//! yields an accepted, non-empty value. Fields whose rules all miss are left as
//! they were, so values seeded from a listing card survive.

use super::{element_text, parse_selector, price::parse_price};
use crate::product::ProductRecord;
use scraper::Html;

/// Scalar product fields filled from detail pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Price,
    OriginalPrice,
    Sku,
    Brand,
    Description,
    Seller,
    Availability,
}

/// How a value is read from a matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reader {
    /// Whitespace-normalized text content
    Text,
    /// The named attribute
    Attr(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: Field,
    pub selector: &'static str,
    pub reader: Reader,
}

const fn text(field: Field, selector: &'static str) -> FieldRule {
    FieldRule {
        field,
        selector,
        reader: Reader::Text,
    }
}

/// Detail-page rules in priority order
pub const DETAIL_RULES: &[FieldRule] = &[
    text(Field::Name, "h2.title-detail"),
    text(Field::Price, ".current-price"),
    text(Field::OriginalPrice, ".old-price"),
    text(Field::Sku, "#product-sku .sku-text"),
    FieldRule {
        field: Field::Sku,
        selector: "input.hidden-product-id",
        reader: Reader::Attr("value"),
    },
    text(Field::Brand, "a[href*='/brands/']"),
    text(Field::Description, ".tab-pane.active, .tab-content .tab-pane"),
    text(Field::Seller, ".short-desc a[href*='/stores/']"),
    text(Field::Availability, ".number-items-available"),
];

/// List-valued fields collected from every matching element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListField {
    Categories,
    Tags,
}

pub const LIST_RULES: &[(ListField, &str)] = &[
    (
        ListField::Categories,
        ".detail-info a[href*='/product-categories/']",
    ),
    (ListField::Tags, ".detail-info a[href*='/product-tags/']"),
];

/// Longest description kept, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

impl Field {
    const ALL: [Field; 8] = [
        Field::Name,
        Field::Price,
        Field::OriginalPrice,
        Field::Sku,
        Field::Brand,
        Field::Description,
        Field::Seller,
        Field::Availability,
    ];

    /// Returns true if `value` is usable for this field
    fn accepts(&self, value: &str) -> bool {
        match self {
            Field::Price | Field::OriginalPrice => parse_price(value).is_some(),
            Field::Sku => value != ":",
            _ => true,
        }
    }
}

/// Applies the first matching rule's value to the record
fn assign(record: &mut ProductRecord, field: Field, value: String) {
    match field {
        Field::Name => record.name = Some(value),
        Field::Price => record.price = parse_price(&value),
        Field::OriginalPrice => record.original_price = parse_price(&value),
        Field::Sku => record.sku = Some(value),
        Field::Brand => record.brand = Some(value),
        Field::Description => {
            record.description = Some(value.chars().take(MAX_DESCRIPTION_CHARS).collect())
        }
        Field::Seller => record.seller = Some(value),
        Field::Availability => {
            record.in_stock = Some(value.to_lowercase().contains("in stock"));
            record.availability = Some(value);
        }
    }
}

/// Returns the first accepted value for `field`
pub fn first_match(document: &Html, field: Field) -> Option<String> {
    DETAIL_RULES
        .iter()
        .filter(|rule| rule.field == field)
        .find_map(|rule| {
            let selector = parse_selector(rule.selector)?;
            let element = document.select(&selector).next()?;
            let value = match rule.reader {
                Reader::Text => element_text(element),
                Reader::Attr(name) => element.value().attr(name)?.trim().to_string(),
            };
            (!value.is_empty() && field.accepts(&value)).then_some(value)
        })
}

/// Runs every scalar and list rule against a detail document
pub fn apply_detail_rules(document: &Html, record: &mut ProductRecord) {
    for field in Field::ALL {
        if let Some(value) = first_match(document, field) {
            assign(record, field, value);
        }
    }

    for &(field, css) in LIST_RULES {
        let Some(selector) = parse_selector(css) else {
            continue;
        };
        let mut values: Vec<String> = Vec::new();
        for element in document.select(&selector) {
            let value = element_text(element);
            if !value.is_empty() && !values.contains(&value) {
                values.push(value);
            }
        }
        if values.is_empty() {
            continue;
        }
        match field {
            ListField::Categories => record.categories = values,
            ListField::Tags => record.tags = values,
        }
    }
}
