//! Product records and the de-duplicating collection that holds them
//!
//! A `ProductRecord` is created from an identifier and a detail URL, enriched in
//! place by the extractor, and finally annotated with local image paths by the
//! image downloader.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// One harvested product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Slug taken from the detail URL; unique key for resume and de-duplication
    pub id: String,

    pub product_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    /// Category shown on a listing card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Categories linked from the detail page
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specifications: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,

    #[serde(default)]
    pub image_urls: Vec<String>,

    #[serde(default)]
    pub local_images: Vec<String>,
}

impl ProductRecord {
    /// Creates a record carrying only its identity
    pub fn new(id: impl Into<String>, product_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            product_url: product_url.into(),
            ..Self::default()
        }
    }
}

/// Ordered product collection keyed by identifier
///
/// Inserting a record whose id is already present replaces the earlier record in
/// its original position, so a resumed run never exports the same id twice.
#[derive(Debug, Clone, Default)]
pub struct ProductSet {
    records: Vec<ProductRecord>,
    index: HashMap<String, usize>,
}

impl ProductSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from records, keeping the last record seen for each id
    pub fn from_records(records: impl IntoIterator<Item = ProductRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.upsert(record);
        }
        set
    }

    /// Loads a previously exported `products.json`
    pub fn load_json(path: &Path) -> Result<Self, crate::HarvestError> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<ProductRecord> = serde_json::from_str(&content)?;
        Ok(Self::from_records(records))
    }

    /// Inserts or replaces a record
    ///
    /// Returns `true` when an existing record with the same id was replaced.
    pub fn upsert(&mut self, record: ProductRecord) -> bool {
        match self.index.get(&record.id) {
            Some(&position) => {
                self.records[position] = record;
                true
            }
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                false
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ProductRecord> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[ProductRecord] {
        &self.records
    }

    /// Mutable access for annotation passes; ids must not be changed
    pub fn records_mut(&mut self) -> &mut [ProductRecord] {
        &mut self.records
    }

    /// Identifiers in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }
}
