//! CSV export with a fixed column layout
//!
//! List fields are pipe-joined and specifications are embedded as a JSON object.

use super::traits::{write_atomic, OutputError, OutputResult, ProductExporter};
use crate::product::ProductRecord;
use std::path::{Path, PathBuf};

/// Column order of `products.csv`
pub const CSV_COLUMNS: &[&str] = &[
    "id",
    "product_url",
    "name",
    "price",
    "original_price",
    "sku",
    "brand",
    "category",
    "categories",
    "tags",
    "description",
    "specifications",
    "seller",
    "availability",
    "in_stock",
    "image_urls",
    "local_images",
];

const LIST_SEPARATOR: &str = "|";

/// Writes `products.csv`: one row per product, lists pipe-joined, the
/// specification map as embedded JSON
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Flattens a record into cells matching [`CSV_COLUMNS`]
pub fn csv_row(product: &ProductRecord) -> OutputResult<Vec<String>> {
    let specifications = if product.specifications.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&product.specifications)?
    };

    Ok(vec![
        product.id.clone(),
        product.product_url.clone(),
        optional(&product.name),
        optional(&product.price),
        optional(&product.original_price),
        optional(&product.sku),
        optional(&product.brand),
        optional(&product.category),
        product.categories.join(LIST_SEPARATOR),
        product.tags.join(LIST_SEPARATOR),
        optional(&product.description),
        specifications,
        optional(&product.seller),
        optional(&product.availability),
        optional(&product.in_stock),
        product.image_urls.join(LIST_SEPARATOR),
        product.local_images.join(LIST_SEPARATOR),
    ])
}

impl ProductExporter for CsvExporter {
    fn format_name(&self) -> &'static str {
        "CSV"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn export(&self, products: &[ProductRecord]) -> OutputResult<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_COLUMNS)?;
        for product in products {
            writer.write_record(csv_row(product)?)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| OutputError::Format(e.to_string()))?;
        write_atomic(&self.path, &bytes)
    }
}
