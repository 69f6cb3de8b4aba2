//! JSON export of the harvested product list

use super::traits::{write_atomic, OutputResult, ProductExporter};
use crate::product::ProductRecord;
use std::path::{Path, PathBuf};

/// Writes `products.json`: a UTF-8 array, 2-space indented, non-ASCII literal
#[derive(Debug, Clone)]
pub struct JsonExporter {
    path: PathBuf,
}

impl JsonExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProductExporter for JsonExporter {
    fn format_name(&self) -> &'static str {
        "JSON"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn export(&self, products: &[ProductRecord]) -> OutputResult<()> {
        let json = serde_json::to_vec_pretty(products)?;
        write_atomic(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductSet;
    use tempfile::TempDir;

    #[test]
    fn test_export_is_pretty_and_unescaped() {
        let temp = TempDir::new().unwrap();
        let exporter = JsonExporter::new(temp.path().join("products.json"));

        let mut record = ProductRecord::new("lamp", "https://masonstores.com/products/lamp");
        record.name = Some("مصباح نحاسي".to_string());
        exporter.export(&[record]).unwrap();

        let content = std::fs::read_to_string(exporter.path()).unwrap();
        assert!(content.starts_with("[\n  {"));
        assert!(content.contains("مصباح نحاسي"));
    }

    #[test]
    fn test_export_loads_back() {
        let temp = TempDir::new().unwrap();
        let exporter = JsonExporter::new(temp.path().join("products.json"));
        let records = vec![
            ProductRecord::new("a", "https://masonstores.com/products/a"),
            ProductRecord::new("b", "https://masonstores.com/products/b"),
        ];
        exporter.export(&records).unwrap();

        let set = ProductSet::load_json(exporter.path()).unwrap();
        assert_eq!(set.as_slice(), records.as_slice());
    }
}
