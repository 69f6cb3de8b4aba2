//! Output module for product exports and run reports
//!
//! This module handles:
//! - Exporting products to JSON and CSV
//! - Summarizing a run for the log
//! - Reporting on an existing output directory

mod csv_export;
mod json_export;
pub mod stats;
mod traits;

pub use csv_export::{csv_row, CsvExporter, CSV_COLUMNS};
pub use json_export::JsonExporter;
pub use stats::{load_statistics, log_run_summary, print_statistics, OutputStatistics};
pub use traits::{write_atomic, OutputError, OutputResult, ProductExporter, RunSummary};

use crate::config::OutputConfig;
use crate::product::ProductRecord;

/// The exporters written at every checkpoint and at the end of a run
pub fn exporters(output: &OutputConfig) -> Vec<Box<dyn ProductExporter>> {
    vec![
        Box::new(JsonExporter::new(output.json_path())),
        Box::new(CsvExporter::new(output.csv_path())),
    ]
}

/// Writes every export format
///
/// # Arguments
///
/// * `output` - Where the export files live
/// * `products` - The records to export, in order
///
/// # Returns
///
/// * `Ok(())` - All formats written
/// * `Err(OutputError)` - The first format that failed
pub fn export_all(output: &OutputConfig, products: &[ProductRecord]) -> OutputResult<()> {
    for exporter in exporters(output) {
        exporter.export(products)?;
        tracing::info!(
            "Exported {} products to {} ({})",
            products.len(),
            exporter.path().display(),
            exporter.format_name()
        );
    }
    Ok(())
}
