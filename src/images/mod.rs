//! Product image downloads
//!
//! Every image URL expands into resolution variants (the original plus each
//! configured size). Variants that exist are saved under
//! `<output>/images/<id>_<index>_<label><ext>` and recorded on the product.

mod downloader;
mod variants;

pub use downloader::{DownloadStats, DownloadTask, ImageDownloader};
pub use variants::{
    extension_of, local_file_name, split_file_name, variant_candidates, ImageVariant,
    VariantCandidate, ORIGINAL_LABEL,
};

use thiserror::Error;

/// Failure of a single variant download; logged and skipped
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
