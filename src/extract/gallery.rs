use super::parse_selector;
use scraper::{ElementRef, Html};
use url::Url;

/// Most images kept per product
pub const MAX_IMAGES: usize = 5;

const PRODUCT_IMAGE_PATH: &str = "/storage/products/";
const THUMBNAIL_MARKER: &str = "150x150";
const NON_PRODUCT_NAMES: &[&str] = &["icon", "logo", "banner", "placeholder"];

fn image_source(img: ElementRef<'_>) -> Option<&str> {
    let value = img.value();
    value
        .attr("src")
        .filter(|src| !src.trim().is_empty())
        .or_else(|| value.attr("data-src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
}

fn push_unique(urls: &mut Vec<String>, url: String) {
    if !urls.contains(&url) {
        urls.push(url);
    }
}

fn resolve(base: &Url, src: &str) -> Option<String> {
    base.join(src).ok().map(String::from)
}

/// Collects product image URLs from a detail page
///
/// Gallery images under the product storage path are preferred, skipping
/// thumbnails. Without a gallery, the first product-storage image that does not
/// look like an icon, logo, banner, or placeholder is used.
pub fn extract_image_urls(document: &Html, base: &Url) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let gallery = parse_selector("div.detail-gallery, div.product-image-slider")
        .and_then(|selector| document.select(&selector).next());
    if let (Some(gallery), Some(img_selector)) = (gallery, parse_selector("img")) {
        for img in gallery.select(&img_selector) {
            let Some(src) = image_source(img) else {
                continue;
            };
            if src.contains(PRODUCT_IMAGE_PATH) && !src.contains(THUMBNAIL_MARKER) {
                if let Some(url) = resolve(base, src) {
                    push_unique(&mut urls, url);
                }
            }
        }
    }

    if urls.is_empty() {
        if let Some(selector) = parse_selector("img[src*='/storage/products/']") {
            for img in document.select(&selector).take(MAX_IMAGES) {
                let Some(src) = image_source(img) else {
                    continue;
                };
                if src.contains(THUMBNAIL_MARKER) {
                    continue;
                }
                let file_name = src.rsplit('/').next().unwrap_or(src).to_lowercase();
                if NON_PRODUCT_NAMES.iter().any(|word| file_name.contains(word)) {
                    continue;
                }
                if let Some(url) = resolve(base, src) {
                    push_unique(&mut urls, url);
                    break;
                }
            }
        }
    }

    urls.truncate(MAX_IMAGES);
    urls
}
