//! Image resolution variants and their local file names

use regex::Regex;
use std::sync::OnceLock;

/// Label of the unsuffixed image
pub const ORIGINAL_LABEL: &str = "original";

const DEFAULT_EXTENSION: &str = ".jpg";

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+?)(-\d+x\d+)?(\.\w+)$").expect("static file name pattern"))
}

/// One URL worth probing for a product image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCandidate {
    pub url: String,
    /// `original` or a size such as `800x800`
    pub label: String,
}

/// A probed variant known to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVariant {
    pub url: String,
    pub label: String,
    /// Advertised size in bytes
    pub size: u64,
}

fn strip_query(url: &str) -> &str {
    let end = url.find(&['?', '#'][..]).unwrap_or(url.len());
    &url[..end]
}

/// Splits a file name into its base (without any `-WxH` suffix) and extension
///
/// # Example
///
/// ```
/// use mason_harvest::images::split_file_name;
///
/// assert_eq!(split_file_name("foo-800x800.jpg"), Some(("foo".to_string(), ".jpg".to_string())));
/// assert_eq!(split_file_name("bar.png"), Some(("bar".to_string(), ".png".to_string())));
/// ```
pub fn split_file_name(file_name: &str) -> Option<(String, String)> {
    let captures = file_name_pattern().captures(file_name)?;
    Some((
        captures.get(1)?.as_str().to_string(),
        captures.get(3)?.as_str().to_string(),
    ))
}

/// Lists the variants to probe for `image_url`: the original first, then one
/// per size label
///
/// URLs whose file name has no extension yield only themselves.
pub fn variant_candidates(image_url: &str, sizes: &[String]) -> Vec<VariantCandidate> {
    let clean = strip_query(image_url);
    let (directory, file_name) = match clean.rsplit_once('/') {
        Some((directory, file_name)) => (directory, file_name),
        None => ("", clean),
    };

    let Some((base, extension)) = split_file_name(file_name) else {
        return vec![VariantCandidate {
            url: image_url.to_string(),
            label: ORIGINAL_LABEL.to_string(),
        }];
    };

    let join = |name: String| {
        if directory.is_empty() {
            name
        } else {
            format!("{}/{}", directory, name)
        }
    };

    std::iter::once(VariantCandidate {
        url: join(format!("{}{}", base, extension)),
        label: ORIGINAL_LABEL.to_string(),
    })
    .chain(sizes.iter().map(|size| VariantCandidate {
        url: join(format!("{}-{}{}", base, size, extension)),
        label: size.clone(),
    }))
    .collect()
}

/// Extension of the file a URL points at, with the leading dot
pub fn extension_of(url: &str) -> String {
    let clean = strip_query(url);
    let file_name = clean.rsplit('/').next().unwrap_or(clean);
    match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() => file_name[dot..].to_lowercase(),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Local file name `<id>_<index>_<label><ext>` for the `index`-th image
/// (1-based) of a product
pub fn local_file_name(product_id: &str, index: usize, label: &str, extension: &str) -> String {
    let safe_id: String = product_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}_{}{}", safe_id, index, label, extension)
}
