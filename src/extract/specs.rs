use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Specification keys recognized in "Key: Value" runs of a description
pub const KNOWN_SPEC_KEYS: &[&str] = &[
    "Material",
    "Brand",
    "Colour",
    "Color",
    "Product Dimensions",
    "Dimensions",
    "Exterior Finish",
    "Finish",
    "Handle Type",
    "Shape",
    "Special Feature",
    "Included Components",
    "Lock Type",
    "Type",
    "Size",
    "Weight",
    "Warranty",
    "Model",
    "Power",
    "Voltage",
    "Wattage",
    "Capacity",
    "Country of Origin",
];

/// Values this long are prose, not a specification
const MAX_VALUE_CHARS: usize = 100;

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Longest keys first so "Product Dimensions" wins over "Dimensions"
        let mut keys: Vec<&str> = KNOWN_SPEC_KEYS.to_vec();
        keys.sort_by_key(|key| std::cmp::Reverse(key.len()));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b({})\s*:", alternation)).expect("specification key pattern")
    })
}

fn canonical_key(matched: &str) -> Option<&'static str> {
    KNOWN_SPEC_KEYS
        .iter()
        .copied()
        .find(|key| key.eq_ignore_ascii_case(matched))
}

/// Pulls known "Key: Value" pairs out of free description text
///
/// A value runs from its key's colon to the next known key (or the end of the
/// text). The first occurrence of each key wins.
pub fn extract_specifications(description: &str) -> BTreeMap<String, String> {
    let matches: Vec<_> = key_pattern().captures_iter(description).collect();
    let mut specs = BTreeMap::new();

    for (i, captures) in matches.iter().enumerate() {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let Some(key) = canonical_key(key.as_str()) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(description.len(), |next| next.start());

        let value = description[whole.end()..end].trim();
        if value.is_empty() || value.chars().count() >= MAX_VALUE_CHARS {
            continue;
        }
        specs
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    specs
}
