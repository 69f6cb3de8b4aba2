//! Price parsing from display text such as `$1,234.50`

use regex::Regex;
use std::sync::OnceLock;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("static price pattern"))
}

/// Parses the first number out of a price label
///
/// Thousands separators are dropped before matching, and any currency text
/// around the number is ignored. Labels without digits yield `None`.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    number_pattern()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
}
