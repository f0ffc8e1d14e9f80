//! Free-text date normalization
//!
//! The roll of honour records dates of death as prose ("August 29th, 1914").
//! These helpers turn them into calendar dates so they can be stored as ISO
//! `YYYY-MM-DD` strings.

use chrono::NaiveDate;

/// Formats tried in order after ordinal suffixes are stripped.
/// `%B` also accepts abbreviated month names when parsing.
const FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
];

/// Parse a free-text date of death. Returns `None` when nothing matches.
pub fn normalize(raw: &str) -> Option<NaiveDate> {
    let cleaned = strip_ordinals(raw);
    let cleaned = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
}

/// `normalize` rendered as `YYYY-MM-DD`
pub fn to_iso(raw: &str) -> Option<String> {
    normalize(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Remove `st`/`nd`/`rd`/`th` directly after a digit ("29th" -> "29").
fn strip_ordinals(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        out.push(chars[i]);
        if chars[i].is_ascii_digit() {
            if let Some(pair) = chars.get(i + 1..i + 3) {
                let suffix = pair.iter().collect::<String>().to_ascii_lowercase();
                let boundary = chars.get(i + 3).is_none_or(|c| !c.is_alphabetic());
                if matches!(suffix.as_str(), "st" | "nd" | "rd" | "th") && boundary {
                    i += 3;
                    continue;
                }
            }
        }
        i += 1;
    }
    out
}
