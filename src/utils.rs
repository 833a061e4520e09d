// Utility functions
use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// Parses an RFC 3339 timestamp, or an offset-less ISO one
/// (`2024-03-15T12:30:00.123456`) which is read as UTC.
pub fn parse_datetime(date_str: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Replaces every whitespace character with `separator`.
pub fn join_whitespace(text: &str, separator: char) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { separator } else { c })
        .collect()
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
