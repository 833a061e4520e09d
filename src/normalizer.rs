use crate::locale::{CatalogLocale, Clock};

const LOCATION_DATE_DELIMITER: &str = " - ";

/// Keeps only the digits of a price, after dropping the negotiable
/// qualifier. Nothing left (or an overflowing number) reads as 0.
pub fn normalize_price(raw: &str, locale: &CatalogLocale) -> u64 {
    let digits: String = raw
        .replace(&locale.negotiable_token, "")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Splits `"Legnica - dzisiaj o 12:30"` into location and date, replacing a
/// "today" date with the clock's current date in the catalog's format.
///
/// Text without the delimiter is all location.
pub fn split_location_date(raw: &str, locale: &CatalogLocale, clock: &dyn Clock) -> (String, String) {
    let mut parts = raw.split(LOCATION_DATE_DELIMITER);
    let location = parts.next().unwrap_or_default().trim().to_string();
    let date = parts.next().unwrap_or_default().trim();

    let date = if date.to_lowercase().contains(&locale.today_token) {
        locale.format_date(clock.today())
    } else {
        date.to_string()
    };

    (location, date)
}
