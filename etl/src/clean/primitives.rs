//! Scalar parsing primitives used by the entity cleaners.
//!
//! Every function here is pure and works on a single value. A value that
//! cannot be repaired comes back as `None`; deciding whether that drops the
//! row is the cleaner's job.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Full month names and their two-digit numbers.
const MONTHS: [(&str, &str); 12] = [
    ("January", "01"),
    ("February", "02"),
    ("March", "03"),
    ("April", "04"),
    ("May", "05"),
    ("June", "06"),
    ("July", "07"),
    ("August", "08"),
    ("September", "09"),
    ("October", "10"),
    ("November", "11"),
    ("December", "12"),
];

/// Kilograms per ounce.
pub const KG_PER_OUNCE: f64 = 0.0283495;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("Invalid email regex")
});

static CORRUPTED_WEIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]+$").expect("Invalid weight regex"));

// =============================================================================
// Dates
// =============================================================================

/// Normalize a date string to `YYYY-MM-DD`.
///
/// Three shapes are understood:
///
/// - `2020/03/04` - slashes become dashes, without range checks
/// - `2020-03-04` - passed through when the parts are 4, 2 and 2 long
/// - `2020 March 04`, `March 2020 04`, ... - a full month name, a 4 character
///   year and a 2 character day in any order
///
/// Anything else, including a dashed date with other part lengths, is
/// `None`.
///
/// # Example
/// ```
/// use retail_etl::clean::primitives::parse_date;
///
/// assert_eq!(parse_date("2020/03/04").as_deref(), Some("2020-03-04"));
/// assert_eq!(parse_date("1968 October 16").as_deref(), Some("1968-10-16"));
/// assert_eq!(parse_date("20-3-4"), None);
/// ```
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if raw.contains('/') {
        return Some(raw.replace('/', "-"));
    }

    if raw.contains('-') {
        let lengths: Vec<usize> = raw.split('-').map(str::len).collect();
        return match lengths.as_slice() {
            [4, 2, 2] => Some(raw.to_string()),
            _ => None,
        };
    }

    let mut year = None;
    let mut month = None;
    let mut day = None;
    for token in raw.split_whitespace() {
        if let Some((_, number)) = MONTHS.iter().find(|(name, _)| *name == token) {
            month = Some(*number);
        } else if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
            year = Some(token);
        } else if token.len() == 2 && token.chars().all(|c| c.is_ascii_digit()) {
            day = Some(token);
        }
    }

    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => Some(format!("{}-{}-{}", y, m, d)),
        _ => None,
    }
}

/// Strictly parse a `YYYY-MM-DD` string into a calendar date.
///
/// Out-of-range parts (month 13, day 32, ...) give `None`.
pub fn coerce_date(normalized: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(normalized.trim(), "%Y-%m-%d").ok()
}

/// [`parse_date`] followed by [`coerce_date`].
pub fn parse_and_coerce_date(raw: &str) -> Option<NaiveDate> {
    parse_date(raw).as_deref().and_then(coerce_date)
}

/// Parse a `HH:MM:SS` time of day.
pub fn parse_timestamp(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S").ok()
}

/// Left-pad a single digit with a zero (`"3"` becomes `"03"`).
pub fn zero_pad(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() == 1 && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("0{}", raw)
    } else {
        raw.to_string()
    }
}

/// Combine separately stored date parts and a time into one timestamp.
pub fn compose_datetime(year: &str, month: &str, day: &str, time: &str) -> Option<NaiveDateTime> {
    let text = format!(
        "{}-{}-{} {}",
        year.trim(),
        zero_pad(month),
        zero_pad(day),
        time.trim()
    );
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S").ok()
}

// =============================================================================
// Weights and prices
// =============================================================================

/// True when a weight is only uppercase letters and digits, which marks a
/// corrupted record rather than a measurement.
pub fn is_corrupted_weight(raw: &str) -> bool {
    CORRUPTED_WEIGHT_RE.is_match(raw)
}

/// Convert a raw weight to kilograms.
///
/// Digits, `.` and `x` form the value; other letters form the unit. A value
/// such as `12x100` is a multi-pack and multiplies out. Units: `kg`, `g`,
/// `ml` (taken as grams) and `oz`. Anything else is `None`.
///
/// # Example
/// ```
/// use retail_etl::clean::primitives::convert_weight;
///
/// assert_eq!(convert_weight("1.5kg"), Some(1.5));
/// assert_eq!(convert_weight("12 x 100g"), Some(1.2));
/// assert_eq!(convert_weight("3lb"), None);
/// ```
pub fn convert_weight(raw: &str) -> Option<f64> {
    let value: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == 'x')
        .collect();
    let unit: String = raw
        .chars()
        .filter(|c| c.is_alphabetic() && *c != 'x')
        .collect();

    let amount = match value.split_once('x') {
        Some((count, each)) => count.parse::<f64>().ok()? * each.parse::<f64>().ok()?,
        None => value.parse::<f64>().ok()?,
    };

    match unit.as_str() {
        "kg" => Some(amount),
        "g" | "ml" => Some(amount / 1000.0),
        "oz" => Some(amount * KG_PER_OUNCE),
        _ => None,
    }
}

/// Pull a number out of a price such as `£39.99`.
pub fn extract_price(raw: &str) -> Option<f64> {
    let value: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    value.parse().ok()
}

// =============================================================================
// Stores
// =============================================================================

/// Keep only the digits of a staff count (`"J78"` becomes `78`).
///
/// Returns `None` when no digit is left.
pub fn extract_staff_number(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Drop the noise before the first uppercase letter (`"eeEurope"` becomes
/// `"Europe"`). A value with no uppercase letter is returned unchanged.
pub fn degarble_continent(raw: &str) -> String {
    match raw.find(|c: char| c.is_uppercase()) {
        Some(start) => raw[start..].to_string(),
        None => raw.to_string(),
    }
}

// =============================================================================
// Users
// =============================================================================

/// Collapse a doubled `@` into a single one.
pub fn dedupe_email_at(raw: &str) -> String {
    raw.replace("@@", "@")
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// `GGB` is a known corruption of `GB`; other codes pass through.
pub fn normalize_country_code(raw: &str) -> String {
    if raw == "GGB" {
        "GB".to_string()
    } else {
        raw.to_string()
    }
}

// =============================================================================
// Cards
// =============================================================================

/// Remove the `?` characters that pollute card numbers.
pub fn strip_card_number(raw: &str) -> String {
    raw.chars().filter(|c| *c != '?').collect()
}

pub fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Rewrite the `/32` expiry typo to `/01`.
pub fn fix_expiry_typo(raw: &str) -> String {
    raw.replace("/32", "/01")
}
