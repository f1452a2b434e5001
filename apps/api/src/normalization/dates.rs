//! Date normalization to the EHS "Mon YYYY" form.
//!
//! Accepts ISO-ish numeric forms (`2020-01`, `2020-01-15`, `01/2020`), month
//! names and abbreviations (`January 2020`, `jan 2020`, `Sept. 2020`) and free
//! text that contains exactly one month token and one four-digit year.

use chrono::Month;
use lazy_static::lazy_static;
use regex::Regex;

/// Canonical end date for roles that are still running.
pub const PRESENT: &str = "Present";

const PRESENT_TOKENS: &[&str] = &[
    "present", "current", "currently", "now", "ongoing", "to date", "till date", "today",
];

lazy_static! {
    static ref CANONICAL: Regex =
        Regex::new(r"^(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) \d{4}$")
            .expect("valid canonical date regex");
    static ref YEAR_FIRST: Regex =
        Regex::new(r"^(\d{4})[-/.](\d{1,2})(?:[-/.](\d{1,2}))?$").expect("valid regex");
    static ref MONTH_FIRST: Regex = Regex::new(r"^(\d{1,2})[-/.](\d{4})$").expect("valid regex");
    static ref MONTH_TOKEN: Regex = Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b\.?"
    )
    .expect("valid month regex");
    static ref YEAR_TOKEN: Regex = Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").expect("valid regex");
}

/// Result of normalizing one date string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    /// Already in canonical form (or already `Present` for an end date).
    Canonical,
    /// Rewritten to the contained canonical value.
    Normalized(String),
    /// Not recognisable; the input must be passed through unchanged.
    Unrecognized,
}

/// Normalizes a start or end date. `Present`-like tokens are only accepted
/// for end dates.
pub fn normalize_date(raw: &str, is_end_date: bool) -> DateOutcome {
    let trimmed = raw.trim();

    if CANONICAL.is_match(trimmed) {
        return if trimmed == raw {
            DateOutcome::Canonical
        } else {
            DateOutcome::Normalized(trimmed.to_string())
        };
    }

    if is_end_date {
        let lower = trimmed.to_lowercase();
        if PRESENT_TOKENS.contains(&lower.as_str()) {
            return if raw == PRESENT {
                DateOutcome::Canonical
            } else {
                DateOutcome::Normalized(PRESENT.to_string())
            };
        }
    }

    match parse_year_month(trimmed) {
        Some((year, month)) => match format_month_year(year, month) {
            Some(formatted) => DateOutcome::Normalized(formatted),
            None => DateOutcome::Unrecognized,
        },
        None => DateOutcome::Unrecognized,
    }
}

/// True for "Mon YYYY" values.
pub fn is_canonical_date(value: &str) -> bool {
    CANONICAL.is_match(value)
}

/// True for "Mon YYYY" values and `Present`.
pub fn is_canonical_end_date(value: &str) -> bool {
    value == PRESENT || CANONICAL.is_match(value)
}

/// Sort key for reverse-chronological ordering. `Present` sorts after every
/// real date; unrecognisable values have no key.
pub fn sort_key(value: &str) -> Option<(i32, u32)> {
    if value.trim() == PRESENT {
        return Some((i32::MAX, 12));
    }
    parse_year_month(value.trim())
}

fn parse_year_month(text: &str) -> Option<(i32, u32)> {
    if let Some(caps) = YEAR_FIRST.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        return valid(year, month);
    }

    if let Some(caps) = MONTH_FIRST.captures(text) {
        let month = caps[1].parse().ok()?;
        let year = caps[2].parse().ok()?;
        return valid(year, month);
    }

    // Free text: exactly one month token and exactly one year.
    let months: Vec<_> = MONTH_TOKEN.captures_iter(text).collect();
    let years: Vec<_> = YEAR_TOKEN.find_iter(text).collect();
    if months.len() != 1 || years.len() != 1 {
        return None;
    }
    let month = month_number(&months[0][1])?;
    let year = years[0].as_str().parse().ok()?;
    valid(year, month)
}

fn valid(year: i32, month: u32) -> Option<(i32, u32)> {
    ((1..=12).contains(&month) && (1800..=2100).contains(&year)).then_some((year, month))
}

fn month_number(token: &str) -> Option<u32> {
    let prefix: String = token.to_lowercase().chars().take(3).collect();
    let n = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

fn format_month_year(year: i32, month: u32) -> Option<String> {
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    let abbrev: String = month.name().chars().take(3).collect();
    Some(format!("{abbrev} {year}"))
}
