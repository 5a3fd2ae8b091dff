//! Value coercion shared by the HTML and spreadsheet scanners.
//!
//! Everything here is a pure function. Numeric and date coercion never fail: a bad
//! number becomes 0 and an unrecognised date becomes the caller's reference date.

use chrono::{NaiveDate, NaiveDateTime};
use models::Side;
use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\.(\d{2})\.(\d{2})|(\d{4})-(\d{2})-(\d{2})").expect("valid date regex")
});

/// A worksheet cell reduced to the shapes the scanners care about.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Temporal(NaiveDateTime),
    Empty,
}

impl CellValue {
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Temporal(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Empty => String::new(),
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Number(n) if n.is_finite() => *n,
            CellValue::Text(s) => parse_number(s),
            _ => 0.0,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Strip markup, decode entities and trim.
pub fn extract_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    let decoded = html_escape::decode_html_entities(&stripped).replace('\u{00A0}', " ");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove all whitespace, turn every comma into a dot and parse the longest numeric
/// prefix.
///
/// `"1234,56"` is 1234.56. Mixed separators are not repaired: `"1.234,56"` and
/// `"1,234.56"` both become `"1.234.56"` and read as 1.234. Trailing text such as a
/// currency code is ignored. No numeric prefix at all yields 0.
pub fn parse_number(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    NUMBER_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// First `YYYY.MM.DD` or `YYYY-MM-DD` in the text that names a real day.
pub fn find_date(text: &str) -> Option<NaiveDate> {
    DATE_RE.captures_iter(text).find_map(|caps| {
        let (y, m, d) = if caps.get(1).is_some() {
            (caps.get(1)?, caps.get(2)?, caps.get(3)?)
        } else {
            (caps.get(4)?, caps.get(5)?, caps.get(6)?)
        };

        NaiveDate::from_ymd_opt(
            y.as_str().parse().ok()?,
            m.as_str().parse().ok()?,
            d.as_str().parse().ok()?,
        )
    })
}

/// Like [`find_date`], but falls back to `today` instead of failing.
pub fn canonical_date(text: &str, today: NaiveDate) -> NaiveDate {
    match find_date(text) {
        Some(d) => d,
        None => {
            tracing::warn!("no recognisable date in '{}', using {}", text, today);
            today
        }
    }
}

pub fn canonical_side(text: &str) -> Side {
    Side::from_token(text)
}
