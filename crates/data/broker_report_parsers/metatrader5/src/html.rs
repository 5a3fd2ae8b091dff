//! Scanner for the MT5 "Trade History Report" HTML export.
//!
//! The export is not a well-formed document across terminal builds, so the scanner
//! works on the raw markup: it cuts out the Positions section between its heading and
//! the Orders heading, then reads every row positionally.

use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_16LE, WINDOWS_1252};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use crate::assemble::{assemble, RawPosition, ScanOutcome};
use crate::error::{ParseError, RowRejection};
use crate::normalize::{extract_text, parse_number};

/// Visible cells in a complete positions row.
pub const MIN_POSITION_CELLS: usize = 13;

const COL_OPEN_TIME: usize = 0;
const COL_SYMBOL: usize = 2;
const COL_TYPE: usize = 3;
const COL_VOLUME: usize = 4;
const COL_OPEN_PRICE: usize = 5;
const COL_CLOSE_TIME: usize = 8;
const COL_CLOSE_PRICE: usize = 9;
const COL_COMMISSION: usize = 10;
const COL_SWAP: usize = 11;
const COL_PROFIT: usize = 12;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:b|th)\b[^>]*>(.*?)</(?:b|th)\s*>").expect("valid heading regex")
});
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid row regex"));
static HEADER_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<th\b").expect("valid th regex"));
static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<td\b([^>]*)>(.*?)</td\s*>").expect("valid cell regex")
});
static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid class regex")
});

/// Decode raw report bytes into text.
///
/// MT5 saves HTML reports as UTF-16LE with a BOM; older builds and hand-saved copies are
/// UTF-8 or a Windows code page.
pub fn decode_report_bytes(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if looks_like_utf16le(bytes) {
        let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
        return text.into_owned();
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

// ASCII markup in UTF-16LE has a NUL in every odd byte.
fn looks_like_utf16le(bytes: &[u8]) -> bool {
    let pairs = bytes.len() / 2;
    if pairs < 4 {
        return false;
    }
    let odd_nuls = bytes.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
    odd_nuls * 2 > pairs
}

/// Byte range of the first `<b>`/`<th>` heading at or after `from` whose text contains
/// `needle` (lower-case).
fn find_heading(html: &str, from: usize, needle: &str) -> Option<Range<usize>> {
    HEADING_RE.captures_iter(&html[from..]).find_map(|caps| {
        let whole = caps.get(0)?;
        let text = extract_text(caps.get(1)?.as_str()).to_lowercase();
        if text.contains(needle) {
            Some(from + whole.start()..from + whole.end())
        } else {
            None
        }
    })
}

/// The markup between the Positions heading and the Orders heading (or end of document).
pub fn positions_section(html: &str) -> Result<&str, ParseError> {
    let positions = find_heading(html, 0, "positions").ok_or(ParseError::SectionNotFound)?;
    let end = find_heading(html, positions.end, "orders")
        .map(|r| r.start)
        .unwrap_or(html.len());
    Ok(&html[positions.end..end])
}

fn is_hidden(attrs: &str) -> bool {
    CLASS_RE
        .captures(attrs)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| {
            m.as_str()
                .split_whitespace()
                .any(|class| class.eq_ignore_ascii_case("hidden"))
        })
        .unwrap_or(false)
}

/// Text of each visible `<td>` in the row, in document order.
pub fn visible_cells(row_html: &str) -> Vec<String> {
    CELL_RE
        .captures_iter(row_html)
        .filter(|caps| !caps.get(1).map(|a| is_hidden(a.as_str())).unwrap_or(false))
        .map(|caps| caps.get(2).map(|m| extract_text(m.as_str())).unwrap_or_default())
        .collect()
}

fn position_from_cells(cells: &[String]) -> Result<RawPosition, RowRejection> {
    if cells.len() < MIN_POSITION_CELLS {
        return Err(RowRejection::TooFewCells {
            found: cells.len(),
            expected: MIN_POSITION_CELLS,
        });
    }

    Ok(RawPosition {
        open_time: cells[COL_OPEN_TIME].clone(),
        symbol: cells[COL_SYMBOL].clone(),
        side: cells[COL_TYPE].clone(),
        volume: parse_number(&cells[COL_VOLUME]),
        open_price: parse_number(&cells[COL_OPEN_PRICE]),
        close_time: cells[COL_CLOSE_TIME].clone(),
        close_price: parse_number(&cells[COL_CLOSE_PRICE]),
        commission: parse_number(&cells[COL_COMMISSION]),
        swap: parse_number(&cells[COL_SWAP]),
        profit: parse_number(&cells[COL_PROFIT]),
    })
}

/// Scan the Positions table of an MT5 HTML report.
pub fn scan_html(html: &str, today: NaiveDate) -> Result<ScanOutcome, ParseError> {
    let section = positions_section(html)?;
    let mut outcome = ScanOutcome::default();

    for (idx, caps) in ROW_RE.captures_iter(section).enumerate() {
        let row_no = idx + 1;
        let row_html = caps.get(1).map(|m| m.as_str()).unwrap_or("");

        if HEADER_CELL_RE.is_match(row_html) {
            continue;
        }

        let cells = visible_cells(row_html);
        if cells.iter().all(|c| c.is_empty()) {
            // spacer row
            continue;
        }

        outcome.push(
            row_no,
            position_from_cells(&cells).and_then(|raw| assemble(raw, today)),
        );
    }

    if outcome.accepted.is_empty() {
        return Err(ParseError::NoTradesFound);
    }

    tracing::info!(
        "HTML positions scan: {} trades, {} rows skipped",
        outcome.accepted.len(),
        outcome.skipped.len()
    );

    Ok(outcome)
}
