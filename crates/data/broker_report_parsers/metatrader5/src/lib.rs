//! MetaTrader 5 broker-report import.
//!
//! Turns the two report formats MT5 can export, the HTML "Trade History Report" and the
//! Excel workbook, into validated [`ParsedTrade`] records. All input is handed in already
//! loaded; [`MetaTrader5Parser::parse_file`] is the only entry point that touches disk.
//!
//! Whole-document problems are [`ParseError`]s. Individual rows that cannot be read are
//! dropped and reported in [`ImportReport::skipped`], so one bad row never costs the
//! whole import.

pub mod assemble;
pub mod error;
pub mod html;
pub mod normalize;
pub mod validate;
pub mod xlsx;

use chrono::{Local, NaiveDate};
use std::path::Path;

pub use crate::error::{ParseError, RowRejection};
pub use crate::validate::{is_valid, validate};
pub use models::{ImportSettings, ParsedTrade, Side, TradeField};

use crate::assemble::ScanOutcome;

pub const PARSER_NAME: &str = "metatrader5";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Spreadsheet,
}

impl ReportFormat {
    /// Format implied by the file extension, if it is one we know.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "htm" | "html" => Some(ReportFormat::Html),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(ReportFormat::Spreadsheet),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "text/html" | "application/xhtml+xml" => Some(ReportFormat::Html),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(ReportFormat::Spreadsheet),
            _ => None,
        }
    }

    /// Workbooks are ZIP (xlsx, ods) or OLE2 (xls) containers; anything else is read as HTML.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE2_MAGIC) {
            ReportFormat::Spreadsheet
        } else {
            ReportFormat::Html
        }
    }
}

/// A row the scanner dropped, with its 1-based position in the table or worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: RowRejection,
}

/// Validated trades plus the rows that didn't make it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportReport {
    pub trades: Vec<ParsedTrade>,
    pub skipped: Vec<SkippedRow>,
}

impl ImportReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.skipped
            .iter()
            .map(|s| format!("row {}: {}", s.row, s.reason))
            .collect()
    }
}

pub struct MetaTrader5Parser {
    pub settings: ImportSettings,
    pub reference_date: Option<NaiveDate>,
}

impl MetaTrader5Parser {
    pub fn new() -> Self {
        Self {
            settings: ImportSettings::default(),
            reference_date: None,
        }
    }

    pub fn with_settings(mut self, settings: ImportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Date used when a row carries no readable date. Defaults to the local current date.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn parse_html(&self, html: &str) -> Result<ImportReport, ParseError> {
        let outcome = html::scan_html(html, self.today())?;
        finish(outcome)
    }

    pub fn parse_html_bytes(&self, bytes: &[u8]) -> Result<ImportReport, ParseError> {
        if ReportFormat::sniff(bytes) == ReportFormat::Spreadsheet {
            return Err(ParseError::Html(
                "file is a spreadsheet workbook, not an HTML report".to_string(),
            ));
        }
        self.parse_html(&html::decode_report_bytes(bytes))
    }

    pub fn parse_workbook(&self, bytes: &[u8]) -> Result<ImportReport, ParseError> {
        let rows = xlsx::read_workbook(bytes)?;
        let outcome = xlsx::scan_rows(&rows, &self.settings, self.today())?;
        finish(outcome)
    }

    pub fn parse_bytes(&self, bytes: &[u8], format: ReportFormat) -> Result<ImportReport, ParseError> {
        match format {
            ReportFormat::Html => self.parse_html_bytes(bytes),
            ReportFormat::Spreadsheet => self.parse_workbook(bytes),
        }
    }

    /// Read a report from disk. The extension picks the format; files without one are
    /// sniffed.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportReport, ParseError> {
        let path = path.as_ref();
        let format = match ReportFormat::from_path(path) {
            Some(f) => Some(f),
            None if path.extension().is_some() => {
                return Err(ParseError::UnsupportedFormat(path.display().to_string()));
            }
            None => None,
        };

        let bytes = std::fs::read(path)?;
        let format = format.unwrap_or_else(|| ReportFormat::sniff(&bytes));
        tracing::debug!("parsing {} as {:?}", path.display(), format);

        self.parse_bytes(&bytes, format)
    }
}

impl Default for MetaTrader5Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Final validation pass shared by both scanners.
fn finish(outcome: ScanOutcome) -> Result<ImportReport, ParseError> {
    let mut report = ImportReport {
        trades: Vec::with_capacity(outcome.accepted.len()),
        skipped: outcome.skipped,
    };

    for (row, trade) in outcome.accepted {
        if is_valid(&trade) {
            report.trades.push(trade);
        } else {
            report.skipped.push(SkippedRow {
                row,
                reason: RowRejection::Invalid,
            });
        }
    }
    report.skipped.sort_by_key(|s| s.row);

    if report.trades.is_empty() {
        return Err(ParseError::NoTradesFound);
    }

    Ok(report)
}

/// Drop the trades the user deselected. `excluded` holds 1-based positions as shown
/// in a review list; unknown positions are ignored.
pub fn deselect(trades: Vec<ParsedTrade>, excluded: &[usize]) -> Vec<ParsedTrade> {
    trades
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !excluded.contains(&(idx + 1)))
        .map(|(_, t)| t)
        .collect()
}
