use models::TradeField;
use thiserror::Error;

/// Whole-document failure. The caller should treat the import as failed.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No Positions section found in MetaTrader 5 HTML report")]
    SectionNotFound,

    #[error("No header row found in MetaTrader 5 Excel file")]
    NoHeaderRow,

    #[error("No valid trades found in MetaTrader 5 report")]
    NoTradesFound,

    #[error("Failed to parse MetaTrader 5 HTML report: {0}")]
    Html(String),

    #[error("Failed to parse MetaTrader 5 Excel file: {0}")]
    Workbook(String),

    #[error("Unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single row was dropped. Never aborts a scan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowRejection {
    #[error("only {found} visible cells, expected at least {expected}")]
    TooFewCells { found: usize, expected: usize },

    #[error("missing or non-positive {0}")]
    MissingField(TradeField),

    #[error("failed final validation")]
    Invalid,
}
