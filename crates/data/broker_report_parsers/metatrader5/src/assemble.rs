use chrono::NaiveDate;
use models::{ParsedTrade, TradeField};

use crate::error::RowRejection;
use crate::normalize::{canonical_date, canonical_side};
use crate::SkippedRow;

/// One positions-table row after cell coercion, before any checks.
#[derive(Debug, Clone, Default)]
pub struct RawPosition {
    pub open_time: String,
    pub symbol: String,
    pub side: String,
    pub volume: f64,
    pub open_price: f64,
    pub close_time: String,
    pub close_price: f64,
    pub commission: f64,
    pub swap: f64,
    pub profit: f64,
}

/// What a scanner hands back before final validation. Row numbers are 1-based
/// within the scanned table or worksheet.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub accepted: Vec<(usize, ParsedTrade)>,
    pub skipped: Vec<SkippedRow>,
}

impl ScanOutcome {
    pub fn push(&mut self, row: usize, result: Result<ParsedTrade, RowRejection>) {
        match result {
            Ok(trade) => self.accepted.push((row, trade)),
            Err(reason) => {
                tracing::debug!("skipping row {}: {}", row, reason);
                self.skipped.push(SkippedRow { row, reason });
            }
        }
    }
}

/// Builds a trade from a coerced row.
///
/// An empty symbol or close time, or a non-positive price or volume, means an open
/// position or a corrupt row rather than a completed trade.
pub fn assemble(raw: RawPosition, today: NaiveDate) -> Result<ParsedTrade, RowRejection> {
    let symbol = raw.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(RowRejection::MissingField(TradeField::Symbol));
    }
    if !(raw.open_price > 0.0) {
        return Err(RowRejection::MissingField(TradeField::OpenPrice));
    }
    if !(raw.close_price > 0.0) {
        return Err(RowRejection::MissingField(TradeField::ClosePrice));
    }
    if !(raw.volume > 0.0) {
        return Err(RowRejection::MissingField(TradeField::Volume));
    }
    if raw.close_time.trim().is_empty() {
        return Err(RowRejection::MissingField(TradeField::CloseTime));
    }

    Ok(ParsedTrade {
        symbol,
        side: canonical_side(&raw.side),
        entry: raw.open_price,
        exit: raw.close_price,
        quantity: raw.volume,
        entry_date: canonical_date(&raw.open_time, today),
        exit_date: canonical_date(&raw.close_time, today),
        profit_loss: raw.profit,
        commission: raw.commission,
        swap: raw.swap,
    })
}
