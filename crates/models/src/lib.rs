use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_HEADER_SCAN_ROWS: usize = 20;

// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
	Buy,
	Sell,
}

impl Side {
	/// Canonicalizes a broker direction token.
	///
	/// `BUY`, `LONG` and `IN` (any case) are buys. Anything else, including an
	/// empty token, is a sell.
	pub fn from_token(token: &str) -> Side {
		let t = token.trim();
		if t.eq_ignore_ascii_case("buy") || t.eq_ignore_ascii_case("long") || t.eq_ignore_ascii_case("in") {
			Side::Buy
		} else {
			Side::Sell
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Side::Buy => "BUY",
			Side::Sell => "SELL",
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.as_str())
	}
}

// Logical columns of a positions table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeField {
	OpenTime,
	Symbol,
	Side,
	Volume,
	OpenPrice,
	CloseTime,
	ClosePrice,
	Commission,
	Swap,
	Profit,
}

impl TradeField {
	pub const ALL: [TradeField; 10] = [
		TradeField::OpenTime,
		TradeField::Symbol,
		TradeField::Side,
		TradeField::Volume,
		TradeField::OpenPrice,
		TradeField::CloseTime,
		TradeField::ClosePrice,
		TradeField::Commission,
		TradeField::Swap,
		TradeField::Profit,
	];

	/// Key used for this field in `ImportSettings::column_synonyms`.
	pub fn key(&self) -> &'static str {
		match self {
			TradeField::OpenTime => "open_time",
			TradeField::Symbol => "symbol",
			TradeField::Side => "side",
			TradeField::Volume => "volume",
			TradeField::OpenPrice => "open_price",
			TradeField::CloseTime => "close_time",
			TradeField::ClosePrice => "close_price",
			TradeField::Commission => "commission",
			TradeField::Swap => "swap",
			TradeField::Profit => "profit",
		}
	}
}

impl fmt::Display for TradeField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.key())
	}
}

/// A closed position read from a broker report, ready to be shown to the user
/// and submitted as a journal trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTrade {
	pub symbol: String,
	pub side: Side,
	pub entry: f64,
	pub exit: f64,
	pub quantity: f64,
	pub entry_date: NaiveDate,
	pub exit_date: NaiveDate,
	pub profit_loss: f64,
	#[serde(default)]
	pub commission: f64,
	#[serde(default)]
	pub swap: f64,
}

impl ParsedTrade {
	/// Deterministic fingerprint of the closed position.
	///
	/// Re-importing the same report yields the same ids, which is what the journal
	/// uses to skip duplicates.
	pub fn trade_id(&self) -> String {
		let s = format!(
			"{}|{}|{}|{}|{:.8}|{:.8}|{:.8}|{:.8}",
			self.symbol,
			self.side,
			self.entry_date.format("%Y-%m-%d"),
			self.exit_date.format("%Y-%m-%d"),
			self.entry,
			self.exit,
			self.quantity,
			self.profit_loss
		);

		let mut hasher = Sha256::new();
		hasher.update(s.as_bytes());
		let hash = hasher.finalize();

		format!("MT5-{}", hex::encode(&hash[..12]))
	}

	pub fn to_json(&self) -> Value {
		json!({
			"tradeId": self.trade_id(),
			"source": "mt5",
			"symbol": self.symbol,
			"side": self.side.as_str(),
			"entry": self.entry,
			"exit": self.exit,
			"quantity": self.quantity,
			"entryDate": self.entry_date.format("%Y-%m-%d").to_string(),
			"exitDate": self.exit_date.format("%Y-%m-%d").to_string(),
			"profitLoss": self.profit_loss,
			"commission": self.commission,
			"swap": self.swap
		})
	}
}

// Settings models
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
	pub header_scan_rows: usize,
	/// Extra header names per field key (see `TradeField::key`), tried after the built-in ones.
	pub column_synonyms: HashMap<String, Vec<String>>,
	pub journal_path: Option<PathBuf>,
}

impl Default for ImportSettings {
	fn default() -> Self {
		Self {
			header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
			column_synonyms: HashMap::new(),
			journal_path: None,
		}
	}
}

impl ImportSettings {
	pub fn extra_synonyms(&self, field: TradeField) -> &[String] {
		self.column_synonyms
			.get(field.key())
			.map(|v| v.as_slice())
			.unwrap_or(&[])
	}
}
