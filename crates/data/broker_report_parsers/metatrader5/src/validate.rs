use models::ParsedTrade;

/// The output contract every scanner guarantees to callers.
pub fn is_valid(trade: &ParsedTrade) -> bool {
    !trade.symbol.trim().is_empty() && trade.entry > 0.0 && trade.exit > 0.0 && trade.quantity > 0.0
}

/// Keep only trades satisfying [`is_valid`], preserving order. Idempotent.
pub fn validate(trades: Vec<ParsedTrade>) -> Vec<ParsedTrade> {
    trades.into_iter().filter(is_valid).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use models::Side;

    fn trade(symbol: &str, entry: f64, exit: f64, quantity: f64) -> ParsedTrade {
        let d = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        ParsedTrade {
            symbol: symbol.to_string(),
            side: Side::Sell,
            entry,
            exit,
            quantity,
            entry_date: d,
            exit_date: d,
            profit_loss: -12.5,
            commission: 0.0,
            swap: 0.0,
        }
    }

    #[test]
    fn test_validate_filters_invalid_trades() {
        let trades = vec![
            trade("EURUSD", 1.1, 1.2, 1.0),
            trade("", 1.1, 1.2, 1.0),
            trade("GBPUSD", 0.0, 1.2, 1.0),
            trade("USDJPY", 150.0, -1.0, 1.0),
            trade("XAUUSD", 2300.0, 2310.0, 0.0),
            trade("US30", 39000.0, 39010.0, f64::NAN),
            trade("BTCUSD", 60000.0, 61000.0, 0.01),
        ];

        let kept: Vec<String> = validate(trades).into_iter().map(|t| t.symbol).collect();
        assert_eq!(kept, vec!["EURUSD", "BTCUSD"]);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let trades = vec![
            trade("EURUSD", 1.1, 1.2, 1.0),
            trade(" ", 1.1, 1.2, 1.0),
            trade("BTCUSD", 60000.0, 61000.0, 0.01),
        ];

        let once = validate(trades);
        let twice = validate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_validate_empty() {
        assert!(validate(Vec::new()).is_empty());
    }
}
