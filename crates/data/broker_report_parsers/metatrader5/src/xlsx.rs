//! Scanner for MT5 reports saved as Excel workbooks.
//!
//! Column order and wording drift between terminal versions and locales, so fields are
//! found by header name through ordered synonym lists instead of by position.

use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use models::{ImportSettings, TradeField};
use std::collections::HashMap;
use std::io::Cursor;

use crate::assemble::{assemble, RawPosition, ScanOutcome};
use crate::error::ParseError;
use crate::normalize::CellValue;

static EMPTY: CellValue = CellValue::Empty;

/// Built-in header synonyms per field, in priority order.
///
/// The number is which occurrence of the header to use: native MT5 exports carry two
/// "Time" and two "Price" columns (open first, close second).
fn builtin_synonyms(field: TradeField) -> &'static [(&'static str, usize)] {
    match field {
        TradeField::OpenTime => &[("open time", 0), ("opentime", 0), ("entry time", 0), ("time", 0)],
        TradeField::Symbol => &[("symbol", 0), ("instrument", 0), ("ticker", 0)],
        TradeField::Side => &[("type", 0), ("direction", 0), ("side", 0)],
        TradeField::Volume => &[
            ("volume", 0),
            ("lot", 0),
            ("lots", 0),
            ("size", 0),
            ("qty", 0),
            ("quantity", 0),
        ],
        TradeField::OpenPrice => &[
            ("open price", 0),
            ("entry price", 0),
            ("price", 0),
            ("openprice", 0),
        ],
        TradeField::CloseTime => &[
            ("close time", 0),
            ("closetime", 0),
            ("exit time", 0),
            ("time", 1),
        ],
        TradeField::ClosePrice => &[
            ("close price", 0),
            ("exit price", 0),
            ("closeprice", 0),
            ("price", 1),
        ],
        TradeField::Commission => &[("commission", 0), ("comm", 0), ("fee", 0), ("fees", 0)],
        TradeField::Swap => &[("swap", 0), ("swaps", 0), ("rollover", 0)],
        TradeField::Profit => &[("profit", 0), ("p/l", 0), ("pnl", 0), ("profit/loss", 0)],
    }
}

/// Calendar value of a typed date cell, honouring the workbook's 1900 or 1904 date
/// system. Durations and out-of-range serials have none.
pub fn excel_datetime(dt: &ExcelDateTime) -> Option<NaiveDateTime> {
    let serial = dt.as_f64();
    if !dt.is_datetime() || !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let (y, mo, d, h, mi, s, ms) = dt.to_ymd_hms_milli();
    NaiveDate::from_ymd_opt(y.into(), mo.into(), d.into())?.and_hms_milli_opt(
        h.into(),
        mi.into(),
        s.into(),
        ms.into(),
    )
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            Data::DateTime(dt) => excel_datetime(dt)
                .map(CellValue::Temporal)
                .unwrap_or(CellValue::Empty),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            _ => CellValue::Empty,
        }
    }
}

/// Rows of a worksheet, each starting at the first used column. Leading empty rows are
/// kept so row indexes match worksheet row numbers.
pub fn sheet_rows(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    let row_offset = range.start().map(|(r, _)| r as usize).unwrap_or(0);

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
    rows.extend(range.rows().map(|row| row.iter().map(CellValue::from).collect::<Vec<_>>()));
    rows
}

fn has_data(rows: &[Vec<CellValue>]) -> bool {
    rows.iter().any(|r| r.iter().any(|c| !c.is_blank()))
}

/// Decode a workbook (XLSX, XLS, XLSB or ODS) and return the first worksheet that holds
/// any data, or the first worksheet if none does.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Workbook(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(ParseError::Workbook("workbook has no worksheets".to_string()));
    }

    let mut first: Option<Vec<Vec<CellValue>>> = None;
    for sheet_name in sheet_names {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("cannot read sheet '{}': {}", sheet_name, e);
                continue;
            }
        };

        let rows = sheet_rows(&range);
        if has_data(&rows) {
            tracing::debug!("using sheet '{}'", sheet_name);
            return Ok(rows);
        }
        if first.is_none() {
            first = Some(rows);
        }
    }

    Ok(first.unwrap_or_default())
}

/// Header text (lower-cased, trimmed) to every column carrying it, left to right.
#[derive(Debug, Default)]
pub struct HeaderMap {
    columns: HashMap<String, Vec<usize>>,
}

impl HeaderMap {
    pub fn from_row(row: &[CellValue]) -> Self {
        let mut columns: HashMap<String, Vec<usize>> = HashMap::new();
        for (c_idx, cell) in row.iter().enumerate() {
            let name = cell.as_text().to_lowercase();
            if !name.is_empty() {
                columns.entry(name).or_default().push(c_idx);
            }
        }
        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn lookup(&self, name: &str, occurrence: usize) -> Option<usize> {
        self.columns.get(name).and_then(|cols| cols.get(occurrence)).copied()
    }

    /// First synonym present wins; settings synonyms are tried after the built-in ones.
    pub fn resolve(&self, field: TradeField, extra: &[String]) -> Option<usize> {
        builtin_synonyms(field)
            .iter()
            .find_map(|(name, occurrence)| self.lookup(name, *occurrence))
            .or_else(|| {
                extra
                    .iter()
                    .find_map(|name| self.lookup(&name.trim().to_lowercase(), 0))
            })
    }
}

/// Index of the header row: the row after the first "positions" banner within the
/// first `scan_rows` rows, or the first row when there is no banner.
pub fn find_header_row(rows: &[Vec<CellValue>], scan_rows: usize) -> usize {
    rows.iter()
        .take(scan_rows)
        .position(|row| {
            row.iter()
                .any(|c| c.as_text().to_lowercase().contains("positions"))
        })
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

fn cell(row: &[CellValue], col: Option<usize>) -> &CellValue {
    col.and_then(|c| row.get(c)).unwrap_or(&EMPTY)
}

/// Scan the positions table of a worksheet grid.
pub fn scan_rows(
    rows: &[Vec<CellValue>],
    settings: &ImportSettings,
    today: NaiveDate,
) -> Result<ScanOutcome, ParseError> {
    let header_idx = find_header_row(rows, settings.header_scan_rows);
    let headers = rows
        .get(header_idx)
        .map(|row| HeaderMap::from_row(row))
        .unwrap_or_default();

    if headers.is_empty() {
        return Err(ParseError::NoHeaderRow);
    }

    let columns: HashMap<TradeField, usize> = TradeField::ALL
        .iter()
        .filter_map(|f| {
            headers
                .resolve(*f, settings.extra_synonyms(*f))
                .map(|col| (*f, col))
        })
        .collect();

    for f in TradeField::ALL.iter().filter(|f| !columns.contains_key(*f)) {
        tracing::debug!("no column found for {}", f);
    }

    let col = |f: TradeField| columns.get(&f).copied();
    let mut outcome = ScanOutcome::default();

    for (r_idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        let row_no = r_idx + 1;
        let first = row.first().map(|c| c.as_text()).unwrap_or_default();

        // Blank separator rows; data may continue below.
        if first.is_empty() {
            continue;
        }

        let first_lower = first.to_lowercase();
        if first_lower.contains("orders") {
            tracing::debug!("row {} starts the orders section", row_no);
            continue;
        }
        if first_lower == "symbol" || first_lower == "type" {
            continue;
        }

        let raw = RawPosition {
            open_time: cell(row, col(TradeField::OpenTime)).as_text(),
            symbol: cell(row, col(TradeField::Symbol)).as_text(),
            side: cell(row, col(TradeField::Side)).as_text(),
            volume: cell(row, col(TradeField::Volume)).as_number(),
            open_price: cell(row, col(TradeField::OpenPrice)).as_number(),
            close_time: cell(row, col(TradeField::CloseTime)).as_text(),
            close_price: cell(row, col(TradeField::ClosePrice)).as_number(),
            commission: cell(row, col(TradeField::Commission)).as_number(),
            swap: cell(row, col(TradeField::Swap)).as_number(),
            profit: cell(row, col(TradeField::Profit)).as_number(),
        };

        outcome.push(row_no, assemble(raw, today));
    }

    if outcome.accepted.is_empty() {
        return Err(ParseError::NoTradesFound);
    }

    tracing::info!(
        "Spreadsheet positions scan: {} trades, {} rows skipped",
        outcome.accepted.len(),
        outcome.skipped.len()
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowRejection;
    use calamine::ExcelDateTimeType;
    use models::Side;

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mt5_headers() -> Vec<CellValue> {
        [
            "Time", "Position", "Symbol", "Type", "Volume", "Price", "S / L", "T / P", "Time",
            "Price", "Commission", "Swap", "Profit",
        ]
        .iter()
        .map(|h| t(h))
        .collect()
    }

    fn mt5_sheet() -> Vec<Vec<CellValue>> {
        vec![
            vec![t("Trade History Report")],
            vec![t("Name:"), CellValue::Empty, CellValue::Empty, t("John Doe")],
            vec![t("Positions")],
            mt5_headers(),
            vec![
                t("2024.06.27 09:00:00"),
                n(5012345.0),
                t("EURUSD"),
                t("buy"),
                n(1.5),
                n(1.09),
                CellValue::Empty,
                CellValue::Empty,
                t("2024.06.28 14:15:00"),
                n(1.095),
                n(-7.0),
                n(0.0),
                n(75.0),
            ],
            vec![CellValue::Empty, t("stray note")],
            vec![
                t("2024.07.01 10:00:00"),
                n(5012346.0),
                t("gbpjpy"),
                t("sell"),
                t("0,5"),
                t("203,10"),
                CellValue::Empty,
                CellValue::Empty,
                t("2024.07.02 11:30:00"),
                t("202,60"),
                n(-2.5),
                t("-0,8"),
                t("155,3"),
            ],
            vec![t("Orders")],
            [
                "Open Time", "Order", "Symbol", "Type", "Volume", "Price", "S / L", "T / P",
                "Time", "State", "Comment",
            ]
            .iter()
            .map(|h| t(h))
            .collect(),
            vec![
                t("2024.06.27 09:00:00"),
                n(7000001.0),
                t("EURUSD"),
                t("buy"),
                t("1.5 / 1.5"),
                t("market"),
                CellValue::Empty,
                CellValue::Empty,
                t("2024.06.27 09:00:00"),
                t("filled"),
                CellValue::Empty,
            ],
        ]
    }

    #[test]
    fn test_scan_native_mt5_layout() {
        let outcome = scan_rows(&mt5_sheet(), &ImportSettings::default(), today()).unwrap();

        assert_eq!(outcome.accepted.len(), 2);

        let (row, eur) = &outcome.accepted[0];
        assert_eq!(*row, 5);
        assert_eq!(eur.symbol, "EURUSD");
        assert_eq!(eur.side, Side::Buy);
        assert_eq!(eur.entry, 1.09);
        assert_eq!(eur.exit, 1.095);
        assert_eq!(eur.quantity, 1.5);
        assert_eq!(eur.commission, -7.0);
        assert_eq!(eur.profit_loss, 75.0);
        assert_eq!(eur.entry_date, day(2024, 6, 27));
        assert_eq!(eur.exit_date, day(2024, 6, 28));

        let (_, gbp) = &outcome.accepted[1];
        assert_eq!(gbp.symbol, "GBPJPY");
        assert_eq!(gbp.side, Side::Sell);
        assert_eq!(gbp.quantity, 0.5);
        assert_eq!(gbp.entry, 203.1);
        assert_eq!(gbp.exit, 202.6);
        assert_eq!(gbp.swap, -0.8);
        assert_eq!(gbp.profit_loss, 155.3);

        // the orders header and the order row fall out on validity checks
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome
            .skipped
            .iter()
            .all(|s| matches!(s.reason, RowRejection::MissingField(_))));
    }

    #[test]
    fn test_synonym_headers_without_banner() {
        let rows = vec![
            [
                "Symbol", "Type", "Lot", "Entry Price", "Close Price", "Open Time", "Close Time",
                "Commission", "Swap", "Profit",
            ]
            .iter()
            .map(|h| t(h))
            .collect(),
            vec![
                t("US30"),
                t("Long"),
                n(2.0),
                n(39000.5),
                n(39100.0),
                t("2024-05-02 15:30"),
                t("2024-05-03 16:00"),
                n(0.0),
                n(-3.0),
                n(199.0),
            ],
        ];

        let outcome = scan_rows(&rows, &ImportSettings::default(), today()).unwrap();
        assert_eq!(outcome.accepted.len(), 1);
        let tr = &outcome.accepted[0].1;
        assert_eq!(tr.quantity, 2.0);
        assert_eq!(tr.entry, 39000.5);
        assert_eq!(tr.exit, 39100.0);
        assert_eq!(tr.side, Side::Buy);
        assert_eq!(tr.entry_date, day(2024, 5, 2));
        assert_eq!(tr.exit_date, day(2024, 5, 3));
    }

    #[test]
    fn test_settings_synonyms_extend_builtin_ones() {
        let rows = vec![
            vec![
                t("Instrument"),
                t("Richtung"),
                t("Menge"),
                t("Eröffnungskurs"),
                t("Schlusskurs"),
                t("Schlusszeit"),
            ],
            vec![
                t("DE40"),
                t("buy"),
                n(1.0),
                n(18000.0),
                n(18100.0),
                t("2024.03.04 12:00"),
            ],
        ];

        assert!(matches!(
            scan_rows(&rows, &ImportSettings::default(), today()),
            Err(ParseError::NoTradesFound)
        ));

        let mut settings = ImportSettings::default();
        for (key, name) in [
            ("side", "Richtung"),
            ("volume", "Menge"),
            ("open_price", "Eröffnungskurs"),
            ("close_price", "Schlusskurs"),
            ("close_time", "Schlusszeit"),
        ] {
            settings
                .column_synonyms
                .insert(key.to_string(), vec![name.to_string()]);
        }

        let outcome = scan_rows(&rows, &settings, today()).unwrap();
        let tr = &outcome.accepted[0].1;
        assert_eq!(tr.symbol, "DE40");
        assert_eq!(tr.exit, 18100.0);
        assert_eq!(tr.exit_date, day(2024, 3, 4));
        // no open time column at all
        assert_eq!(tr.entry_date, today());
    }

    #[test]
    fn test_temporal_cells() {
        let open = day(2024, 6, 27).and_hms_opt(9, 0, 0).unwrap();
        let close = day(2024, 6, 28).and_hms_opt(14, 15, 0).unwrap();
        let mut sheet = mt5_sheet();
        sheet[4][0] = CellValue::Temporal(open);
        sheet[4][8] = CellValue::Temporal(close);

        let outcome = scan_rows(&sheet, &ImportSettings::default(), today()).unwrap();
        assert_eq!(outcome.accepted[0].1.entry_date, day(2024, 6, 27));
        assert_eq!(outcome.accepted[0].1.exit_date, day(2024, 6, 28));
    }

    #[test]
    fn test_repeated_header_rows_are_skipped() {
        let mut rows = vec![
            vec![t("Symbol"), t("Volume"), t("Open Price"), t("Close Price"), t("Close Time")],
            vec![t("EURUSD"), n(1.0), n(1.1), n(1.2), t("2024.01.02")],
            vec![t("symbol"), t("volume"), t("open price"), t("close price"), t("close time")],
        ];
        rows.push(rows[1].clone());

        let outcome = scan_rows(&rows, &ImportSettings::default(), today()).unwrap();
        assert_eq!(outcome.accepted.len(), 2);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_banner_beyond_scan_window_is_ignored() {
        let mut rows: Vec<Vec<CellValue>> = vec![vec![t("Symbol"), t("Volume")]];
        rows.extend((0..25).map(|_| vec![t("filler")]));
        rows.push(vec![t("Positions")]);
        assert_eq!(find_header_row(&rows, 20), 0);
        assert_eq!(find_header_row(&rows, 30), 27);
    }

    #[test]
    fn test_empty_worksheet_has_no_header() {
        assert!(matches!(
            scan_rows(&[], &ImportSettings::default(), today()),
            Err(ParseError::NoHeaderRow)
        ));

        let banner_only = vec![vec![t("Positions")]];
        assert!(matches!(
            scan_rows(&banner_only, &ImportSettings::default(), today()),
            Err(ParseError::NoHeaderRow)
        ));
    }

    #[test]
    fn test_header_only_sheet_has_no_trades() {
        let rows = vec![mt5_headers()];
        assert!(matches!(
            scan_rows(&rows, &ImportSettings::default(), today()),
            Err(ParseError::NoTradesFound)
        ));
    }

    #[test]
    fn test_header_map_keeps_repeated_columns() {
        let map = HeaderMap::from_row(&mt5_headers());
        assert_eq!(map.resolve(TradeField::OpenTime, &[]), Some(0));
        assert_eq!(map.resolve(TradeField::CloseTime, &[]), Some(8));
        assert_eq!(map.resolve(TradeField::OpenPrice, &[]), Some(5));
        assert_eq!(map.resolve(TradeField::ClosePrice, &[]), Some(9));
        assert_eq!(map.resolve(TradeField::Profit, &[]), Some(12));
    }

    #[test]
    fn test_sheet_rows_keep_row_offset_only() {
        let mut range: Range<Data> = Range::new((1, 2), (2, 3));
        range.set_value((1, 2), Data::String("Positions".to_string()));
        range.set_value((2, 3), Data::Float(1.5));

        let rows = sheet_rows(&range);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_empty());
        assert_eq!(rows[1], vec![t("Positions"), CellValue::Empty]);
        assert_eq!(rows[2], vec![CellValue::Empty, n(1.5)]);
    }

    #[test]
    fn test_table_starting_in_column_b() {
        let mut range: Range<Data> = Range::new((0, 1), (2, 5));
        for (c, h) in ["Symbol", "Volume", "Open Price", "Close Price", "Close Time"]
            .iter()
            .enumerate()
        {
            range.set_value((0, c as u32 + 1), Data::String(h.to_string()));
        }
        for r in 1..=2u32 {
            range.set_value((r, 1), Data::String("EURUSD".to_string()));
            range.set_value((r, 2), Data::Float(1.0));
            range.set_value((r, 3), Data::Float(1.1));
            range.set_value((r, 4), Data::Float(1.2));
            range.set_value((r, 5), Data::String(format!("2024.01.0{}", r + 1)));
        }

        let outcome = scan_rows(&sheet_rows(&range), &ImportSettings::default(), today()).unwrap();
        assert_eq!(outcome.accepted.len(), 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.accepted[0].0, 2);
        assert_eq!(outcome.accepted[1].1.exit_date, day(2024, 1, 3));
    }

    #[test]
    fn test_data_conversion() {
        assert_eq!(CellValue::from(&Data::Int(3)), n(3.0));
        assert_eq!(CellValue::from(&Data::Bool(true)), t("true"));
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
        assert_eq!(
            CellValue::from(&Data::DateTimeIso("2024-06-28T14:15:00".to_string())),
            t("2024-06-28T14:15:00")
        );
    }

    #[test]
    fn test_excel_datetime_date_systems() {
        let noon = Some(day(2024, 6, 28).and_hms_opt(12, 0, 0).unwrap());
        let dt_1900 = ExcelDateTime::new(45471.5, ExcelDateTimeType::DateTime, false);
        let dt_1904 = ExcelDateTime::new(44009.5, ExcelDateTimeType::DateTime, true);
        assert_eq!(excel_datetime(&dt_1900), noon);
        assert_eq!(excel_datetime(&dt_1904), noon);
        assert_eq!(
            CellValue::from(&Data::DateTime(dt_1904)),
            CellValue::Temporal(noon.unwrap())
        );
    }

    #[test]
    fn test_excel_datetime_rejects_durations_and_nan() {
        let span = ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false);
        assert_eq!(excel_datetime(&span), None);
        let nan = ExcelDateTime::new(f64::NAN, ExcelDateTimeType::DateTime, false);
        assert_eq!(excel_datetime(&nan), None);
    }

    #[test]
    fn test_read_workbook_rejects_garbage() {
        assert!(matches!(
            read_workbook(b"definitely not a workbook"),
            Err(ParseError::Workbook(_))
        ));
    }
}
