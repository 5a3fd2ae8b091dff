use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

pub const JOURNAL_FILE_NAME: &str = "journal.json";

/// Resolve a user-supplied journal location to the JSON file itself.
/// A directory (or a non-.json path that doesn't exist yet) resolves to `journal.json` inside it.
pub fn resolve_journal_path<P: AsRef<Path>>(journal_path: P) -> PathBuf {
    let path = journal_path.as_ref();
    if path.is_dir() || (!path.exists() && path.extension().and_then(|e| e.to_str()) != Some("json")) {
        path.join(JOURNAL_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

pub fn empty_journal() -> Value {
    json!({ "trades": [] })
}

/// Reads the journal file. A missing file is an empty journal; nothing is written.
pub fn read_journal<P: AsRef<Path>>(journal_path: P) -> Result<Value> {
    let path = resolve_journal_path(journal_path);

    if !path.exists() {
        return Ok(empty_journal());
    }

    let mut file =
        File::open(&path).with_context(|| format!("Cannot open journal at {}", path.display()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    serde_json::from_str(&contents)
        .with_context(|| format!("Journal at {} is not valid JSON", path.display()))
}

/// Writes the journal as pretty JSON, creating parent directories as needed.
pub fn write_journal<P: AsRef<Path>>(journal_path: P, value: &Value) -> Result<PathBuf> {
    let path = resolve_journal_path(journal_path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(&path)
        .with_context(|| format!("Cannot create journal file at {}", path.display()))?;

    let formatted = serde_json::to_string_pretty(value)?;
    file.write_all(formatted.as_bytes())?;

    Ok(path)
}

/// Statistics about a trade merge operation
#[derive(Debug, Clone)]
pub struct MergeStats {
    pub added: usize,
    pub skipped: usize,
    pub total: usize,
}

impl MergeStats {
    pub fn has_duplicates(&self) -> bool {
        self.skipped > 0
    }
}

/// Merges new trades into the journal, skipping any whose `tradeId` is already present
/// (either in the journal or earlier in `new_trades`).
pub fn merge_trades_with_deduplication(
    mut journal: Value,
    new_trades: Vec<Value>,
) -> Result<(Value, MergeStats)> {
    let arr = journal
        .get_mut("trades")
        .and_then(|v| v.as_array_mut())
        .ok_or_else(|| anyhow!("journal missing 'trades' array"))?;

    let mut existing_ids: HashSet<String> = arr
        .iter()
        .filter_map(|t| t.get("tradeId").and_then(|id| id.as_str()).map(|s| s.to_string()))
        .collect();

    let mut stats = MergeStats {
        added: 0,
        skipped: 0,
        total: new_trades.len(),
    };

    for trade in new_trades {
        let trade_id = trade
            .get("tradeId")
            .and_then(|id| id.as_str())
            .ok_or_else(|| anyhow!("Trade missing 'tradeId' field"))?
            .to_string();

        if existing_ids.insert(trade_id) {
            arr.push(trade);
            stats.added += 1;
        } else {
            stats.skipped += 1;
        }
    }

    Ok((journal, stats))
}

/// Sort journal trades in-place by `exitDate` ascending.
///
/// Sorting is stable. Trades with missing/non-string `exitDate` are placed at the end.
pub fn sort_trades_by_exit_date(journal: &mut Value) -> Result<()> {
    let arr = journal
        .get_mut("trades")
        .and_then(|v| v.as_array_mut())
        .ok_or_else(|| anyhow!("journal missing 'trades' array"))?;

    arr.sort_by(|a, b| {
        let da = a.get("exitDate").and_then(|v| v.as_str());
        let db = b.get("exitDate").and_then(|v| v.as_str());

        match (da, db) {
            (Some(left), Some(right)) => left.cmp(right),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });

    Ok(())
}
