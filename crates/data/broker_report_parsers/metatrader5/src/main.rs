use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use mt5::{deselect, MetaTrader5Parser, ParsedTrade, ReportFormat};

/// Import closed positions from MetaTrader 5 reports (HTML or Excel).
///
/// If no files are given, every ReportHistory*/mt5* report file (HTML or workbook) in the
/// current directory is parsed.
#[derive(Parser, Debug)]
#[command(name = "mt5_import", version)]
struct Args {
    /// Report files to import
    files: Vec<PathBuf>,

    /// Settings JSON (defaults to ./settings.json when present)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Trade journal to merge the selected trades into (file or directory)
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Write the selected trades as a JSON array
    #[arg(long)]
    output: Option<PathBuf>,

    /// 1-based positions from the review list to leave out, e.g. --exclude 2,5
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<usize>,

    /// Parse and review only; write nothing
    #[arg(long)]
    dry_run: bool,

    /// -v for debug logging, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with_verbosity(args.verbose);

    let settings = settings_loader::load_settings_with_fallback(args.settings.as_ref())?;
    let journal_path = args.journal.clone().or_else(|| settings.journal_path.clone());

    let mut files = args.files.clone();
    if files.is_empty() {
        println!("📂 No report files specified, scanning current directory...");
        files = discover_reports()?;
        for f in &files {
            println!("  ✓ Found: {}", f.display());
        }
    }

    if files.is_empty() {
        println!("❌ No report files found (expected ReportHistory*.html / *.xlsx or explicit paths).");
        return Ok(());
    }

    let parser = MetaTrader5Parser::new().with_settings(settings);

    println!("📖 Parsing {} file(s)", files.len());

    let mut all_trades: Vec<ParsedTrade> = Vec::new();
    for path in &files {
        println!("  • {}", path.display());
        match parser.parse_file(path) {
            Ok(report) => {
                println!(
                    "    {} trades, {} rows skipped",
                    report.trades.len(),
                    report.skipped_count()
                );
                for w in report.warnings() {
                    tracing::debug!("{}: {}", path.display(), w);
                }
                all_trades.extend(report.trades);
            }
            Err(e) => {
                println!("    ❌ {}", e);
            }
        }
    }

    if all_trades.is_empty() {
        println!("❌ No trades found.");
        return Ok(());
    }

    println!("\n🧾 Review:");
    for (idx, t) in all_trades.iter().enumerate() {
        let mark = if args.exclude.contains(&(idx + 1)) { "✗" } else { " " };
        println!(
            "{} {:>4}. {:<10} {:<4} {:>8} {:>12} → {:<12} {} → {}  P/L {:>10.2}",
            mark,
            idx + 1,
            t.symbol,
            t.side,
            t.quantity,
            t.entry,
            t.exit,
            t.entry_date.format("%Y-%m-%d"),
            t.exit_date.format("%Y-%m-%d"),
            t.profit_loss
        );
    }

    let total = all_trades.len();
    let selected = deselect(all_trades, &args.exclude);
    let selected_json: Vec<serde_json::Value> = selected.iter().map(|t| t.to_json()).collect();

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Parsed {} trades, {} selected", total, selected.len());

    if args.dry_run {
        println!("✓ Dry run, nothing written");
        println!("─────────────────────────────────────────");
        return Ok(());
    }

    if let Some(out) = &args.output {
        let formatted = serde_json::to_string_pretty(&selected_json)?;
        fs::write(out, formatted).with_context(|| format!("Cannot write {}", out.display()))?;
        println!("✓ Trades written to: {}", out.display());
    }

    if let Some(journal_path) = &journal_path {
        let journal = utils::read_journal(journal_path)?;
        let (mut merged, stats) = utils::merge_trades_with_deduplication(journal, selected_json)?;
        utils::sort_trades_by_exit_date(&mut merged)?;
        let written = utils::write_journal(journal_path, &merged)?;

        println!(
            "✓ Processed {} trades: {} added, {} skipped (duplicates)",
            stats.total, stats.added, stats.skipped
        );
        println!("✅ Journal written to: {}", written.display());
    } else if args.output.is_none() {
        println!("ℹ️  No --journal or --output given; nothing written");
    }
    println!("─────────────────────────────────────────");

    Ok(())
}

fn discover_reports() -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(".").context("Cannot read current directory")? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let low = name.to_lowercase();
        let known_prefix = low.starts_with("reporthistory") || low.starts_with("mt5");
        if known_prefix && ReportFormat::from_path(&path).is_some() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
