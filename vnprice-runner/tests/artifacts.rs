use std::sync::Arc;

use vnprice_core::analytics::ReturnWindow;
use vnprice_core::data::{ProviderSet, ScriptedProvider};
use vnprice_core::domain::{DateRange, TickerSymbol};
use vnprice_core::fetch::RecordingSleeper;
use vnprice_runner::{
    check_frame, export_ohlcv_csv, export_returns_csv, load_manifest, save_artifacts, summarize,
    FetchConfig, FetchReport, Pipeline, SCHEMA_VERSION,
};

fn report() -> FetchReport {
    let pipeline = Pipeline::new(
        ProviderSet::new(
            Arc::new(ScriptedProvider::synthetic("tcbs")),
            Arc::new(ScriptedProvider::synthetic("vci")),
        ),
        &FetchConfig::default(),
    )
    .with_sleeper(Arc::new(RecordingSleeper::new()));
    let tickers: Vec<TickerSymbol> = ["VCB", "FPT"]
        .iter()
        .map(|s| TickerSymbol::new(s).unwrap())
        .collect();
    let range = DateRange::parse("2024-01-01", "2024-03-31").unwrap();
    pipeline.run(&tickers, range).unwrap()
}

#[test]
fn ohlcv_csv_has_one_row_per_bar() {
    let report = report();
    let csv = export_ohlcv_csv(&report).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Symbol,Date,Open,High,Low,Close,Adj Close,Volume");
    assert_eq!(lines.len(), report.bar_count() + 1);
    // tickers in sorted order
    assert!(lines[1].starts_with("FPT,2024-01-01"));
}

#[test]
fn returns_csv_leaves_undefined_cells_empty() {
    let report = report();
    let csv = export_returns_csv(&report).unwrap();
    let first = csv.lines().nth(1).unwrap();
    let cells: Vec<&str> = first.split(',').collect();
    assert_eq!(cells.len(), 10);
    assert_eq!(cells[0], "FPT");
    assert!(cells[3..].iter().all(|c| c.is_empty()));
}

#[test]
fn save_artifacts_writes_all_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("run");
    let report = report();
    let rows = summarize(&report, None, ReturnWindow::SixMonths);

    let written = save_artifacts(&report, &rows, &out).unwrap();
    assert_eq!(written, out);
    for name in ["ohlcv.csv", "returns.csv", "summary.md", "manifest.json"] {
        assert!(out.join(name).exists(), "missing {name}");
    }

    let manifest = load_manifest(&out).unwrap();
    assert_eq!(manifest.schema_version, SCHEMA_VERSION);
    assert_eq!(manifest.dataset_hash, report.dataset_hash);
    assert_eq!(manifest.tickers.len(), 2);
    assert!(manifest.failures.is_empty());

    let md = std::fs::read_to_string(out.join("summary.md")).unwrap();
    assert!(md.starts_with("# Price Summary"));
    assert!(md.contains("| Industry | Symbol | Price |"));
    assert!(!md.contains("## Problems"));
}

#[test]
fn frame_check_matches_report() {
    let report = report();
    check_frame(&report).unwrap();
}

#[test]
fn returns_csv_fills_macd_once_history_allows() {
    let report = report();
    let csv = export_returns_csv(&report).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.ends_with("Volatility,MACD,MACD Signal"));
    // 2024-Q1 has more than 26 + 9 weekdays, so the last FPT row has both.
    let last_fpt = csv.lines().filter(|l| l.starts_with("FPT,")).last().unwrap();
    let cells: Vec<&str> = last_fpt.split(',').collect();
    assert!(!cells[8].is_empty());
    assert!(!cells[9].is_empty());
}

