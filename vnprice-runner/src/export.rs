//! Artifact export: OHLCV and returns as CSV, a JSON manifest, and the
//! Markdown summary.
//!
//! The manifest carries a `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vnprice_core::analytics::{macd, rolling_volatility, Macd, DEFAULT_VOLATILITY_WINDOW};
use vnprice_core::domain::DateRange;
use vnprice_core::fetch::FetchMode;
use vnprice_core::frame::{to_frame, validate_frame};

use crate::pipeline::FetchReport;
use crate::summary::{render_markdown, SummaryRow};

pub const SCHEMA_VERSION: u32 = 1;

// ─── Manifest ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub generated_at: String,
    pub range: DateRange,
    pub mode: FetchMode,
    pub dataset_hash: String,
    pub tickers: Vec<ManifestTicker>,
    pub failures: Vec<ManifestFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTicker {
    pub ticker: String,
    pub bars: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub gaps: Vec<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFailure {
    pub ticker: String,
    pub range: DateRange,
    pub message: String,
}

pub fn build_manifest(report: &FetchReport) -> Manifest {
    Manifest {
        schema_version: SCHEMA_VERSION,
        generated_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        range: report.range,
        mode: report.mode,
        dataset_hash: report.dataset_hash.clone(),
        tickers: report
            .series
            .iter()
            .map(|(ticker, merged)| ManifestTicker {
                ticker: ticker.to_string(),
                bars: merged.series.len(),
                first_date: merged.series.first_date(),
                last_date: merged.series.last_date(),
                gaps: merged.gaps.iter().map(|g| g.range).collect(),
            })
            .collect(),
        failures: report
            .failures
            .iter()
            .map(|f| ManifestFailure {
                ticker: f.ticker.to_string(),
                range: f.range,
                message: f.message.clone(),
            })
            .collect(),
    }
}

pub fn export_manifest_json(report: &FetchReport) -> Result<String> {
    serde_json::to_string_pretty(&build_manifest(report))
        .context("failed to serialize manifest to JSON")
}

/// Parse a manifest, rejecting schema versions newer than this build writes.
pub fn import_manifest(json: &str) -> Result<Manifest> {
    let manifest: Manifest =
        serde_json::from_str(json).context("failed to deserialize manifest from JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Build the normalized polars frame for the report and check it before
/// anything is written: schema must match and canonicalization must not
/// drop a bar.
pub fn check_frame(report: &FetchReport) -> Result<()> {
    let frame = to_frame(&report.series_map()).context("failed to build price frame")?;
    validate_frame(&frame).context("price frame failed schema validation")?;
    if frame.height() != report.bar_count() {
        bail!(
            "price frame has {} rows but the report holds {} bars",
            frame.height(),
            report.bar_count()
        );
    }
    Ok(())
}

/// Long-format bars, one row per ticker and date.
///
/// Columns: Symbol, Date, Open, High, Low, Close, Adj Close, Volume
pub fn export_ohlcv_csv(report: &FetchReport) -> Result<String> {
    check_frame(report)?;
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "Symbol", "Date", "Open", "High", "Low", "Close", "Adj Close", "Volume",
    ])?;

    for merged in report.series.values() {
        for bar in merged.series.bars() {
            wtr.write_record(&[
                bar.ticker.to_string(),
                bar.date.to_string(),
                format!("{:.4}", bar.open),
                format!("{:.4}", bar.high),
                format!("{:.4}", bar.low),
                format!("{:.4}", bar.close),
                format!("{:.4}", bar.adj_close),
                bar.volume.to_string(),
            ])?;
        }
    }

    let bytes = wtr.into_inner().context("failed to flush OHLCV CSV writer")?;
    String::from_utf8(bytes).context("OHLCV CSV contained invalid UTF-8")
}

/// Trailing returns, 20-bar volatility and MACD 12/26/9 per ticker and date.
/// Undefined values are written as empty cells.
///
/// Columns: Symbol, Date, Adj Close, 1d%, 1w%, 1m%, 6m%, Volatility, MACD,
/// MACD Signal
pub fn export_returns_csv(report: &FetchReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "Symbol",
        "Date",
        "Adj Close",
        "1d%",
        "1w%",
        "1m%",
        "6m%",
        "Volatility",
        "MACD",
        "MACD Signal",
    ])?;

    for (ticker, returns) in &report.returns {
        let Some(merged) = report.series.get(ticker) else {
            continue;
        };
        let closes = merged.series.adj_closes();
        let vol = rolling_volatility(&closes, DEFAULT_VOLATILITY_WINDOW);
        let trend = macd(&closes, Macd::default());

        for (i, row) in returns.rows.iter().enumerate() {
            wtr.write_record(&[
                ticker.to_string(),
                row.date.to_string(),
                format!("{:.4}", closes[i]),
                opt_cell(row.one_day),
                opt_cell(row.one_week),
                opt_cell(row.one_month),
                opt_cell(row.six_months),
                opt_cell(vol.get(i).copied().flatten()),
                opt_cell(trend.get(i).and_then(|p| p.macd)),
                opt_cell(trend.get(i).and_then(|p| p.signal)),
            ])?;
        }
    }

    let bytes = wtr.into_inner().context("failed to flush returns CSV writer")?;
    String::from_utf8(bytes).context("returns CSV contained invalid UTF-8")
}

fn opt_cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_default()
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `ohlcv.csv`, `returns.csv`, `summary.md` and `manifest.json` into
/// `output_dir`, creating it if needed. Returns the directory written.
pub fn save_artifacts(
    report: &FetchReport,
    rows: &[SummaryRow],
    output_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let ohlcv = export_ohlcv_csv(report)?;
    write_file(&output_dir.join("ohlcv.csv"), &ohlcv)?;

    let returns = export_returns_csv(report)?;
    write_file(&output_dir.join("returns.csv"), &returns)?;

    write_file(&output_dir.join("summary.md"), &render_markdown(report, rows))?;

    let manifest = export_manifest_json(report)?;
    write_file(&output_dir.join("manifest.json"), &manifest)?;

    tracing::info!(dir = %output_dir.display(), "artifacts written");
    Ok(output_dir.to_path_buf())
}

/// Load and validate `manifest.json` from an artifact directory.
pub fn load_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_manifest(&json)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_cell_blank_for_none() {
        assert_eq!(opt_cell(None), "");
        assert_eq!(opt_cell(Some(1.5)), "1.5000");
    }

    #[test]
    fn rejects_future_schema_version() {
        let json = r#"{
            "schema_version": 99,
            "generated_at": "2024-07-01T00:00:00",
            "range": {"start": "2024-01-01", "end": "2024-06-30"},
            "mode": "normal",
            "dataset_hash": "abc",
            "tickers": [],
            "failures": []
        }"#;
        let err = import_manifest(json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version 99"));
    }
}
