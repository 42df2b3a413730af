//! Latest-price summary table: one row per ticker, sorted by a return window.

use crate::pipeline::FetchReport;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use vnprice_core::analytics::{latest_snapshot, ReturnWindow};
use vnprice_core::data::Universe;
use vnprice_core::domain::TickerSymbol;

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub industry: Option<String>,
    pub ticker: TickerSymbol,
    pub date: NaiveDate,
    /// Latest adjusted close, in thousands of VND as the sources quote it.
    pub price: f64,
    pub one_day: Option<f64>,
    pub one_week: Option<f64>,
    pub one_month: Option<f64>,
    pub six_months: Option<f64>,
    pub volume: u64,
    pub volatility: Option<f64>,
}

impl SummaryRow {
    pub fn get(&self, window: ReturnWindow) -> Option<f64> {
        match window {
            ReturnWindow::OneDay => self.one_day,
            ReturnWindow::OneWeek => self.one_week,
            ReturnWindow::OneMonth => self.one_month,
            ReturnWindow::SixMonths => self.six_months,
        }
    }
}

/// Build summary rows for every ticker with at least one bar.
///
/// Rows are sorted ascending by `sort_by`; tickers without enough history for
/// that window sort last, ties broken by ticker.
pub fn summarize(
    report: &FetchReport,
    universe: Option<&Universe>,
    sort_by: ReturnWindow,
) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = report
        .series
        .values()
        .filter_map(|merged| latest_snapshot(&merged.series))
        .map(|snap| SummaryRow {
            industry: universe
                .and_then(|u| u.industry_of(&snap.ticker))
                .map(str::to_string),
            date: snap.date,
            price: snap.adj_close,
            one_day: snap.returns.one_day,
            one_week: snap.returns.one_week,
            one_month: snap.returns.one_month,
            six_months: snap.returns.six_months,
            volume: snap.volume,
            volatility: snap.volatility,
            ticker: snap.ticker,
        })
        .collect();

    rows.sort_by(|a, b| {
        compare_nulls_last(a.get(sort_by), b.get(sort_by)).then_with(|| a.ticker.cmp(&b.ticker))
    });
    rows
}

fn compare_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}%")).unwrap_or_else(|| "-".to_string())
}

fn fmt_price(v: f64) -> String {
    format!("{v:.1}K")
}

fn fmt_volume(v: u64) -> String {
    format!("{:.1}M", v as f64 / 1_000_000.0)
}

const HEADERS: [&str; 8] = ["Industry", "Symbol", "Price", "1d%", "1w%", "1m%", "6m%", "Volume"];

fn cells(row: &SummaryRow) -> [String; 8] {
    [
        row.industry.clone().unwrap_or_else(|| "-".to_string()),
        row.ticker.to_string(),
        fmt_price(row.price),
        fmt_pct(row.one_day),
        fmt_pct(row.one_week),
        fmt_pct(row.one_month),
        fmt_pct(row.six_months),
        fmt_volume(row.volume),
    ]
}

/// Plain-text table with aligned columns, for the terminal.
pub fn render_table(rows: &[SummaryRow]) -> String {
    let body: Vec<[String; 8]> = rows.iter().map(cells).collect();
    let mut widths = HEADERS.map(str::len);
    for r in &body {
        for (w, c) in widths.iter_mut().zip(r.iter()) {
            *w = (*w).max(c.len());
        }
    }

    let mut out = String::new();
    let line = |cols: &[String]| -> String {
        cols.iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(i, (c, w))| {
                // text columns left, numbers right
                if i < 2 {
                    format!("{c:<w$}")
                } else {
                    format!("{c:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    out.push_str(&line(&header[..]));
    out.push('\n');
    for r in &body {
        out.push_str(&line(&r[..]));
        out.push('\n');
    }
    out
}

/// Markdown report: run header, summary table, then any problems.
pub fn render_markdown(report: &FetchReport, rows: &[SummaryRow]) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Price Summary\n\n");
    md.push_str(&format!("- **Range**: {}\n", report.range));
    md.push_str(&format!("- **Mode**: {}\n", report.mode));
    md.push_str(&format!(
        "- **Tickers**: {} requested, {} resolved\n",
        report.requested.len(),
        report.series.len()
    ));
    md.push_str(&format!("- **Bars**: {}\n", report.bar_count()));
    md.push_str(&format!("- **Dataset hash**: `{}`\n\n", report.dataset_hash));

    md.push_str(&format!("| {} |\n", HEADERS.join(" | ")));
    md.push_str(&format!("|{}\n", "---|".repeat(HEADERS.len())));
    for row in rows {
        md.push_str(&format!("| {} |\n", cells(row).join(" | ")));
    }

    let problems = report.problem_lines();
    if !problems.is_empty() {
        md.push_str("\n## Problems\n\n");
        for p in problems {
            md.push_str(&format!("- {p}\n"));
        }
    }

    md
}
