//! Latest-bar snapshot per ticker, the row the summary table shows.

use super::returns::{compute_returns, ReturnsRow};
use super::rsi::{rsi, DEFAULT_RSI_PERIOD};
use super::volatility::{rolling_volatility, DEFAULT_VOLATILITY_WINDOW};
use crate::domain::{SeriesResult, TickerSymbol};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSnapshot {
    pub ticker: TickerSymbol,
    pub date: NaiveDate,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
    pub returns: ReturnsRow,
    pub volatility: Option<f64>,
    pub rsi: Option<f64>,
}

/// Snapshot of the last bar, or `None` for an empty series.
pub fn latest_snapshot(series: &SeriesResult) -> Option<LatestSnapshot> {
    let last = series.last()?;
    let returns = compute_returns(series).latest().copied()?;
    let closes = series.adj_closes();
    let volatility = rolling_volatility(&closes, DEFAULT_VOLATILITY_WINDOW)
        .last()
        .copied()
        .flatten();
    let rsi = rsi(&closes, DEFAULT_RSI_PERIOD).last().copied().flatten();

    Some(LatestSnapshot {
        ticker: series.ticker().clone(),
        date: last.date,
        close: last.close,
        adj_close: last.adj_close,
        volume: last.volume,
        returns,
        volatility,
        rsi,
    })
}
