//! SeriesResult: the merged, normalized bar sequence of one ticker.

use super::{Bar, TickerSymbol};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

/// Bars for one ticker, unique by date and strictly ascending by date.
///
/// The only constructor is [`SeriesResult::from_bars`], which enforces the
/// invariant, so a `SeriesResult` can never hold duplicates or be unsorted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesResult {
    ticker: TickerSymbol,
    bars: Vec<Bar>,
}

impl SeriesResult {
    /// Normalize `bars` into a series: the first bar seen for each date wins,
    /// then the survivors are stably sorted by date.
    pub fn from_bars(ticker: TickerSymbol, bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut seen: HashSet<NaiveDate> = HashSet::new();
        let mut kept: Vec<Bar> = bars.into_iter().filter(|b| seen.insert(b.date)).collect();
        kept.sort_by_key(|b| b.date);
        Self { ticker, bars: kept }
    }

    pub fn empty(ticker: TickerSymbol) -> Self {
        Self {
            ticker,
            bars: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &TickerSymbol {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Adjusted closes in date order.
    pub fn adj_closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.adj_close).collect()
    }

    /// Merge another series' bars into this one. Bars already present win.
    pub fn absorb(self, other: impl IntoIterator<Item = Bar>) -> Self {
        let ticker = self.ticker;
        Self::from_bars(ticker, self.bars.into_iter().chain(other))
    }
}
