//! Result merger: per-chunk fragments into one normalized series per ticker.

use super::orchestrator::{FetchError, TickerOutcome};
use crate::domain::{Bar, DateRange, SeriesResult, TickerSymbol};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// A part of the requested range that could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gap {
    pub range: DateRange,
    pub error: FetchError,
}

/// A ticker's merged series plus any unfetched ranges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSeries {
    pub series: SeriesResult,
    pub gaps: Vec<Gap>,
}

impl MergedSeries {
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    /// Nothing was resolved and nothing failed: a planning or provider
    /// inconsistency, distinct from a legitimately empty range.
    #[error("{ticker}: no fetch units resolved and no failure recorded")]
    EmptyResult { ticker: TickerSymbol },

    /// Every unit that ran failed and no bars were recovered.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Group fragments by ticker, concatenate in fragment order, keep the first
/// bar seen per date, and sort by date.
///
/// Idempotent: merging the merged output again changes nothing.
pub fn merge(fragments: Vec<(TickerSymbol, Vec<Bar>)>) -> BTreeMap<TickerSymbol, SeriesResult> {
    let mut grouped: BTreeMap<TickerSymbol, Vec<Bar>> = BTreeMap::new();
    for (ticker, bars) in fragments {
        grouped.entry(ticker).or_default().extend(bars);
    }
    grouped
        .into_iter()
        .map(|(ticker, bars)| {
            let series = SeriesResult::from_bars(ticker.clone(), bars);
            (ticker, series)
        })
        .collect()
}

/// Merge per-ticker fetch outcomes and decide each requested ticker's result.
pub fn merge_outcomes(
    requested: &[TickerSymbol],
    outcomes: Vec<TickerOutcome>,
) -> BTreeMap<TickerSymbol, Result<MergedSeries, MergeError>> {
    let mut by_ticker: BTreeMap<TickerSymbol, TickerOutcome> = outcomes
        .into_iter()
        .map(|o| (o.ticker.clone(), o))
        .collect();

    requested
        .iter()
        .map(|ticker| {
            let result = match by_ticker.remove(ticker) {
                Some(outcome) => merge_one(outcome),
                None => Err(MergeError::EmptyResult {
                    ticker: ticker.clone(),
                }),
            };
            (ticker.clone(), result)
        })
        .collect()
}

fn merge_one(outcome: TickerOutcome) -> Result<MergedSeries, MergeError> {
    let gap = outcome.gap();
    let TickerOutcome {
        ticker,
        resolved,
        failure,
        ..
    } = outcome;

    let resolved_any = !resolved.is_empty();
    let fragments = resolved
        .into_iter()
        .map(|(unit, bars)| (unit.ticker, bars))
        .collect();
    let series = merge(fragments)
        .remove(&ticker)
        .unwrap_or_else(|| SeriesResult::empty(ticker.clone()));

    match (failure, gap) {
        (Some(error), _) if series.is_empty() => Err(MergeError::Fetch(error)),
        (Some(_), gap) => Ok(MergedSeries {
            series,
            gaps: gap.into_iter().collect(),
        }),
        (None, _) if !resolved_any => Err(MergeError::EmptyResult { ticker }),
        (None, _) => Ok(MergedSeries {
            series,
            gaps: Vec::new(),
        }),
    }
}
