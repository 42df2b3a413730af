//! Range planner: turns a ticker set and a date range into ordered fetch
//! units.
//!
//! Normal mode issues one request per ticker when the range is at most a
//! year long, and otherwise splits on calendar-year boundaries. Degraded
//! mode splits on calendar half-years and routes every unit to the
//! secondary source.

use crate::data::SourceTag;
use crate::domain::{DateRange, TickerSymbol};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Longest range (in inclusive days) fetched as a single normal-mode unit.
pub const MAX_SINGLE_REQUEST_DAYS: i64 = 365;

/// Orchestrator-wide fetch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Normal,
    DegradedSecondaryOnly,
}

impl FetchMode {
    pub fn source(self) -> SourceTag {
        match self {
            FetchMode::Normal => SourceTag::Primary,
            FetchMode::DegradedSecondaryOnly => SourceTag::Secondary,
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Normal => f.write_str("normal"),
            FetchMode::DegradedSecondaryOnly => f.write_str("degraded (secondary only)"),
        }
    }
}

/// One (ticker, sub-range, source) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchUnit {
    pub ticker: TickerSymbol,
    pub range: DateRange,
    pub source: SourceTag,
}

impl fmt::Display for FetchUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} via {}", self.ticker, self.range, self.source)
    }
}

/// Plan fetch units for `tickers` over `range`.
///
/// Output is ticker-major in input order (repeated tickers keep their first
/// position), then chronological.
pub fn plan(tickers: &[TickerSymbol], range: DateRange, mode: FetchMode) -> Vec<FetchUnit> {
    let chunks = split_range(range, mode);
    let source = mode.source();
    let mut seen = HashSet::new();

    tickers
        .iter()
        .filter(|t| seen.insert((*t).clone()))
        .flat_map(|ticker| {
            chunks.iter().map(move |chunk| FetchUnit {
                ticker: ticker.clone(),
                range: *chunk,
                source,
            })
        })
        .collect()
}

/// Split one range into the contiguous, non-overlapping chunks `plan` uses.
///
/// A range of at most [`MAX_SINGLE_REQUEST_DAYS`] is one chunk in either
/// mode. Longer ranges split on calendar years, or on half-years when
/// degraded.
pub fn split_range(range: DateRange, mode: FetchMode) -> Vec<DateRange> {
    if range.days() <= MAX_SINGLE_REQUEST_DAYS {
        return vec![range];
    }
    match mode {
        FetchMode::Normal => split_at(range, year_end),
        FetchMode::DegradedSecondaryOnly => split_at(range, half_year_end),
    }
}

fn split_at(range: DateRange, period_end: fn(NaiveDate) -> NaiveDate) -> Vec<DateRange> {
    let mut chunks = Vec::new();
    let mut start = range.start();
    loop {
        let end = period_end(start).min(range.end());
        match DateRange::new(start, end) {
            Ok(chunk) => chunks.push(chunk),
            Err(_) => break,
        }
        if end >= range.end() {
            break;
        }
        match end.succ_opt() {
            Some(next) => start = next,
            None => break,
        }
    }
    chunks
}

fn year_end(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(NaiveDate::MAX)
}

fn half_year_end(date: NaiveDate) -> NaiveDate {
    if date.month() <= 6 {
        NaiveDate::from_ymd_opt(date.year(), 6, 30).unwrap_or(NaiveDate::MAX)
    } else {
        year_end(date)
    }
}
