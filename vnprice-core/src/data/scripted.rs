//! Deterministic in-process providers.
//!
//! `ScriptedProvider` answers each call from a closure and keeps a log of
//! every request, so orchestrator behavior can be driven and checked
//! without a network. `synthetic_bars` produces a reproducible random-walk
//! series per ticker.

use super::provider::{BarProvider, ErrorKind, ProviderError};
use crate::domain::{Bar, DateRange, TickerSymbol};
use chrono::{Datelike, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

type Script = dyn Fn(&TickerSymbol, &DateRange, usize) -> Result<Vec<Bar>, ProviderError>
    + Send
    + Sync;

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub ticker: TickerSymbol,
    pub range: DateRange,
}

/// Provider whose responses come from a closure.
///
/// The closure receives the ticker, the requested range and the zero-based
/// index of this call on this provider.
pub struct ScriptedProvider {
    name: String,
    script: Box<Script>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedProvider {
    pub fn new<F>(name: impl Into<String>, script: F) -> Self
    where
        F: Fn(&TickerSymbol, &DateRange, usize) -> Result<Vec<Bar>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `synthetic_bars` for the requested range.
    pub fn synthetic(name: impl Into<String>) -> Self {
        Self::new(name, |ticker, range, _| Ok(synthetic_bars(ticker, range)))
    }

    /// Always fails with the given kind.
    pub fn failing(name: impl Into<String>, kind: ErrorKind) -> Self {
        Self::new(name, move |ticker, range, _| {
            Err(ProviderError::new(kind, format!("scripted failure for {ticker} {range}")))
        })
    }

    /// Every request seen so far, in call order.
    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl BarProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, ticker: &TickerSymbol, range: &DateRange) -> Result<Vec<Bar>, ProviderError> {
        let call_no = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.push(ScriptedCall {
                ticker: ticker.clone(),
                range: *range,
            });
            calls.len() - 1
        };
        (self.script)(ticker, range, call_no)
    }
}

/// Weekday bars for `ticker` over `range`.
///
/// Each calendar year is an independent random walk seeded from the ticker
/// and the year, so overlapping requests produce identical bars for the
/// dates they share.
pub fn synthetic_bars(ticker: &TickerSymbol, range: &DateRange) -> Vec<Bar> {
    (range.start().year()..=range.end().year())
        .flat_map(|year| synthetic_year(ticker, year))
        .filter(|bar| range.contains(bar.date))
        .collect()
}

fn synthetic_year(ticker: &TickerSymbol, year: i32) -> Vec<Bar> {
    let seed_input = format!("{}:{year}", ticker.as_str());
    let seed: [u8; 32] = *blake3::hash(seed_input.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 20.0 + rng.gen_range(0.0..80.0);
    let Some(mut current) = chrono::NaiveDate::from_ymd_opt(year, 1, 1) else {
        return bars;
    };

    while current.year() == year {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(100_000..3_000_000u64);

        bars.push(Bar {
            ticker: ticker.clone(),
            date: current,
            open,
            high,
            low,
            close,
            adj_close: close,
            volume,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}
