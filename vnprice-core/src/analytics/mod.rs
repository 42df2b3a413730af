//! Analytics over merged series: trailing returns, volatility, latest
//! snapshot and the indicator helpers used by the presentation layer.
//!
//! Every function returns one `Option<f64>` per input bar; `None` marks
//! insufficient history or an undefined value.

pub mod ema;
pub mod latest;
pub mod macd;
pub mod returns;
pub mod rsi;
pub mod volatility;

pub use ema::ema_of_series;
pub use latest::{latest_snapshot, LatestSnapshot};
pub use macd::{macd, Macd, MacdPoint};
pub use returns::{compute_returns, pct_change, ReturnWindow, ReturnsRow, ReturnsSeries};
pub use rsi::rsi;
pub use volatility::{rolling_volatility, DEFAULT_VOLATILITY_WINDOW};

/// Bars with the given adjusted closes on consecutive days from 2024-01-02.
#[cfg(test)]
pub fn make_series(closes: &[f64]) -> crate::domain::SeriesResult {
    use crate::domain::{Bar, SeriesResult, TickerSymbol};
    let ticker = TickerSymbol::new("TEST").unwrap();
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = closes.iter().enumerate().map(|(i, &close)| {
        let open = if i == 0 { close } else { closes[i - 1] };
        Bar {
            ticker: ticker.clone(),
            date: base_date + chrono::Duration::days(i as i64),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            adj_close: close,
            volume: 1000,
        }
    });
    SeriesResult::from_bars(ticker.clone(), bars)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
