//! Trailing percentage returns over adjusted closes.
//!
//! `return(w)[t] = (close[t] / close[t - w] - 1) * 100`, with windows counted
//! in trading bars.

use crate::domain::{SeriesResult, TickerSymbol};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnWindow {
    #[serde(rename = "1d%")]
    OneDay,
    #[serde(rename = "1w%")]
    OneWeek,
    #[serde(rename = "1m%")]
    OneMonth,
    #[serde(rename = "6m%")]
    SixMonths,
}

impl ReturnWindow {
    pub const ALL: [ReturnWindow; 4] = [
        ReturnWindow::OneDay,
        ReturnWindow::OneWeek,
        ReturnWindow::OneMonth,
        ReturnWindow::SixMonths,
    ];

    /// Window length in trading bars.
    pub fn bars(self) -> usize {
        match self {
            ReturnWindow::OneDay => 1,
            ReturnWindow::OneWeek => 5,
            ReturnWindow::OneMonth => 20,
            ReturnWindow::SixMonths => 120,
        }
    }

    /// Column label, e.g. `6m%`.
    pub fn label(self) -> &'static str {
        match self {
            ReturnWindow::OneDay => "1d%",
            ReturnWindow::OneWeek => "1w%",
            ReturnWindow::OneMonth => "1m%",
            ReturnWindow::SixMonths => "6m%",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.label() == label)
    }
}

impl fmt::Display for ReturnWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReturnsRow {
    pub date: NaiveDate,
    #[serde(rename = "1d%")]
    pub one_day: Option<f64>,
    #[serde(rename = "1w%")]
    pub one_week: Option<f64>,
    #[serde(rename = "1m%")]
    pub one_month: Option<f64>,
    #[serde(rename = "6m%")]
    pub six_months: Option<f64>,
}

impl ReturnsRow {
    pub fn get(&self, window: ReturnWindow) -> Option<f64> {
        match window {
            ReturnWindow::OneDay => self.one_day,
            ReturnWindow::OneWeek => self.one_week,
            ReturnWindow::OneMonth => self.one_month,
            ReturnWindow::SixMonths => self.six_months,
        }
    }
}

/// Per-date returns of one ticker, aligned with its series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnsSeries {
    pub ticker: TickerSymbol,
    pub rows: Vec<ReturnsRow>,
}

impl ReturnsSeries {
    pub fn latest(&self) -> Option<&ReturnsRow> {
        self.rows.last()
    }
}

/// Percentage change over `periods` bars. `None` where history is short or
/// either close is non-finite or the base is zero.
pub fn pct_change(closes: &[f64], periods: usize) -> Vec<Option<f64>> {
    closes
        .iter()
        .enumerate()
        .map(|(t, &now)| {
            if periods == 0 || t < periods {
                return None;
            }
            let base = closes[t - periods];
            if !now.is_finite() || !base.is_finite() || base == 0.0 {
                return None;
            }
            Some((now / base - 1.0) * 100.0)
        })
        .collect()
}

/// All four trailing windows for a series.
pub fn compute_returns(series: &SeriesResult) -> ReturnsSeries {
    let closes = series.adj_closes();
    let [d, w, m, h] = ReturnWindow::ALL.map(|win| pct_change(&closes, win.bars()));

    let rows = series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| ReturnsRow {
            date: bar.date,
            one_day: d[i],
            one_week: w[i],
            one_month: m[i],
            six_months: h[i],
        })
        .collect();

    ReturnsSeries {
        ticker: series.ticker().clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{assert_approx, make_series, DEFAULT_EPSILON};

    #[test]
    fn one_day_return() {
        let r = pct_change(&[100.0, 110.0, 99.0], 1);
        assert_eq!(r[0], None);
        assert_approx(r[1].unwrap(), 10.0, DEFAULT_EPSILON);
        assert_approx(r[2].unwrap(), -10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn insufficient_history_is_none() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let r = pct_change(&closes, 20);
        assert!(r.iter().all(Option::is_none));
    }

    #[test]
    fn zero_or_nan_base_is_none() {
        let r = pct_change(&[0.0, 10.0, f64::NAN, 12.0], 1);
        assert_eq!(r[1], None);
        assert_eq!(r[2], None);
        assert_eq!(r[3], None);
    }

    #[test]
    fn windows_use_trading_bars() {
        assert_eq!(ReturnWindow::OneWeek.bars(), 5);
        assert_eq!(ReturnWindow::SixMonths.bars(), 120);
        assert_eq!(ReturnWindow::from_label("1m%"), Some(ReturnWindow::OneMonth));
        assert_eq!(ReturnWindow::from_label("2y%"), None);
    }

    #[test]
    fn compute_returns_aligns_rows_with_bars() {
        let closes: Vec<f64> = (0..130).map(|i| 100.0 + i as f64).collect();
        let series = make_series(&closes);
        let returns = compute_returns(&series);
        assert_eq!(returns.rows.len(), 130);

        let last = returns.latest().unwrap();
        assert_approx(last.one_day.unwrap(), (229.0 / 228.0 - 1.0) * 100.0, 1e-9);
        assert_approx(last.one_week.unwrap(), (229.0 / 224.0 - 1.0) * 100.0, 1e-9);
        assert_approx(last.six_months.unwrap(), (229.0 / 109.0 - 1.0) * 100.0, 1e-9);
        assert_eq!(returns.rows[119].six_months, None);
        assert!(returns.rows[120].six_months.is_some());
    }

    #[test]
    fn empty_series_has_no_rows() {
        let series = make_series(&[]);
        assert!(compute_returns(&series).rows.is_empty());
    }
}
