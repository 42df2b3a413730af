//! Rolling volatility: sample standard deviation of daily returns.

use super::returns::pct_change;

pub const DEFAULT_VOLATILITY_WINDOW: usize = 20;

/// Rolling sample standard deviation of 1-bar returns (as fractions) over
/// `window` returns. The first defined value is at index `window`.
pub fn rolling_volatility(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if window < 2 {
        return result;
    }

    let daily: Vec<Option<f64>> = pct_change(closes, 1)
        .into_iter()
        .map(|r| r.map(|pct| pct / 100.0))
        .collect();

    for t in window..n {
        let slice = &daily[t + 1 - window..=t];
        let values: Option<Vec<f64>> = slice.iter().copied().collect();
        let Some(values) = values else {
            continue;
        };
        let mean = values.iter().sum::<f64>() / window as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        result[t] = Some(var.sqrt());
    }

    result
}
