//! MACD: fast EMA minus slow EMA, with an EMA signal line.

use super::ema::{ema_of_optional, ema_of_series};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

pub fn macd(closes: &[f64], params: Macd) -> Vec<MacdPoint> {
    let fast = ema_of_series(closes, params.fast);
    let slow = ema_of_series(closes, params.slow);
    let line: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_of_optional(&line, params.signal);

    line.iter()
        .zip(&signal)
        .map(|(&m, &s)| MacdPoint {
            macd: m,
            signal: s,
            histogram: m.zip(s).map(|(m, s)| m - s),
        })
        .collect()
}
