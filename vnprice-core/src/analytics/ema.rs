//! Exponential moving average.
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1]
//! Seed: EMA[period-1] = SMA of the first `period` values.

/// EMA of an arbitrary series. A missing value inside the seed window or
/// after it leaves every later value undefined.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];

    if period == 0 || n < period {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    let seed_window = &values[..period];
    if seed_window.iter().any(|v| !v.is_finite()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(seed);

    let mut prev = seed;
    for (i, &v) in values.iter().enumerate().skip(period) {
        if !v.is_finite() {
            break;
        }
        let ema = alpha * v + (1.0 - alpha) * prev;
        result[i] = Some(ema);
        prev = ema;
    }

    result
}

/// EMA over a series that may already contain leading `None`s; the EMA starts
/// at the first defined value.
pub(crate) fn ema_of_optional(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let Some(first) = values.iter().position(Option::is_some) else {
        return vec![None; values.len()];
    };
    let tail: Vec<f64> = values[first..]
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    let mut result = vec![None; first];
    result.extend(ema_of_series(&tail, period));
    result
}
