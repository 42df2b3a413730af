//! Relative Strength Index with Wilder smoothing.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). First value at index `period`.
//! avg_loss == 0 gives 100, avg_gain == 0 gives 0, no movement gives 50.

pub const DEFAULT_RSI_PERIOD: usize = 14;

pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];

    if period == 0 || n < period + 1 {
        return result;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for &ch in &changes[..period] {
        if !ch.is_finite() {
            return result;
        }
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = Some(rsi_value(avg_gain, avg_loss));

    let alpha = 1.0 / period as f64;
    for (i, &ch) in changes.iter().enumerate().skip(period) {
        if !ch.is_finite() {
            break;
        }
        let gain = ch.max(0.0);
        let loss = (-ch).max(0.0);
        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        result[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::assert_approx;

    #[test]
    fn all_gains() {
        let r = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 3);
        assert_eq!(r[2], None);
        assert_approx(r[3].unwrap(), 100.0, 1e-6);
        assert_approx(r[5].unwrap(), 100.0, 1e-6);
    }

    #[test]
    fn all_losses() {
        let r = rsi(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0], 3);
        assert_approx(r[3].unwrap(), 0.0, 1e-6);
    }

    #[test]
    fn mixed_seed() {
        // Changes: +0.34, -0.25, -0.48 → avg_gain 0.34/3, avg_loss 0.73/3
        let r = rsi(&[44.0, 44.34, 44.09, 43.61, 44.33], 3);
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        assert_approx(r[3].unwrap(), expected, 1e-9);

        // Wilder step with +0.72
        let g = (0.34 / 3.0) * (2.0 / 3.0) + 0.72 / 3.0;
        let l = (0.73 / 3.0) * (2.0 / 3.0);
        assert_approx(r[4].unwrap(), 100.0 - 100.0 / (1.0 + g / l), 1e-9);
    }

    #[test]
    fn flat_prices_are_neutral() {
        let r = rsi(&[10.0; 6], 3);
        assert_approx(r[4].unwrap(), 50.0, 1e-12);
    }

    #[test]
    fn short_input_is_undefined() {
        assert!(rsi(&[1.0, 2.0, 3.0], 3).iter().all(Option::is_none));
    }
}
