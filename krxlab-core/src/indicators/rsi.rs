//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and losses:
//! seed = simple average of the first `period` changes, then
//! avg[t] = (avg[t-1] * (period - 1) + x[t]) / period.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Lookback: period (one change needs two closes).
//! Edge cases: avg_loss == 0 → 100; avg_gain == 0 → 0; both zero → 50.

use super::{for_each_finite_run, Indicator};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, series: &[f64]) -> Vec<f64> {
        let mut result = vec![f64::NAN; series.len()];
        let period = self.period;

        for_each_finite_run(series, |start, run| {
            if run.len() < period + 1 {
                return;
            }

            let mut avg_gain = 0.0;
            let mut avg_loss = 0.0;
            for w in run[..=period].windows(2) {
                let ch = w[1] - w[0];
                if ch > 0.0 {
                    avg_gain += ch;
                } else {
                    avg_loss -= ch;
                }
            }
            avg_gain /= period as f64;
            avg_loss /= period as f64;
            result[start + period] = compute_rsi(avg_gain, avg_loss);

            let p = period as f64;
            for i in (period + 1)..run.len() {
                let ch = run[i] - run[i - 1];
                let gain = ch.max(0.0);
                let loss = (-ch).max(0.0);
                avg_gain = (avg_gain * (p - 1.0) + gain) / p;
                avg_loss = (avg_loss * (p - 1.0) + loss) / p;
                result[start + i] = compute_rsi(avg_gain, avg_loss);
            }
        });

        result
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
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
    use crate::indicators::assert_approx;

    #[test]
    fn rsi_all_gains() {
        let result = Rsi::new(3).compute(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        assert_approx(result[3], 100.0, 1e-9);
        assert_approx(result[5], 100.0, 1e-9);
    }

    #[test]
    fn rsi_all_losses() {
        let result = Rsi::new(3).compute(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        assert_approx(result[3], 0.0, 1e-9);
    }

    #[test]
    fn rsi_flat_is_fifty() {
        let result = Rsi::new(3).compute(&[7.0; 6]);
        assert_approx(result[3], 50.0, 1e-9);
    }

    #[test]
    fn rsi_mixed_seed_and_smoothing() {
        // Changes: +0.34, -0.25, -0.48, +0.72
        // Seed (period 3): gain 0.34/3, loss 0.73/3
        // Next: gain (0.34/3*2 + 0.72)/3, loss (0.73/3*2)/3
        let result = Rsi::new(3).compute(&[44.0, 44.34, 44.09, 43.61, 44.33]);
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert_approx(result[3], 100.0 - 100.0 / (1.0 + 0.34 / 0.73), 1e-9);

        let g = (0.34 / 3.0 * 2.0 + 0.72) / 3.0;
        let l = (0.73 / 3.0 * 2.0) / 3.0;
        assert_approx(result[4], 100.0 - 100.0 / (1.0 + g / l), 1e-9);
    }

    #[test]
    fn rsi_gap_restarts_warmup() {
        let result = Rsi::new(2).compute(&[1.0, 2.0, 3.0, f64::NAN, 5.0, 4.0, 6.0]);
        assert_approx(result[2], 100.0, 1e-9);
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
        assert!(result[5].is_nan());
        assert!(!result[6].is_nan());
    }

    #[test]
    fn rsi_lookback() {
        assert_eq!(Rsi::new(14).lookback(), 14);
    }
}
