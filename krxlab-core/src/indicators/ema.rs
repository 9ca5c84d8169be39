//! Exponential Moving Average (EMA).
//!
//! EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[period-1] = SMA of the first `period` values.
//! A missing value breaks the chain; warmup restarts after the gap.
//! Lookback: period - 1.

use super::{for_each_finite_run, Indicator};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, series: &[f64]) -> Vec<f64> {
        ema_of_series(series, self.period)
    }
}

/// EMA of an arbitrary series. Used directly by MACD for its signal line.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if period == 0 {
        return result;
    }
    let alpha = 2.0 / (period as f64 + 1.0);

    for_each_finite_run(values, |start, run| {
        if run.len() < period {
            return;
        }
        let seed = run[..period].iter().sum::<f64>() / period as f64;
        result[start + period - 1] = seed;

        let mut prev = seed;
        for (offset, &v) in run.iter().enumerate().skip(period) {
            let ema = alpha * v + (1.0 - alpha) * prev;
            result[start + offset] = ema;
            prev = ema;
        }
    });

    result
}
