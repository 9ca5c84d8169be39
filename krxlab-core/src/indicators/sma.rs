//! Simple Moving Average (SMA).
//!
//! Mean of the trailing `period` values, summed fresh for every window so a
//! value depends on its window alone.
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Mean of `values[end + 1 - period..=end]`, `NaN` if any value is missing.
pub(crate) fn window_mean(values: &[f64], end: usize, period: usize) -> f64 {
    let window = &values[end + 1 - period..=end];
    if window.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    window.iter().sum::<f64>() / period as f64
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, series: &[f64]) -> Vec<f64> {
        let n = series.len();
        let mut result = vec![f64::NAN; n];
        for (i, slot) in result.iter_mut().enumerate().skip(self.period - 1) {
            *slot = window_mean(series, i, self.period);
        }
        result
    }
}
