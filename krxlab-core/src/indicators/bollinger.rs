//! Bollinger Bands: moving average +/- a multiple of the rolling deviation.
//!
//! - Middle: SMA(period)
//! - Upper: middle + mult * stddev(period)
//! - Lower: middle - mult * stddev(period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use super::sma::window_mean;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self { period, multiplier }
    }

    pub fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    pub fn compute(&self, series: &[f64]) -> BollingerBands {
        let n = series.len();
        let mut bands = BollingerBands {
            upper: vec![f64::NAN; n],
            middle: vec![f64::NAN; n],
            lower: vec![f64::NAN; n],
        };

        for i in self.lookback()..n {
            let mean = window_mean(series, i, self.period);
            if mean.is_nan() {
                continue;
            }
            let window = &series[i + 1 - self.period..=i];
            let variance = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.period as f64;
            let offset = self.multiplier * variance.sqrt();

            bands.middle[i] = mean;
            bands.upper[i] = mean + offset;
            bands.lower[i] = mean - offset;
        }

        bands
    }
}
