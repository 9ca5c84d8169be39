//! Moving Average Convergence Divergence.
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(signal) of the line, seeded
//! from the first `signal` valid line values; histogram = line - signal.
//! With 12/26/9 the line is first valid at index 25 and the signal at 33.

use super::ema::ema_of_series;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && fast < slow, "MACD needs 1 <= fast < slow");
        assert!(signal >= 1, "MACD signal period must be >= 1");
        Self { fast, slow, signal }
    }

    /// Index of the first signal value on a gap-free series.
    pub fn signal_lookback(&self) -> usize {
        self.slow - 1 + self.signal - 1
    }

    pub fn compute(&self, series: &[f64]) -> MacdSeries {
        let fast = ema_of_series(series, self.fast);
        let slow = ema_of_series(series, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        MacdSeries {
            line,
            signal,
            histogram,
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}
