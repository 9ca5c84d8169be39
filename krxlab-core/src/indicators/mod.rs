//! Technical indicators over a single instrument's ordered close series.
//!
//! Every indicator is a pure function: series in, series of the same length
//! out. Warmup positions and windows touching a missing value are `NaN`; the
//! engine turns those into `None` when it builds rows.
//!
//! # Look-ahead guard
//! No value at index t may depend on input from index t+1 or later. The
//! truncated-vs-full property test in `tests/property_tests.rs` enforces it.

pub mod bollinger;
pub mod candle;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::{Bollinger, BollingerBands};
pub use ema::{ema_of_series, Ema};
pub use engine::IndicatorEngine;
pub use macd::{Macd, MacdSeries};
pub use rsi::Rsi;
pub use sma::Sma;

/// Single-series indicator.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g. "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading values that are always `NaN`.
    fn lookback(&self) -> usize;

    /// Compute over the whole series. Output length equals input length.
    fn compute(&self, series: &[f64]) -> Vec<f64>;
}

/// Call `f(start, run)` for every maximal run of consecutive finite values.
///
/// Recursive indicators (EMA, RSI) restart their warmup after a gap instead
/// of staying undefined for the rest of the history.
pub(crate) fn for_each_finite_run(values: &[f64], mut f: impl FnMut(usize, &[f64])) {
    let mut i = 0;
    while i < values.len() {
        if !values[i].is_finite() {
            i += 1;
            continue;
        }
        let start = i;
        while i < values.len() && values[i].is_finite() {
            i += 1;
        }
        f(start, &values[start..i]);
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
