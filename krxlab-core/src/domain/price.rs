//! Daily price rows for instruments and segment indices.

use super::market::Market;
use super::InstrumentId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily bar for one instrument, keyed by `(instrument_id, date)`.
///
/// Price fields are optional because the provider occasionally omits them.
/// When all of open/high/low/close are present,
/// `high >= max(open, close) >= min(open, close) >= low` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    pub instrument_id: InstrumentId,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
    pub volume: i64,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
}

impl DailyPrice {
    /// Close used for change and indicator math: adjusted close when present.
    pub fn reference_close(&self) -> Option<f64> {
        self.adjusted_close.or(self.close)
    }

    /// True when the row carries a usable close for breadth statistics.
    pub fn has_valid_close(&self) -> bool {
        self.close.is_some_and(f64::is_finite)
    }

    /// Traded value in won, `round(close * volume)`, saturating at `i64::MAX`.
    pub fn traded_value(&self) -> i64 {
        match self.close {
            Some(c) if c.is_finite() => (c * self.volume as f64).round() as i64,
            _ => 0,
        }
    }
}

/// One daily bar of a segment's composite index, keyed by `(market, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndexBar {
    pub market: Market,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: i64,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
}

/// Absolute and percentage change of `current` against `previous`.
///
/// Either side missing, or a zero previous close, yields `None` for the
/// affected field.
pub fn price_change(previous: Option<f64>, current: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (previous, current) {
        (Some(prev), Some(curr)) => {
            let change = curr - prev;
            let rate = if prev != 0.0 {
                Some(change / prev * 100.0)
            } else {
                None
            };
            (Some(change), rate)
        }
        _ => (None, None),
    }
}
