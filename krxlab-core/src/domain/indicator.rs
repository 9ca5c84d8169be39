//! Technical indicator rows aligned one-to-one with daily prices.

use super::InstrumentId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Derived signals for one `(instrument_id, date)`.
///
/// A field is `None` whenever its lookback window is not yet satisfied or one
/// of its inputs is missing. Values are never zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub instrument_id: InstrumentId,
    pub date: NaiveDate,

    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma120: Option<f64>,

    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,

    pub rsi: Option<f64>,

    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,

    pub volume_ma20: Option<f64>,
    pub volume_ratio: Option<f64>,

    pub is_doji: Option<bool>,
    pub is_hammer: Option<bool>,
    pub golden_cross: Option<bool>,
    pub death_cross: Option<bool>,
    pub bb_upper_touch: Option<bool>,
    pub bb_lower_touch: Option<bool>,
}
