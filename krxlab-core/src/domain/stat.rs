//! Daily market breadth and turnover.

use super::market::StatScope;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Breadth and turnover summary keyed by `(scope, date)`.
///
/// `rising + falling + unchanged == total`, the number of instruments in
/// scope with a valid close on `date`. Volume and value are `i64`: a single
/// session's traded value regularly exceeds `i32::MAX` won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStat {
    pub scope: StatScope,
    pub date: NaiveDate,
    pub rising: i64,
    pub falling: i64,
    pub unchanged: i64,
    pub total: i64,
    pub total_volume: i64,
    pub total_value: i64,
}

impl MarketStat {
    pub fn empty(scope: StatScope, date: NaiveDate) -> Self {
        Self {
            scope,
            date,
            rising: 0,
            falling: 0,
            unchanged: 0,
            total: 0,
            total_volume: 0,
            total_value: 0,
        }
    }

    pub fn breadth_sum(&self) -> i64 {
        self.rising + self.falling + self.unchanged
    }
}
