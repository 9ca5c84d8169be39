//! Market breadth and turnover aggregation.
//!
//! Input is an immutable cross-section: every stored price row for one
//! trading date, tagged with its segment, handed over by value once all
//! fetch workers have finished.

use crate::domain::{DailyPrice, Market, MarketStat, StatScope};
use chrono::NaiveDate;

/// All instrument rows of one trading date.
#[derive(Debug, Clone, Default)]
pub struct CrossSection {
    pub rows: Vec<(Market, DailyPrice)>,
}

impl CrossSection {
    pub fn new(rows: Vec<(Market, DailyPrice)>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketAggregator;

impl MarketAggregator {
    pub fn new() -> Self {
        Self
    }

    /// One stat row for `scope` over `rows`.
    ///
    /// Rows without a valid close are skipped entirely. A valid close with no
    /// change (first stored session) counts as unchanged.
    pub fn aggregate<'a>(
        &self,
        scope: StatScope,
        date: NaiveDate,
        rows: impl IntoIterator<Item = (Market, &'a DailyPrice)>,
    ) -> MarketStat {
        let mut stat = MarketStat::empty(scope, date);
        for (market, row) in rows {
            if !scope.includes(market) || row.date != date || !row.has_valid_close() {
                continue;
            }
            match row.change {
                Some(c) if c > 0.0 => stat.rising += 1,
                Some(c) if c < 0.0 => stat.falling += 1,
                _ => stat.unchanged += 1,
            }
            stat.total += 1;
            stat.total_volume = stat.total_volume.saturating_add(row.volume);
            stat.total_value = stat.total_value.saturating_add(row.traded_value());
        }
        stat
    }

    /// Per-segment rows for segments present in the snapshot, plus the
    /// whole-market `ALL` row.
    pub fn aggregate_cross_section(&self, date: NaiveDate, snapshot: CrossSection) -> Vec<MarketStat> {
        if snapshot.is_empty() {
            return Vec::new();
        }
        let iter = || snapshot.rows.iter().map(|(m, r)| (*m, r));

        let mut stats: Vec<MarketStat> = Market::ALL
            .iter()
            .filter(|m| snapshot.rows.iter().any(|(rm, _)| rm == *m))
            .map(|&m| self.aggregate(StatScope::Segment(m), date, iter()))
            .collect();
        stats.push(self.aggregate(StatScope::All, date, iter()));
        stats
    }
}
