//! Trading calendar and inclusive date ranges.
//!
//! A trading day is a weekday that is not a configured exchange holiday.
//! Incremental windows are counted in trading days so a weekend or a public
//! holiday never shrinks the refreshed history.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Inclusive `[start, end]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Weekday calendar minus exchange holidays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Weekdays only, no holidays.
    pub fn weekdays() -> Self {
        Self::default()
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Most recent trading day on or before `date`.
    pub fn last_trading_day_on_or_before(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        while !self.is_trading_day(d) {
            d -= Duration::days(1);
        }
        d
    }

    /// Window ending at `end` that covers the last `days` trading days.
    ///
    /// `days == 0` is treated as 1.
    pub fn trailing_window(&self, end: NaiveDate, days: u32) -> DateRange {
        let wanted = days.max(1);
        let mut found = 0;
        let mut d = end;
        let mut start = end;
        while found < wanted {
            if self.is_trading_day(d) {
                found += 1;
                start = d;
            }
            d -= Duration::days(1);
        }
        DateRange { start, end }
    }

    /// Backfill range covering `years` calendar years up to `end`.
    pub fn backfill_range(&self, end: NaiveDate, years: u32) -> DateRange {
        let start = end
            .checked_sub_months(Months::new(years.max(1) * 12))
            .unwrap_or(NaiveDate::MIN);
        DateRange { start, end }
    }

    /// All trading days within `range`, ascending.
    pub fn trading_days(&self, range: DateRange) -> Vec<NaiveDate> {
        range
            .start
            .iter_days()
            .take_while(|d| *d <= range.end)
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_are_not_trading_days() {
        let cal = TradingCalendar::weekdays();
        assert!(cal.is_trading_day(d(2024, 3, 8))); // Friday
        assert!(!cal.is_trading_day(d(2024, 3, 9)));
        assert!(!cal.is_trading_day(d(2024, 3, 10)));
    }

    #[test]
    fn holidays_are_skipped() {
        let cal = TradingCalendar::new([d(2024, 3, 1)]);
        assert!(!cal.is_trading_day(d(2024, 3, 1)));
        assert_eq!(cal.last_trading_day_on_or_before(d(2024, 3, 3)), d(2024, 2, 29));
    }

    #[test]
    fn trailing_window_spans_weekend() {
        // Monday 2024-03-11, 3 trading days back: Thu 7, Fri 8, Mon 11
        let cal = TradingCalendar::weekdays();
        let w = cal.trailing_window(d(2024, 3, 11), 3);
        assert_eq!(w.start, d(2024, 3, 7));
        assert_eq!(w.end, d(2024, 3, 11));
        assert_eq!(cal.trading_days(w).len(), 3);
    }

    #[test]
    fn trailing_window_from_sunday() {
        let cal = TradingCalendar::weekdays();
        let w = cal.trailing_window(d(2024, 3, 10), 1);
        assert_eq!(w.start, d(2024, 3, 8));
        assert_eq!(w.end, d(2024, 3, 10));
    }

    #[test]
    fn trailing_window_skips_holiday() {
        let cal = TradingCalendar::new([d(2024, 3, 8)]);
        let w = cal.trailing_window(d(2024, 3, 11), 2);
        assert_eq!(w.start, d(2024, 3, 7));
    }

    #[test]
    fn backfill_range_is_whole_years() {
        let cal = TradingCalendar::weekdays();
        let r = cal.backfill_range(d(2024, 6, 28), 1);
        assert_eq!(r.start, d(2023, 6, 28));
        let r3 = cal.backfill_range(d(2024, 2, 29), 3);
        assert_eq!(r3.start, d(2021, 2, 28));
    }

    #[test]
    fn reversed_range_is_normalized() {
        let r = DateRange::new(d(2024, 2, 1), d(2024, 1, 1));
        assert_eq!(r.start, d(2024, 1, 1));
        assert_eq!(r.calendar_days(), 32);
        assert!(r.contains(d(2024, 1, 15)));
    }
}
