//! Tagged provider payloads and normalization into canonical rows.
//!
//! A provider answers either with a single row (a one-session range) or with a
//! table. Both shapes are tagged explicitly and normalized here into one
//! ascending, date-unique `Vec<RawBar>` before anything downstream sees them.

use super::provider::{DataError, RawBar};
use crate::calendar::DateRange;
use crate::domain::{price_change, DailyPrice, InstrumentId, Market, MarketIndexBar};

/// Provider answer for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceFrame {
    /// The range covered exactly one session.
    SingleDay(RawBar),
    /// Zero or more sessions, in provider order.
    MultiDay(Vec<RawBar>),
}

impl PriceFrame {
    /// Tag a row set by its shape.
    pub fn from_rows(mut rows: Vec<RawBar>) -> Self {
        if rows.len() == 1 {
            PriceFrame::SingleDay(rows.remove(0))
        } else {
            PriceFrame::MultiDay(rows)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PriceFrame::SingleDay(_) => 1,
            PriceFrame::MultiDay(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical rows: inside `range`, ascending by date, one row per date
    /// (first occurrence wins), void rows dropped, prices sanitized.
    ///
    /// Fails with `ShapeMismatch` when nothing usable remains.
    pub fn normalize(self, symbol: &str, range: DateRange) -> Result<Vec<RawBar>, DataError> {
        let rows = match self {
            PriceFrame::SingleDay(bar) => vec![bar],
            PriceFrame::MultiDay(rows) => rows,
        };
        let received = rows.len();

        let mut rows: Vec<RawBar> = rows
            .into_iter()
            .filter(|b| range.contains(b.date))
            .filter_map(sanitize)
            .collect();

        // Stable sort keeps provider order among same-date rows.
        rows.sort_by_key(|b| b.date);
        rows.dedup_by_key(|b| b.date);

        if rows.is_empty() {
            return Err(DataError::ShapeMismatch {
                symbol: symbol.to_string(),
                reason: format!("no usable rows in {range} ({received} received)"),
            });
        }
        if rows.len() < received {
            tracing::debug!(symbol, received, kept = rows.len(), "normalization dropped rows");
        }
        Ok(rows)
    }
}

fn sanitize(mut bar: RawBar) -> Option<RawBar> {
    for v in [
        &mut bar.open,
        &mut bar.high,
        &mut bar.low,
        &mut bar.close,
        &mut bar.adj_close,
    ] {
        if !v.is_finite() || *v < 0.0 {
            *v = f64::NAN;
        }
    }
    if bar.is_void() {
        return None;
    }

    let all_present = !(bar.open.is_nan() || bar.high.is_nan() || bar.low.is_nan() || bar.close.is_nan());
    if all_present {
        let body_hi = bar.open.max(bar.close);
        let body_lo = bar.open.min(bar.close);
        if !(bar.high >= body_hi && body_lo >= bar.low) {
            // Halted sessions report zero open/high/low with a carried close.
            bar.open = f64::NAN;
            bar.high = f64::NAN;
            bar.low = f64::NAN;
        }
    }
    Some(bar)
}

fn present(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

fn volume_of(bar: &RawBar) -> i64 {
    i64::try_from(bar.volume).unwrap_or(i64::MAX)
}

/// Convert normalized rows into stored price rows.
///
/// `prior_close` is the last stored reference close before the first row; the
/// first row's change is `None` when there is none.
pub fn to_daily_prices(
    instrument_id: InstrumentId,
    rows: &[RawBar],
    prior_close: Option<f64>,
) -> Vec<DailyPrice> {
    let mut previous = prior_close;
    rows.iter()
        .map(|bar| {
            let close = present(bar.close);
            let adjusted_close = present(bar.adj_close);
            let reference = adjusted_close.or(close);
            let (change, change_rate) = price_change(previous, reference);
            previous = reference;
            DailyPrice {
                instrument_id,
                date: bar.date,
                open: present(bar.open),
                high: present(bar.high),
                low: present(bar.low),
                close,
                adjusted_close,
                volume: volume_of(bar),
                change,
                change_rate,
            }
        })
        .collect()
}

/// Convert normalized index rows into stored index bars.
pub fn to_index_bars(market: Market, rows: &[RawBar], prior_close: Option<f64>) -> Vec<MarketIndexBar> {
    let mut previous = prior_close;
    rows.iter()
        .map(|bar| {
            let close = present(bar.close);
            let (change, change_rate) = price_change(previous, close);
            previous = close;
            MarketIndexBar {
                market,
                date: bar.date,
                open: present(bar.open),
                high: present(bar.high),
                low: present(bar.low),
                close,
                volume: volume_of(bar),
                change,
                change_rate,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn bar(day: u32, close: f64) -> RawBar {
        RawBar {
            date: d(day),
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close,
            volume: 1_000,
            adj_close: close,
        }
    }

    fn march() -> DateRange {
        DateRange::new(d(1), d(31))
    }

    #[test]
    fn multi_day_is_sorted_and_deduplicated() {
        let frame = PriceFrame::MultiDay(vec![bar(6, 102.0), bar(4, 100.0), bar(5, 101.0), bar(4, 99.0)]);
        let rows = frame.normalize("005930.KS", march()).unwrap();
        let dates: Vec<_> = rows.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![d(4), d(5), d(6)]);
        // First occurrence wins
        assert_eq!(rows[0].close, 100.0);
    }

    #[test]
    fn single_day_normalizes_to_one_row() {
        let rows = PriceFrame::SingleDay(bar(4, 100.0))
            .normalize("005930.KS", march())
            .unwrap();
        assert_eq!(rows, vec![bar(4, 100.0)]);
    }

    #[test]
    fn from_rows_tags_by_shape() {
        assert!(matches!(PriceFrame::from_rows(vec![bar(4, 1.0)]), PriceFrame::SingleDay(_)));
        assert!(matches!(
            PriceFrame::from_rows(vec![bar(4, 1.0), bar(5, 1.0)]),
            PriceFrame::MultiDay(_)
        ));
    }

    #[test]
    fn empty_frame_is_shape_mismatch() {
        let err = PriceFrame::MultiDay(vec![]).normalize("005930.KS", march()).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { .. }));
    }

    #[test]
    fn rows_outside_range_are_dropped() {
        let range = DateRange::new(d(5), d(6));
        let rows = PriceFrame::MultiDay(vec![bar(4, 1.0), bar(5, 2.0), bar(7, 3.0)])
            .normalize("X", range)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, d(5));
    }

    #[test]
    fn halted_session_keeps_close_only() {
        let mut halted = bar(4, 50_000.0);
        halted.open = 0.0;
        halted.high = 0.0;
        halted.low = 0.0;
        halted.volume = 0;
        let rows = PriceFrame::SingleDay(halted).normalize("X", march()).unwrap();
        assert!(rows[0].open.is_nan() && rows[0].high.is_nan() && rows[0].low.is_nan());
        assert_eq!(rows[0].close, 50_000.0);
    }

    #[test]
    fn negative_prices_become_missing() {
        let mut b = bar(4, 10.0);
        b.low = -1.0;
        let rows = PriceFrame::SingleDay(b).normalize("X", march()).unwrap();
        assert!(rows[0].low.is_nan());
        assert_eq!(rows[0].high, 12.0);
    }

    #[test]
    fn daily_prices_chain_changes() {
        let rows = vec![bar(4, 100.0), bar(5, 110.0), bar(6, 99.0)];
        let prices = to_daily_prices(7, &rows, Some(80.0));
        assert_eq!(prices[0].change, Some(20.0));
        assert_eq!(prices[0].change_rate, Some(25.0));
        assert_eq!(prices[1].change, Some(10.0));
        assert_eq!(prices[2].change, Some(-11.0));
        assert!(prices.iter().all(|p| p.instrument_id == 7));

        let first_ever = to_daily_prices(7, &rows[..1], None);
        assert_eq!(first_ever[0].change, None);
    }

    #[test]
    fn index_bars_chain_changes() {
        let rows = vec![bar(4, 2_600.0), bar(5, 2_626.0)];
        let bars = to_index_bars(Market::Kospi, &rows, None);
        assert_eq!(bars[0].change, None);
        assert_eq!(bars[1].change, Some(26.0));
        assert!((bars[1].change_rate.unwrap() - 1.0).abs() < 1e-12);
    }
}
