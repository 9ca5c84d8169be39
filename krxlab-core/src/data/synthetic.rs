//! Deterministic synthetic price provider.
//!
//! Produces a random walk per symbol, seeded from the BLAKE3 hash of the
//! symbol. The walk always starts at a fixed epoch, so the bar for a given
//! `(symbol, date)` is the same whatever range is requested. Clearly fake
//! data for demos and offline runs.

use super::frame::PriceFrame;
use super::provider::{DataError, PriceProvider, RawBar};
use crate::calendar::{DateRange, TradingCalendar};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SyntheticProvider {
    calendar: TradingCalendar,
    epoch: NaiveDate,
}

impl SyntheticProvider {
    pub fn new(calendar: TradingCalendar) -> Self {
        Self {
            calendar,
            epoch: NaiveDate::from_ymd_opt(2015, 1, 2).unwrap_or(NaiveDate::MIN),
        }
    }

    fn walk(&self, symbol: &str, until: NaiveDate) -> Vec<RawBar> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        // KRX tick sizes make whole-won prices realistic.
        let mut price: f64 = rng.gen_range(5_000.0..150_000.0_f64).round();
        let mut bars = Vec::new();
        if until < self.epoch {
            return bars;
        }

        for date in self.calendar.trading_days(DateRange::new(self.epoch, until)) {
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = (price * (1.0 + daily_return)).round().max(1.0);
            let high = (open.max(close) * (1.0 + rng.gen_range(0.0..0.01))).round();
            let low = (open.min(close) * (1.0 - rng.gen_range(0.0..0.01))).round();
            let volume = rng.gen_range(100_000..5_000_000u64);

            bars.push(RawBar {
                date,
                open,
                high,
                low,
                close,
                volume,
                adj_close: close,
            });
            price = close;
        }
        bars
    }
}

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_daily(&self, symbol: &str, range: DateRange) -> Result<PriceFrame, DataError> {
        let rows = self
            .walk(symbol, range.end)
            .into_iter()
            .filter(|b| range.contains(b.date))
            .collect();
        Ok(PriceFrame::from_rows(rows))
    }
}
