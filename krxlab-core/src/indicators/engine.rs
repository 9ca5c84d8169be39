//! Indicator engine: one `IndicatorRow` per `DailyPrice`.
//!
//! Windows are fixed: SMA 5/10/20/60/120, Bollinger 20 +/- 2 sigma, RSI 14,
//! MACD 12/26/9, volume SMA 20. The price series is the reference close
//! (adjusted close when present). Candle flags pair the reference close with
//! the session open/high/low; band touches compare session high/low with the
//! bands.

use super::{Bollinger, Indicator, Macd, Rsi, Sma};
use super::candle::{is_doji, is_hammer};
use crate::domain::{DailyPrice, IndicatorRow};

pub const MA_WINDOWS: [usize; 5] = [5, 10, 20, 60, 120];
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_MULTIPLIER: f64 = 2.0;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const VOLUME_MA_PERIOD: usize = 20;

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d != 0.0 => finite(n / d),
        _ => None,
    }
}

/// Crossing of `fast` over `slow` between yesterday and today.
fn crossed(today: (Option<f64>, Option<f64>), yesterday: (Option<f64>, Option<f64>), above: bool) -> Option<bool> {
    let (f, s) = (today.0?, today.1?);
    let (pf, ps) = (yesterday.0?, yesterday.1?);
    Some(if above {
        f > s && pf <= ps
    } else {
        f < s && pf >= ps
    })
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    smas: Vec<Sma>,
    bollinger: Bollinger,
    rsi: Rsi,
    macd: Macd,
    volume_sma: Sma,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self {
            smas: MA_WINDOWS.iter().map(|&p| Sma::new(p)).collect(),
            bollinger: Bollinger::new(BOLLINGER_PERIOD, BOLLINGER_MULTIPLIER),
            rsi: Rsi::new(RSI_PERIOD),
            macd: Macd::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL),
            volume_sma: Sma::new(VOLUME_MA_PERIOD),
        }
    }

    /// Compute rows for an ascending, date-unique price history of one
    /// instrument. Output is aligned index-for-index with `history`.
    pub fn compute(&self, history: &[DailyPrice]) -> Vec<IndicatorRow> {
        debug_assert!(
            history.windows(2).all(|w| w[0].date < w[1].date),
            "history must be strictly ascending by date"
        );

        let closes: Vec<f64> = history
            .iter()
            .map(|p| p.reference_close().unwrap_or(f64::NAN))
            .collect();
        let volumes: Vec<f64> = history.iter().map(|p| p.volume as f64).collect();

        let mas: Vec<Vec<f64>> = self.smas.iter().map(|s| s.compute(&closes)).collect();
        let bands = self.bollinger.compute(&closes);
        let rsi = self.rsi.compute(&closes);
        let macd = self.macd.compute(&closes);
        let volume_ma = self.volume_sma.compute(&volumes);

        let ma = |w: usize, i: usize| finite(mas[w][i]);
        // Column positions within MA_WINDOWS.
        let (ma5, ma20) = (0, 2);

        history
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let bb_upper = finite(bands.upper[i]);
                let bb_middle = finite(bands.middle[i]);
                let bb_lower = finite(bands.lower[i]);
                let volume_ma20 = finite(volume_ma[i]);

                let today = (ma(ma5, i), ma(ma20, i));
                let yesterday = if i > 0 {
                    (ma(ma5, i - 1), ma(ma20, i - 1))
                } else {
                    (None, None)
                };

                IndicatorRow {
                    instrument_id: p.instrument_id,
                    date: p.date,
                    ma5: ma(0, i),
                    ma10: ma(1, i),
                    ma20: ma(2, i),
                    ma60: ma(3, i),
                    ma120: ma(4, i),
                    bb_upper,
                    bb_middle,
                    bb_lower,
                    bb_width: match (bb_upper, bb_lower) {
                        (Some(u), Some(l)) => ratio(Some(u - l), bb_middle),
                        _ => None,
                    },
                    rsi: finite(rsi[i]),
                    macd: finite(macd.line[i]),
                    macd_signal: finite(macd.signal[i]),
                    macd_hist: finite(macd.histogram[i]),
                    volume_ma20,
                    volume_ratio: ratio(Some(p.volume as f64), volume_ma20).map(|r| r * 100.0),
                    is_doji: is_doji(p.open, p.high, p.low, p.reference_close()),
                    is_hammer: is_hammer(p.open, p.high, p.low, p.reference_close()),
                    golden_cross: crossed(today, yesterday, true),
                    death_cross: crossed(today, yesterday, false),
                    bb_upper_touch: p.high.zip(bb_upper).map(|(h, u)| h >= u),
                    bb_lower_touch: p.low.zip(bb_lower).map(|(l, b)| l <= b),
                }
            })
            .collect()
    }
}
