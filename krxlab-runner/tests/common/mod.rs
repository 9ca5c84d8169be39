//! Shared fixtures for pipeline integration tests: a stub listing, a fixture
//! price provider, and helpers to build weekday bar series.

#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use krxlab_core::calendar::DateRange;
use krxlab_core::data::{DataError, ListingProvider, PriceFrame, PriceProvider, RawBar};
use krxlab_core::domain::{CompanyProfile, ListedInstrument, Market};
use krxlab_runner::{Orchestrator, PipelineConfig, Store};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Tuesday; last bar of every fixture series.
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
}

/// `n` weekdays ending at `end`, ascending.
pub fn weekdays_ending(end: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut d = end;
    while dates.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(d);
        }
        d -= Duration::days(1);
    }
    dates.reverse();
    dates
}

/// Linear close series: `start + step * i`.
pub fn linear_bars(dates: &[NaiveDate], start: f64, step: f64, volume: u64) -> Vec<RawBar> {
    dates
        .iter()
        .enumerate()
        .map(|(i, &date)| {
            let close = start + step * i as f64;
            RawBar {
                date,
                open: close,
                high: close + 10.0,
                low: close - 10.0,
                close,
                volume,
                adj_close: close,
            }
        })
        .collect()
}

pub fn listed(code: &str, market: Market) -> ListedInstrument {
    ListedInstrument {
        local_code: code.to_string(),
        name: format!("Company {code}"),
        market,
    }
}

/// Listing provider answering from a fixed map, or failing every call.
pub struct StubListing {
    pub segments: HashMap<Market, Vec<ListedInstrument>>,
    pub unavailable: bool,
    pub authoritative: bool,
}

impl StubListing {
    pub fn new(instruments: Vec<ListedInstrument>) -> Self {
        let mut segments: HashMap<Market, Vec<ListedInstrument>> = HashMap::new();
        for i in instruments {
            segments.entry(i.market).or_default().push(i);
        }
        Self {
            segments,
            unavailable: false,
            authoritative: true,
        }
    }

    /// A subset of the exchange, like a universe file.
    pub fn partial(mut self) -> Self {
        self.authoritative = false;
        self
    }

    pub fn unavailable() -> Self {
        Self {
            segments: HashMap::new(),
            unavailable: true,
            authoritative: true,
        }
    }
}

impl ListingProvider for StubListing {
    fn name(&self) -> &str {
        "stub_listing"
    }

    fn list(&self, market: Market) -> Result<Vec<ListedInstrument>, DataError> {
        if self.unavailable {
            return Err(DataError::NetworkUnreachable("listing endpoint down".into()));
        }
        Ok(self.segments.get(&market).cloned().unwrap_or_default())
    }

    fn is_authoritative(&self) -> bool {
        self.authoritative
    }
}

/// Serves fixed bars per provider symbol. Symbols in `timing_out` always
/// time out; unknown symbols are not found.
#[derive(Default)]
pub struct FixtureProvider {
    pub bars: HashMap<String, Vec<RawBar>>,
    pub timing_out: HashSet<String>,
    pub profiles: HashMap<String, CompanyProfile>,
    pub calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn with(mut self, symbol: &str, bars: Vec<RawBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn timing_out(mut self, symbol: &str) -> Self {
        self.timing_out.insert(symbol.to_string());
        self
    }

    pub fn with_sector(mut self, symbol: &str, sector: &str) -> Self {
        let profile = CompanyProfile {
            sector: Some(sector.to_string()),
            ..CompanyProfile::default()
        };
        self.profiles.insert(symbol.to_string(), profile);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceProvider for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch_daily(&self, symbol: &str, range: DateRange) -> Result<PriceFrame, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.timing_out.contains(symbol) {
            return Err(DataError::Timeout(format!("{symbol} did not answer")));
        }
        let bars = self.bars.get(symbol).ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        let rows: Vec<RawBar> = bars.iter().filter(|b| range.contains(b.date)).cloned().collect();
        Ok(PriceFrame::from_rows(rows))
    }

    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, DataError> {
        Ok(self.profiles.get(symbol).cloned().unwrap_or_default())
    }
}

/// Fast retries, small pool.
pub fn test_config(db: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.database_path = db.to_path_buf();
    config.fetch.concurrency = 4;
    config.retry.max_attempts = 2;
    config.retry.base_delay_ms = 0;
    config.retry.max_delay_ms = 0;
    config.retry.jitter = false;
    config
}

pub fn orchestrator(
    config: &PipelineConfig,
    listing: StubListing,
    prices: FixtureProvider,
) -> (Orchestrator, Arc<FixtureProvider>) {
    let prices = Arc::new(prices);
    let store = Store::open(&config.database_path).unwrap();
    let orchestrator = Orchestrator::new(config, Arc::new(listing), prices.clone(), store)
        .unwrap()
        .with_progress(Arc::new(krxlab_core::data::SilentProgress));
    (orchestrator, prices)
}
