//! Run orchestration: discovery, fetching, enrichment, aggregation.
//!
//! State machine per run:
//!
//! ```text
//! Idle -> Discovering -> Fetching -> Enriching -> Aggregating -> Persisted -> Idle
//!              |              |
//!              +--------------+----> Degraded
//! ```
//!
//! A listing failure is fatal (`Err`). Too many failed symbols end the run in
//! `Degraded` with a summary; stats are not aggregated from a partial
//! cross-section. Storage errors abort the run.

use crate::config::{IndexSymbols, PipelineConfig, RunDefaults};
use crate::store::{PersistenceError, Store};
use chrono::NaiveDate;
use krxlab_core::aggregate::MarketAggregator;
use krxlab_core::calendar::{DateRange, TradingCalendar};
use krxlab_core::data::{
    to_daily_prices, to_index_bars, DataError, FetchProgress, FetchTarget, ListingProvider,
    PriceFetcher, PriceProvider, RegistryError, SymbolOutcome, SymbolRegistry, UniverseError,
};
use krxlab_core::domain::{Instrument, ListedInstrument, Market, NewInstrument};
use krxlab_core::indicators::IndicatorEngine;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("symbol discovery failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("data source error: {0}")]
    Data(#[from] DataError),

    #[error("universe error: {0}")]
    Universe(#[from] UniverseError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Discovering,
    Fetching,
    Enriching,
    Aggregating,
    Persisted,
    Degraded,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Discovering => "discovering",
            RunState::Fetching => "fetching",
            RunState::Enriching => "enriching",
            RunState::Aggregating => "aggregating",
            RunState::Persisted => "persisted",
            RunState::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunMode {
    /// Multi-year backfill.
    Initialize { years: u32 },
    /// Trailing refresh over the last `days` trading days.
    Update { days: u32 },
    /// Short backfill over the last `days` calendar days.
    Sample { days: u32 },
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Initialize { years } => write!(f, "initialize({years}y)"),
            RunMode::Update { days } => write!(f, "update({days}d)"),
            RunMode::Sample { days } => write!(f, "sample({days}d)"),
        }
    }
}

/// One symbol that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSymbol {
    pub symbol: String,
    pub attempts: u32,
    pub error: String,
}

/// Outcome of one run. Partial success is always explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub range: DateRange,
    /// `Persisted` or `Degraded`.
    pub state: RunState,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sorted provider symbols of failed instruments.
    pub failed_symbols: Vec<String>,
    pub failures: Vec<FailedSymbol>,
    /// Index symbols that could not be fetched. Not part of the failure ratio.
    pub failed_indices: Vec<String>,
    pub new_instruments: usize,
    pub delisted: usize,
    pub price_rows: usize,
    pub indicator_rows: usize,
    pub index_rows: usize,
    pub stat_rows: usize,
    pub transitions: Vec<RunState>,
    /// Store digest after a persisted run.
    pub fingerprint: Option<String>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn new(mode: RunMode, range: DateRange) -> Self {
        Self {
            mode,
            range,
            state: RunState::Idle,
            processed: 0,
            succeeded: 0,
            failed: 0,
            failed_symbols: Vec::new(),
            failures: Vec::new(),
            failed_indices: Vec::new(),
            new_instruments: 0,
            delisted: 0,
            price_rows: 0,
            indicator_rows: 0,
            index_rows: 0,
            stat_rows: 0,
            transitions: Vec::new(),
            fingerprint: None,
            elapsed_ms: 0,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_degraded(&self) -> bool {
        self.state == RunState::Degraded
    }

    pub fn failure_ratio(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.failed as f64 / self.processed as f64
        }
    }
}

/// A segment index fetched alongside instruments.
struct IndexTarget {
    market: Market,
    symbol: String,
}

impl FetchTarget for IndexTarget {
    fn provider_symbol(&self) -> &str {
        &self.symbol
    }
}

pub struct Orchestrator {
    registry: SymbolRegistry,
    fetcher: PriceFetcher,
    store: Store,
    engine: IndicatorEngine,
    aggregator: MarketAggregator,
    calendar: TradingCalendar,
    indices: IndexSymbols,
    defaults: RunDefaults,
    max_failure_ratio: f64,
    state: RunState,
}

impl Orchestrator {
    pub fn new(
        config: &PipelineConfig,
        listing: Arc<dyn ListingProvider>,
        prices: Arc<dyn PriceProvider>,
        store: Store,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let fetcher = PriceFetcher::new(prices, config.retry.policy(), config.fetch.concurrency)?;
        Ok(Self {
            registry: SymbolRegistry::new(listing),
            fetcher,
            store,
            engine: IndicatorEngine::new(),
            aggregator: MarketAggregator::new(),
            calendar: config.calendar(),
            indices: config.indices.clone(),
            defaults: config.run.clone(),
            max_failure_ratio: config.fetch.max_failure_ratio,
            state: RunState::Idle,
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn FetchProgress>) -> Self {
        self.fetcher = self.fetcher.with_progress(progress);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn defaults(&self) -> &RunDefaults {
        &self.defaults
    }

    /// Backfill `years` of history up to today.
    pub fn initialize(&mut self, years: u32) -> Result<RunSummary, PipelineError> {
        self.initialize_at(years, today())
    }

    pub fn initialize_at(&mut self, years: u32, as_of: NaiveDate) -> Result<RunSummary, PipelineError> {
        if years == 0 {
            return Err(PipelineError::InvalidArgument("years must be at least 1".into()));
        }
        let end = self.calendar.last_trading_day_on_or_before(as_of);
        let range = self.calendar.backfill_range(end, years);
        self.run(RunMode::Initialize { years }, range)
    }

    /// Refresh the last `days` trading days up to today.
    pub fn update(&mut self, days: u32) -> Result<RunSummary, PipelineError> {
        self.update_at(days, today())
    }

    pub fn update_at(&mut self, days: u32, as_of: NaiveDate) -> Result<RunSummary, PipelineError> {
        if days == 0 {
            return Err(PipelineError::InvalidArgument("days must be at least 1".into()));
        }
        let end = self.calendar.last_trading_day_on_or_before(as_of);
        let range = self.calendar.trailing_window(end, days);
        self.run(RunMode::Update { days }, range)
    }

    /// Backfill the last `days` calendar days, for demos.
    pub fn sample_at(&mut self, days: u32, as_of: NaiveDate) -> Result<RunSummary, PipelineError> {
        if days == 0 {
            return Err(PipelineError::InvalidArgument("days must be at least 1".into()));
        }
        let end = self.calendar.last_trading_day_on_or_before(as_of);
        let start = end - chrono::Duration::days(i64::from(days));
        self.run(RunMode::Sample { days }, DateRange::new(start, end))
    }

    fn enter(&mut self, next: RunState, summary: &mut RunSummary) {
        tracing::info!(from = %self.state, to = %next, mode = %summary.mode, "run state");
        self.state = next;
        summary.state = next;
        summary.transitions.push(next);
    }

    fn run(&mut self, mode: RunMode, range: DateRange) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let mut summary = RunSummary::new(mode, range);
        tracing::info!(%mode, %range, provider = self.fetcher.provider_name(), "run starting");

        let result = self.run_phases(&mut summary);
        summary.elapsed_ms = started.elapsed().as_millis().min(u64::MAX as u128) as u64;

        match result {
            Ok(()) => {
                tracing::info!(
                    state = %summary.state,
                    processed = summary.processed,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    elapsed_ms = summary.elapsed_ms,
                    "run finished"
                );
                Ok(summary)
            }
            Err(e) => {
                if self.state != RunState::Degraded {
                    self.enter(RunState::Degraded, &mut summary);
                }
                tracing::error!(error = %e, "run aborted");
                Err(e)
            }
        }
    }

    fn run_phases(&mut self, summary: &mut RunSummary) -> Result<(), PipelineError> {
        let range = summary.range;

        self.enter(RunState::Discovering, summary);
        let instruments = self.discover(summary)?;

        self.enter(RunState::Fetching, summary);
        let fetched = self.fetch_prices(&instruments, range, summary)?;
        self.fetch_indices(range, summary)?;

        let degraded = summary.failure_ratio() > self.max_failure_ratio;
        if degraded {
            tracing::warn!(
                failed = summary.failed,
                processed = summary.processed,
                max_ratio = self.max_failure_ratio,
                "failure ratio exceeded"
            );
        }

        self.enter(RunState::Enriching, summary);
        summary.indicator_rows = self.enrich(&fetched, range)?;

        if degraded {
            self.enter(RunState::Degraded, summary);
            return Ok(());
        }

        self.enter(RunState::Aggregating, summary);
        summary.stat_rows = self.aggregate(range)?;

        self.enter(RunState::Persisted, summary);
        summary.fingerprint = Some(self.store.fingerprint()?);

        // The summary keeps Persisted as the run outcome.
        tracing::info!(from = %self.state, to = %RunState::Idle, "run state");
        self.state = RunState::Idle;
        summary.transitions.push(RunState::Idle);
        Ok(())
    }

    /// List both segments, store instruments with their profiles and retire
    /// instruments missing from a full roster.
    fn discover(&self, summary: &mut RunSummary) -> Result<Vec<Instrument>, PipelineError> {
        let listed = self.registry.discover_all()?;

        let known: HashMap<String, Instrument> = self
            .store
            .instruments(None, false)?
            .into_iter()
            .map(|i| (i.symbol.clone(), i))
            .collect();

        let fresh: Vec<ListedInstrument> = listed
            .iter()
            .filter(|l| !known.contains_key(&l.provider_symbol()))
            .cloned()
            .collect();
        summary.new_instruments = fresh.len();

        // A backfill refreshes every profile; incremental runs only look up
        // instruments seen for the first time.
        let lookup = match summary.mode {
            RunMode::Initialize { .. } => &listed,
            RunMode::Update { .. } | RunMode::Sample { .. } => &fresh,
        };
        let profiles: HashMap<String, _> = lookup
            .iter()
            .map(ListedInstrument::provider_symbol)
            .zip(self.fetcher.fetch_profiles(lookup))
            .collect();

        let rows: Vec<NewInstrument> = listed
            .iter()
            .map(|l| {
                let symbol = l.provider_symbol();
                let profile = profiles.get(&symbol).cloned().unwrap_or_default();
                NewInstrument {
                    symbol,
                    local_code: l.local_code.clone(),
                    name: l.name.clone(),
                    market: l.market,
                    profile,
                }
            })
            .collect();
        let instruments = self.store.upsert_instruments(&rows)?;

        if self.retires_unlisted(summary.mode) {
            for market in Market::ALL {
                let symbols: Vec<String> = instruments
                    .iter()
                    .filter(|i| i.market == market)
                    .map(|i| i.symbol.clone())
                    .collect();
                summary.delisted += self.store.mark_inactive(market, &symbols)?;
            }
        } else {
            tracing::debug!(mode = %summary.mode, "listing is partial, no instruments retired");
        }

        tracing::info!(
            instruments = instruments.len(),
            new = summary.new_instruments,
            delisted = summary.delisted,
            "discovery complete"
        );
        Ok(instruments)
    }

    /// Only a full exchange roster outside sample mode retires instruments.
    fn retires_unlisted(&self, mode: RunMode) -> bool {
        self.registry.is_authoritative() && !matches!(mode, RunMode::Sample { .. })
    }

    /// Fetch, normalize and store prices per instrument. Returns the
    /// instruments whose prices were stored.
    fn fetch_prices(
        &self,
        instruments: &[Instrument],
        range: DateRange,
        summary: &mut RunSummary,
    ) -> Result<Vec<Instrument>, PipelineError> {
        let store = &self.store;
        let outcomes = self.fetcher.fetch_each(instruments, range, |instrument, rows| {
            let prior = match rows.first() {
                Some(first) => store.close_before(instrument.id, first.date)?,
                None => None,
            };
            let prices = to_daily_prices(instrument.id, &rows, prior);
            store.upsert_prices(&prices)
        })?;

        summary.processed = instruments.len();
        let mut fetched = Vec::with_capacity(instruments.len());
        for (instrument, outcome) in instruments.iter().zip(outcomes) {
            match outcome {
                SymbolOutcome::Fetched { value, .. } => {
                    summary.price_rows += value;
                    fetched.push(instrument.clone());
                }
                SymbolOutcome::Failed(failure) => {
                    tracing::warn!(
                        symbol = %failure.symbol,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "symbol failed"
                    );
                    summary.failures.push(FailedSymbol {
                        symbol: failure.symbol.clone(),
                        attempts: failure.attempts,
                        error: failure.error.to_string(),
                    });
                    summary.failed_symbols.push(failure.symbol);
                }
            }
        }
        summary.failed_symbols.sort();
        summary.failures.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        summary.succeeded = fetched.len();
        summary.failed = summary.processed - summary.succeeded;
        Ok(fetched)
    }

    fn fetch_indices(&self, range: DateRange, summary: &mut RunSummary) -> Result<(), PipelineError> {
        let targets: Vec<IndexTarget> = Market::ALL
            .iter()
            .map(|&market| IndexTarget {
                market,
                symbol: self.indices.symbol(market).to_string(),
            })
            .collect();

        let store = &self.store;
        let outcomes = self.fetcher.fetch_each(&targets, range, |target, rows| {
            let prior = match rows.first() {
                Some(first) => store.index_close_before(target.market, first.date)?,
                None => None,
            };
            store.upsert_index_bars(&to_index_bars(target.market, &rows, prior))
        })?;

        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Fetched { value, .. } => summary.index_rows += value,
                SymbolOutcome::Failed(failure) => {
                    tracing::warn!(symbol = %failure.symbol, error = %failure.error, "index fetch failed");
                    summary.failed_indices.push(failure.symbol);
                }
            }
        }
        Ok(())
    }

    /// Recompute indicators from each instrument's full stored history and
    /// overwrite the rows dated inside `range`.
    fn enrich(&self, instruments: &[Instrument], range: DateRange) -> Result<usize, PipelineError> {
        let store = &self.store;
        let engine = &self.engine;
        let written: Vec<usize> = self.fetcher.install(|| {
            instruments
                .par_iter()
                .map(|instrument| {
                    let history = store.price_history(instrument.id)?;
                    let rows: Vec<_> = engine
                        .compute(&history)
                        .into_iter()
                        .filter(|r| range.contains(r.date))
                        .collect();
                    tracing::debug!(symbol = %instrument.symbol, history = history.len(), rows = rows.len(), "enriched");
                    store.upsert_indicators(&rows)
                })
                .collect::<Result<Vec<_>, PersistenceError>>()
        })?;
        Ok(written.into_iter().sum())
    }

    /// One stat row per scope for every stored date in `range`, from a fresh
    /// cross-section snapshot per date.
    fn aggregate(&self, range: DateRange) -> Result<usize, PipelineError> {
        let mut written = 0;
        for date in self.store.price_dates(range)? {
            let snapshot = self.store.cross_section(date)?;
            let stats = self.aggregator.aggregate_cross_section(date, snapshot);
            written += self.store.upsert_market_stats(&stats)?;
        }
        Ok(written)
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
