//! Bounded parallel price fetching with per-symbol isolation.
//!
//! Each symbol is an independent unit of work on a dedicated rayon pool whose
//! size is fixed at construction. A symbol that exhausts its retry attempts is
//! reported as a `FetchFailure`; the rest of the batch is unaffected.

use super::provider::{DataError, FetchProgress, LogProgress, PriceProvider, RawBar};
use super::retry::RetryPolicy;
use crate::calendar::DateRange;
use crate::domain::{CompanyProfile, Instrument, ListedInstrument};
use rayon::prelude::*;
use std::convert::Infallible;
use std::sync::Arc;

/// Anything that names a provider symbol can be fetched.
pub trait FetchTarget: Sync {
    fn provider_symbol(&self) -> &str;
}

impl FetchTarget for String {
    fn provider_symbol(&self) -> &str {
        self
    }
}

impl FetchTarget for Instrument {
    fn provider_symbol(&self) -> &str {
        &self.symbol
    }
}

/// A symbol whose retries were exhausted (or that failed permanently).
#[derive(Debug)]
pub struct FetchFailure {
    pub symbol: String,
    pub attempts: u32,
    pub error: DataError,
}

/// Per-symbol result of a batch.
#[derive(Debug)]
pub enum SymbolOutcome<T> {
    Fetched { symbol: String, value: T },
    Failed(FetchFailure),
}

impl<T> SymbolOutcome<T> {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Fetched { symbol, .. } => symbol,
            SymbolOutcome::Failed(f) => &f.symbol,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, SymbolOutcome::Fetched { .. })
    }
}

pub struct PriceFetcher {
    provider: Arc<dyn PriceProvider>,
    retry: RetryPolicy,
    pool: rayon::ThreadPool,
    concurrency: usize,
    progress: Arc<dyn FetchProgress>,
}

impl PriceFetcher {
    /// `concurrency` is the fixed worker count, independent of batch size.
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Result<Self, DataError> {
        let concurrency = concurrency.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("krx-fetch-{i}"))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build fetch pool: {e}")))?;

        Ok(Self {
            provider,
            retry,
            pool,
            concurrency,
            progress: Arc::new(LogProgress),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `op` inside the fetch pool, so parallel iterators it starts share
    /// the same worker bound.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// Fetch and normalize one symbol under the retry policy.
    pub fn fetch_one(&self, symbol: &str, range: DateRange) -> Result<Vec<RawBar>, FetchFailure> {
        self.retry
            .run(|_| {
                self.provider
                    .fetch_daily(symbol, range)
                    .and_then(|frame| frame.normalize(symbol, range))
            })
            .map_err(|e| FetchFailure {
                symbol: symbol.to_string(),
                attempts: e.attempts,
                error: e.error,
            })
    }

    /// Fetch every target on the pool and hand each success to `handle`
    /// inside the same worker.
    ///
    /// Fetch failures become `SymbolOutcome::Failed`. An error from `handle`
    /// stops the batch and is returned; work already handled stays handled.
    /// Outcomes are returned in input order.
    pub fn fetch_each<I, T, E, F>(
        &self,
        targets: &[I],
        range: DateRange,
        handle: F,
    ) -> Result<Vec<SymbolOutcome<T>>, E>
    where
        I: FetchTarget,
        T: Send,
        E: Send,
        F: Fn(&I, Vec<RawBar>) -> Result<T, E> + Sync,
    {
        let total = targets.len();
        let progress = &self.progress;

        let outcomes: Vec<SymbolOutcome<T>> = self.pool.install(|| {
            targets
                .par_iter()
                .enumerate()
                .map(|(index, target)| {
                    let symbol = target.provider_symbol();
                    progress.on_start(symbol, index, total);
                    match self.fetch_one(symbol, range) {
                        Ok(rows) => {
                            progress.on_complete(symbol, index, total, Ok(rows.len()));
                            let value = handle(target, rows)?;
                            Ok(SymbolOutcome::Fetched {
                                symbol: symbol.to_string(),
                                value,
                            })
                        }
                        Err(failure) => {
                            progress.on_complete(symbol, index, total, Err(&failure.error));
                            Ok(SymbolOutcome::Failed(failure))
                        }
                    }
                })
                .collect::<Result<Vec<_>, E>>()
        })?;

        let succeeded = outcomes.iter().filter(|o| o.is_fetched()).count();
        progress.on_batch_complete(succeeded, total - succeeded, total);
        Ok(outcomes)
    }

    /// Fetch every symbol and return the normalized rows.
    pub fn fetch_all(&self, symbols: &[String], range: DateRange) -> Vec<SymbolOutcome<Vec<RawBar>>> {
        match self.fetch_each(symbols, range, |_, rows| Ok::<_, Infallible>(rows)) {
            Ok(outcomes) => outcomes,
            Err(never) => match never {},
        }
    }

    /// Best-effort company profiles, in input order. Failures yield an empty
    /// profile.
    pub fn fetch_profiles(&self, listed: &[ListedInstrument]) -> Vec<CompanyProfile> {
        self.pool.install(|| {
            listed
                .par_iter()
                .map(|l| {
                    let symbol = l.provider_symbol();
                    match self.retry.run(|_| self.provider.fetch_profile(&symbol)) {
                        Ok(profile) => profile,
                        Err(e) => {
                            tracing::debug!(symbol = %symbol, error = %e.error, "profile unavailable");
                            CompanyProfile::default()
                        }
                    }
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::PriceFrame;
    use crate::data::provider::SilentProgress;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn bar(day: u32) -> RawBar {
        RawBar {
            date: d(day),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 10,
            adj_close: 100.5,
        }
    }

    /// Fails `failures_before_success` times per symbol, then answers.
    struct FlakyProvider {
        failures_before_success: usize,
        permanent: Vec<String>,
        calls: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(failures_before_success: usize) -> Self {
            Self {
                failures_before_success,
                permanent: Vec::new(),
                calls: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl PriceProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn fetch_daily(&self, symbol: &str, _range: DateRange) -> Result<PriceFrame, DataError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let n = {
                let mut calls = self.calls.lock().unwrap();
                let c = calls.entry(symbol.to_string()).or_insert(0);
                *c += 1;
                *c
            };
            if self.permanent.iter().any(|s| s == symbol) || n <= self.failures_before_success {
                return Err(DataError::Timeout(format!("{symbol} timed out")));
            }
            Ok(PriceFrame::MultiDay(vec![bar(5), bar(4)]))
        }
    }

    fn fetcher(provider: Arc<FlakyProvider>, attempts: u32, workers: usize) -> PriceFetcher {
        PriceFetcher::new(provider, RetryPolicy::immediate(attempts), workers)
            .unwrap()
            .with_progress(Arc::new(SilentProgress))
    }

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:06}.KS", i)).collect()
    }

    #[test]
    fn retries_then_normalizes() {
        let provider = Arc::new(FlakyProvider::new(2));
        let f = fetcher(provider.clone(), 3, 2);
        let rows = f.fetch_one("005930.KS", DateRange::new(d(1), d(31))).unwrap();
        assert_eq!(rows.iter().map(|b| b.date).collect::<Vec<_>>(), vec![d(4), d(5)]);
        assert_eq!(provider.calls.lock().unwrap()["005930.KS"], 3);
    }

    #[test]
    fn exhausted_symbols_are_isolated() {
        let mut provider = FlakyProvider::new(0);
        provider.permanent = vec!["000003.KS".into(), "000007.KS".into()];
        let provider = Arc::new(provider);
        let f = fetcher(provider.clone(), 3, 4);

        let outcomes = f.fetch_all(&symbols(10), DateRange::new(d(1), d(31)));
        assert_eq!(outcomes.len(), 10);
        let failed: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                SymbolOutcome::Failed(f) => Some((f.symbol.as_str(), f.attempts)),
                _ => None,
            })
            .collect();
        assert_eq!(failed, vec![("000003.KS", 3), ("000007.KS", 3)]);
        assert_eq!(outcomes.iter().filter(|o| o.is_fetched()).count(), 8);
        // Input order is preserved
        assert_eq!(outcomes[9].symbol(), "000009.KS");
    }

    #[test]
    fn pool_size_bounds_in_flight_requests() {
        let provider = Arc::new(FlakyProvider::new(0));
        let f = fetcher(provider.clone(), 1, 3);
        let _ = f.fetch_all(&symbols(30), DateRange::new(d(1), d(31)));
        let peak = provider.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight {peak} exceeds pool size");
        assert_eq!(f.concurrency(), 3);
    }

    #[test]
    fn handler_error_stops_the_batch() {
        let provider = Arc::new(FlakyProvider::new(0));
        let f = fetcher(provider, 1, 2);
        let result = f.fetch_each(&symbols(5), DateRange::new(d(1), d(31)), |target, _rows| {
            if target == "000002.KS" {
                Err("disk full")
            } else {
                Ok(())
            }
        });
        assert_eq!(result.unwrap_err(), "disk full");
    }

    #[test]
    fn profiles_fall_back_to_empty() {
        let provider = Arc::new(FlakyProvider::new(0));
        let f = fetcher(provider, 1, 2);
        let listed = vec![ListedInstrument {
            local_code: "005930".into(),
            name: "삼성전자".into(),
            market: crate::domain::Market::Kospi,
        }];
        assert_eq!(f.fetch_profiles(&listed), vec![CompanyProfile::default()]);
    }
}
