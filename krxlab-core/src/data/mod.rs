//! Data acquisition: providers, shape normalization, retry, the symbol
//! registry and the parallel price fetcher.

pub mod circuit_breaker;
pub mod csv_source;
pub mod fetcher;
pub mod frame;
pub mod krx;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_source::{read_csv_bars, CsvProvider};
pub use fetcher::{FetchFailure, FetchTarget, PriceFetcher, SymbolOutcome};
pub use frame::{to_daily_prices, to_index_bars, PriceFrame};
pub use krx::{is_valid_local_code, KrxListingProvider};
pub use provider::{
    DataError, FetchProgress, ListingProvider, LogProgress, PriceProvider, RawBar, SilentProgress,
};
pub use registry::{RegistryError, SymbolRegistry};
pub use retry::{Backoff, RetryExhausted, RetryPolicy};
pub use synthetic::SyntheticProvider;
pub use universe::{Universe, UniverseEntry, UniverseError};
pub use yahoo::YahooProvider;
