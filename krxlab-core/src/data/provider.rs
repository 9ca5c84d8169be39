//! Provider traits and structured error types.
//!
//! `PriceProvider` abstracts over market-data sources (Yahoo Finance, CSV
//! import, synthetic walks) and `ListingProvider` over exchange rosters, so
//! implementations can be swapped and stubbed in tests.

use super::frame::PriceFrame;
use crate::calendar::DateRange;
use crate::domain::{CompanyProfile, ListedInstrument, Market};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV bar from a provider, before normalization.
///
/// Missing prices are carried as `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

impl RawBar {
    /// A bar where every price is missing carries no information.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() && self.high.is_nan() && self.low.is_nan() && self.close.is_nan()
    }
}

/// Structured error types for provider operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} for {symbol}")]
    HttpStatus { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("shape mismatch for {symbol}: {reason}")]
    ShapeMismatch { symbol: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataError::NetworkUnreachable(_)
            | DataError::Timeout(_)
            | DataError::RateLimited { .. } => true,
            DataError::HttpStatus { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }
}

/// Market-data provider: daily bars and company metadata by symbol.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for one provider symbol over an inclusive range.
    ///
    /// Implementations must tag single-row answers as `PriceFrame::SingleDay`.
    fn fetch_daily(&self, symbol: &str, range: DateRange) -> Result<PriceFrame, DataError>;

    /// Company profile lookup. Sources without metadata return an empty profile.
    fn fetch_profile(&self, _symbol: &str) -> Result<CompanyProfile, DataError> {
        Ok(CompanyProfile::default())
    }

    /// Whether the provider currently accepts requests (not rate-limited or blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Exchange-listing provider: the roster of listed codes per segment.
pub trait ListingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Every instrument listed on `market` as of today, in listing order.
    fn list(&self, market: Market) -> Result<Vec<ListedInstrument>, DataError>;

    /// `true` when `list` is the exchange's complete roster, so an
    /// instrument missing from it has been delisted.
    fn is_authoritative(&self) -> bool {
        true
    }
}

/// Progress callback for multi-symbol operations.
///
/// Called concurrently from pool workers.
pub trait FetchProgress: Send + Sync {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// On success `result` carries the normalized row count.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: Result<usize, &DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits tracing events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::debug!(symbol, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: Result<usize, &DataError>) {
        match result {
            Ok(rows) => tracing::debug!(symbol, rows, "[{}/{}] ok", index + 1, total),
            Err(e) => tracing::warn!(symbol, error = %e, "[{}/{}] failed", index + 1, total),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "fetch batch complete");
    }
}

/// Progress reporter that discards every event.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _symbol: &str, _index: usize, _total: usize, _result: Result<usize, &DataError>) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
