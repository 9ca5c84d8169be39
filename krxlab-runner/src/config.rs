//! Pipeline configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! runnable configuration.

use chrono::NaiveDate;
use krxlab_core::calendar::TradingCalendar;
use krxlab_core::data::{Backoff, RetryPolicy};
use krxlab_core::domain::Market;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
    pub calendar: CalendarConfig,
    pub run: RunDefaults,
    pub indices: IndexSymbols,
    pub listing: ListingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            calendar: CalendarConfig::default(),
            run: RunDefaults::default(),
            indices: IndexSymbols::default(),
            listing: ListingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Worker pool size.
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    /// A run whose failed/processed ratio exceeds this ends Degraded.
    pub max_failure_ratio: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            request_timeout_secs: 30,
            max_failure_ratio: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            factor: 2.0,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Backoff::Exponential {
                base: Duration::from_millis(self.base_delay_ms),
                factor: self.factor,
                max: Duration::from_millis(self.max_delay_ms),
                jitter: self.jitter,
            },
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Exchange holidays on weekdays, as ISO dates.
    pub holidays: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub default_years: u32,
    /// Trading days covered by `update` when no count is given.
    pub default_days: u32,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            default_years: 3,
            default_days: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSymbols {
    pub kospi: String,
    pub kosdaq: String,
}

impl Default for IndexSymbols {
    fn default() -> Self {
        Self {
            kospi: Market::Kospi.default_index_symbol().to_string(),
            kosdaq: Market::Kosdaq.default_index_symbol().to_string(),
        }
    }
}

impl IndexSymbols {
    pub fn symbol(&self, market: Market) -> &str {
        match market {
            Market::Kospi => &self.kospi,
            Market::Kosdaq => &self.kosdaq,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Static universe TOML used instead of the live exchange listing.
    pub universe_file: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch.concurrency",
                reason: "must be at least 1".into(),
            });
        }
        let ratio = self.fetch.max_failure_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::Invalid {
                field: "fetch.max_failure_ratio",
                reason: format!("must be within [0, 1], got {ratio}"),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.retry.factor.is_finite() && self.retry.factor >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "retry.factor",
                reason: format!("must be >= 1, got {}", self.retry.factor),
            });
        }
        Ok(())
    }

    pub fn calendar(&self) -> TradingCalendar {
        TradingCalendar::new(self.calendar.holidays.iter().copied())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.request_timeout_secs)
    }
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("data").join("krxlab.db")
}
