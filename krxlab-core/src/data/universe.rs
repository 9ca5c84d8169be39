//! Static universe configuration: segment-organized listings in TOML.
//!
//! Stands in for the live exchange listing in offline runs and sample mode:
//!
//! ```toml
//! [[segments.KOSPI]]
//! code = "005930"
//! name = "삼성전자"
//! ```

use super::krx::is_valid_local_code;
use super::provider::{DataError, ListingProvider};
use crate::domain::{ListedInstrument, Market, MarketParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    UnknownMarket(#[from] MarketParseError),

    #[error("invalid local code '{code}' in {market}")]
    InvalidCode { market: String, code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub code: String,
    pub name: String,
}

/// Listings keyed by market code ("KOSPI", "KOSDAQ").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    pub segments: BTreeMap<String, Vec<UniverseEntry>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate: market keys must be known, codes well-formed.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        let universe: Universe = toml::from_str(content)?;
        universe.validate()?;
        Ok(universe)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), UniverseError> {
        for (key, entries) in &self.segments {
            key.parse::<Market>()?;
            if let Some(bad) = entries.iter().find(|e| !is_valid_local_code(&e.code)) {
                return Err(UniverseError::InvalidCode {
                    market: key.clone(),
                    code: bad.code.clone(),
                });
            }
        }
        Ok(())
    }

    /// Listings for one market, in file order.
    pub fn segment(&self, market: Market) -> Vec<ListedInstrument> {
        self.segments
            .iter()
            .filter(|(key, _)| key.parse::<Market>().ok() == Some(market))
            .flat_map(|(_, entries)| entries.iter())
            .map(|e| ListedInstrument {
                local_code: e.code.clone(),
                name: e.name.clone(),
                market,
            })
            .collect()
    }

    pub fn instrument_count(&self) -> usize {
        self.segments.values().map(Vec::len).sum()
    }

    /// Eight large caps across both boards.
    pub fn sample_krx() -> Self {
        let entries = |rows: &[(&str, &str)]| -> Vec<UniverseEntry> {
            rows.iter()
                .map(|(code, name)| UniverseEntry {
                    code: code.to_string(),
                    name: name.to_string(),
                })
                .collect()
        };

        let mut segments = BTreeMap::new();
        segments.insert(
            Market::Kospi.code().to_string(),
            entries(&[
                ("005930", "삼성전자"),
                ("000660", "SK하이닉스"),
                ("035420", "NAVER"),
                ("035720", "카카오"),
                ("005490", "POSCO홀딩스"),
            ]),
        );
        segments.insert(
            Market::Kosdaq.code().to_string(),
            entries(&[
                ("293490", "카카오게임즈"),
                ("259960", "크래프톤"),
                ("068270", "셀트리온"),
            ]),
        );
        Self { segments }
    }
}

impl ListingProvider for Universe {
    fn name(&self) -> &str {
        "static_universe"
    }

    fn list(&self, market: Market) -> Result<Vec<ListedInstrument>, DataError> {
        Ok(self.segment(market))
    }

    /// Static universes are subsets; nothing is retired from them.
    fn is_authoritative(&self) -> bool {
        false
    }
}
