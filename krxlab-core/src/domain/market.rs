//! Market segments of the exchange and their symbol conventions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The two listed equity boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    /// Main board.
    Kospi,
    /// Growth board.
    Kosdaq,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::Kospi, Market::Kosdaq];

    /// Stored market code ("KOSPI" / "KOSDAQ").
    pub fn code(self) -> &'static str {
        match self {
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
        }
    }

    /// Suffix appended to a local code to form the market-data provider symbol.
    pub fn provider_suffix(self) -> &'static str {
        match self {
            Market::Kospi => ".KS",
            Market::Kosdaq => ".KQ",
        }
    }

    /// Provider symbol for a local code on this board (`005930` -> `005930.KS`).
    pub fn provider_symbol(self, local_code: &str) -> String {
        format!("{local_code}{}", self.provider_suffix())
    }

    /// Market id used by the exchange listing service.
    pub fn listing_id(self) -> &'static str {
        match self {
            Market::Kospi => "STK",
            Market::Kosdaq => "KSQ",
        }
    }

    /// Default provider symbol of the segment's composite index.
    pub fn default_index_symbol(self) -> &'static str {
        match self {
            Market::Kospi => "^KS11",
            Market::Kosdaq => "^KQ11",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown market '{0}' (expected KOSPI or KOSDAQ)")]
pub struct MarketParseError(pub String);

impl FromStr for Market {
    type Err = MarketParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KOSPI" | "STK" => Ok(Market::Kospi),
            "KOSDAQ" | "KSQ" => Ok(Market::Kosdaq),
            _ => Err(MarketParseError(s.to_string())),
        }
    }
}

/// Scope of a market statistics row: one segment, or the whole exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatScope {
    Segment(Market),
    All,
}

impl StatScope {
    pub fn code(self) -> &'static str {
        match self {
            StatScope::Segment(m) => m.code(),
            StatScope::All => "ALL",
        }
    }

    pub fn parse(code: &str) -> Result<Self, MarketParseError> {
        if code.eq_ignore_ascii_case("ALL") {
            Ok(StatScope::All)
        } else {
            code.parse().map(StatScope::Segment)
        }
    }

    /// Whether a row from `market` belongs in this scope.
    pub fn includes(self, market: Market) -> bool {
        match self {
            StatScope::Segment(m) => m == market,
            StatScope::All => true,
        }
    }
}

impl fmt::Display for StatScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
