//! Instrument master records.

use super::market::Market;
use super::InstrumentId;
use serde::{Deserialize, Serialize};

/// One row of an exchange listing, before symbol normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedInstrument {
    pub local_code: String,
    pub name: String,
    pub market: Market,
}

impl ListedInstrument {
    /// Provider symbol for this listing (local code plus segment suffix).
    pub fn provider_symbol(&self) -> String {
        self.market.provider_symbol(&self.local_code)
    }
}

/// Descriptive company metadata from the market-data provider.
///
/// Every field is optional: profile lookups are best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

impl CompanyProfile {
    pub fn is_empty(&self) -> bool {
        self.sector.is_none() && self.industry.is_none() && self.description.is_none()
    }
}

/// Instrument ready to be upserted into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstrument {
    pub symbol: String,
    pub local_code: String,
    pub name: String,
    pub market: Market,
    pub profile: CompanyProfile,
}

/// Persisted instrument identity.
///
/// `symbol` is derived from `local_code` and `market` once and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: String,
    pub local_code: String,
    pub name: String,
    pub market: Market,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
}
