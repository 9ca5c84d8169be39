//! Symbol registry: listed instruments per segment and provider symbols.

use super::provider::{DataError, ListingProvider};
use crate::domain::{ListedInstrument, Market};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Listing failures. Both are fatal to a run: downstream steps assume the
/// instrument list is complete.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("listing provider unavailable for {market}: {source}")]
    ProviderUnavailable {
        market: Market,
        #[source]
        source: DataError,
    },

    #[error("listing provider returned no instruments for {market}")]
    EmptyListing { market: Market },
}

pub struct SymbolRegistry {
    listing: Arc<dyn ListingProvider>,
}

impl SymbolRegistry {
    pub fn new(listing: Arc<dyn ListingProvider>) -> Self {
        Self { listing }
    }

    /// Whether absence from this listing means the instrument was delisted.
    pub fn is_authoritative(&self) -> bool {
        self.listing.is_authoritative()
    }

    /// Provider symbol for a local code: the code plus the segment suffix.
    pub fn to_provider_symbol(local_code: &str, market: Market) -> String {
        market.provider_symbol(local_code)
    }

    /// Listed instruments of one segment in listing order, duplicates removed.
    pub fn list_instruments(&self, market: Market) -> Result<Vec<ListedInstrument>, RegistryError> {
        let listed = self
            .listing
            .list(market)
            .map_err(|source| RegistryError::ProviderUnavailable { market, source })?;

        let mut seen = HashSet::new();
        let listed: Vec<_> = listed
            .into_iter()
            .filter(|l| seen.insert(l.local_code.clone()))
            .collect();

        if listed.is_empty() {
            return Err(RegistryError::EmptyListing { market });
        }
        tracing::info!(market = %market, count = listed.len(), "listing resolved");
        Ok(listed)
    }

    /// Both segments, all-or-nothing.
    pub fn discover_all(&self) -> Result<Vec<ListedInstrument>, RegistryError> {
        let mut all = Vec::new();
        for market in Market::ALL {
            all.extend(self.list_instruments(market)?);
        }
        Ok(all)
    }
}
