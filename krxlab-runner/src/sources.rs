//! Listing and price source selection.
//!
//! Listing: the built-in sample universe, a universe TOML file, or the live
//! exchange listing, in that order of precedence. Prices: the live chart API,
//! a directory of CSV files, or the deterministic synthetic walk.

use crate::config::PipelineConfig;
use crate::pipeline::PipelineError;
use krxlab_core::data::{
    CircuitBreaker, CsvProvider, KrxListingProvider, ListingProvider, PriceProvider,
    SyntheticProvider, Universe, YahooProvider,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceSource {
    Live,
    Csv(PathBuf),
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSource {
    Live,
    UniverseFile(PathBuf),
    Sample,
}

impl ListingSource {
    /// Universe file from the config when set, otherwise the live listing.
    pub fn from_config(config: &PipelineConfig) -> Self {
        match &config.listing.universe_file {
            Some(path) => ListingSource::UniverseFile(path.clone()),
            None => ListingSource::Live,
        }
    }
}

pub struct Sources {
    pub listing: Arc<dyn ListingProvider>,
    pub prices: Arc<dyn PriceProvider>,
}

impl Sources {
    pub fn build(
        config: &PipelineConfig,
        listing: &ListingSource,
        prices: &PriceSource,
    ) -> Result<Self, PipelineError> {
        let timeout = config.request_timeout();

        let listing: Arc<dyn ListingProvider> = match listing {
            ListingSource::Sample => Arc::new(Universe::sample_krx()),
            ListingSource::UniverseFile(path) => Arc::new(Universe::from_file(path)?),
            ListingSource::Live => Arc::new(KrxListingProvider::new(timeout)?),
        };

        let prices: Arc<dyn PriceProvider> = match prices {
            PriceSource::Live => Arc::new(YahooProvider::new(
                Arc::new(CircuitBreaker::default_provider()),
                timeout,
            )?),
            PriceSource::Csv(dir) => Arc::new(CsvProvider::new(dir.clone())),
            PriceSource::Synthetic => Arc::new(SyntheticProvider::new(config.calendar())),
        };

        tracing::info!(listing = listing.name(), prices = prices.name(), "sources ready");
        Ok(Self { listing, prices })
    }
}
