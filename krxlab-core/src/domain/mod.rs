//! Domain types for the KRX ingestion pipeline.

pub mod indicator;
pub mod instrument;
pub mod market;
pub mod price;
pub mod stat;

pub use indicator::IndicatorRow;
pub use instrument::{CompanyProfile, Instrument, ListedInstrument, NewInstrument};
pub use market::{Market, MarketParseError, StatScope};
pub use price::{price_change, DailyPrice, MarketIndexBar};
pub use stat::MarketStat;

/// Row id assigned to an instrument by the store.
pub type InstrumentId = i64;
