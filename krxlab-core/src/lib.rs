//! KRX Lab Core: domain types, data acquisition and enrichment.
//!
//! This crate holds everything that does not touch the database:
//! - Domain types (instruments, daily prices, indicator rows, market stats)
//! - Trading calendar and date windows
//! - Listing and price providers (KRX, Yahoo Finance, CSV, synthetic)
//! - Symbol registry and the bounded parallel price fetcher with retry policy
//! - Indicator engine (SMA, Bollinger, RSI, MACD, crosses, candle flags)
//! - Market breadth aggregation

pub mod aggregate;
pub mod calendar;
pub mod data;
pub mod domain;
pub mod indicators;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed across pool workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::DailyPrice>();
        require_sync::<domain::DailyPrice>();
        require_send::<domain::IndicatorRow>();
        require_sync::<domain::IndicatorRow>();
        require_send::<domain::MarketStat>();
        require_sync::<domain::MarketStat>();
        require_send::<domain::Instrument>();
        require_sync::<domain::Instrument>();

        require_send::<data::PriceFetcher>();
        require_sync::<data::PriceFetcher>();
        require_send::<data::SymbolRegistry>();
        require_sync::<data::SymbolRegistry>();
        require_send::<data::FetchFailure>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();

        require_send::<indicators::IndicatorEngine>();
        require_sync::<indicators::IndicatorEngine>();
        require_send::<aggregate::CrossSection>();
    }
}
