//! KRX Lab Runner: configuration, persistence and run orchestration.
//!
//! This crate builds on `krxlab-core` to provide:
//! - TOML pipeline configuration with defaults and validation
//! - SQLite store with idempotent upserts (r2d2 pool, WAL)
//! - The `initialize` / `update` orchestrator and its run summary
//! - Listing and price source selection (live, CSV, synthetic, sample)

pub mod config;
pub mod pipeline;
pub mod sources;
pub mod store;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{FailedSymbol, Orchestrator, PipelineError, RunMode, RunState, RunSummary};
pub use sources::{ListingSource, PriceSource, Sources};
pub use store::{PersistenceError, Store, StoreStatus, Table};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn store_is_send_sync() {
        assert_send::<Store>();
        assert_sync::<Store>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<PersistenceError>();
        assert_sync::<PersistenceError>();
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }

    #[test]
    fn summary_and_config_are_send_sync() {
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }
}
