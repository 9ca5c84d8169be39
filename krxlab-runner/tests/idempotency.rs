//! Re-running over the same window leaves stored tables byte-identical, and
//! overlapping windows never duplicate keys.

mod common;

use common::*;
use krxlab_core::domain::Market;
use krxlab_runner::{Store, Table};

const DATA_TABLES: [Table; 4] = [
    Table::DailyPrices,
    Table::TechnicalIndicators,
    Table::MarketIndices,
    Table::MarketStats,
];

fn fixture(bars: usize) -> (StubListing, FixtureProvider) {
    let dates = weekdays_ending(as_of(), bars);
    let listing = StubListing::new(vec![
        listed("005930", Market::Kospi),
        listed("000660", Market::Kospi),
        listed("068270", Market::Kosdaq),
    ]);
    let prices = FixtureProvider::default()
        .with("005930.KS", linear_bars(&dates, 70_000.0, 100.0, 12_000_000))
        .with("000660.KS", linear_bars(&dates, 150_000.0, -50.0, 3_000_000))
        .with("068270.KQ", linear_bars(&dates, 180_000.0, 25.0, 900_000))
        .with("^KS11", linear_bars(&dates, 2_600.0, 2.0, 0))
        .with("^KQ11", linear_bars(&dates, 850.0, 1.0, 0));
    (listing, prices)
}

fn fingerprints(store: &Store) -> Vec<String> {
    DATA_TABLES
        .iter()
        .map(|&t| store.table_fingerprint(t).unwrap())
        .collect()
}

#[test]
fn update_twice_leaves_tables_unchanged() {
    // GIVEN: one completed update(3)
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("krxlab.db"));
    let (listing, prices) = fixture(40);
    let (mut orchestrator, _) = orchestrator(&config, listing, prices);
    let first = orchestrator.update_at(3, as_of()).unwrap();
    let before = fingerprints(orchestrator.store());

    // WHEN: the same update runs again with no provider-side change
    let second = orchestrator.update_at(3, as_of()).unwrap();

    // THEN: every data table is byte-for-byte the same
    assert_eq!(fingerprints(orchestrator.store()), before);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(second.new_instruments, 0);
    assert_eq!(second.range, first.range);
}

#[test]
fn update_after_initialize_recomputes_identical_values() {
    // GIVEN: a full backfill
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("krxlab.db"));
    let (listing, prices) = fixture(200);
    let (mut orchestrator, _) = orchestrator(&config, listing, prices);
    orchestrator.initialize_at(1, as_of()).unwrap();
    let before = fingerprints(orchestrator.store());

    // WHEN: an overlapping trailing update runs
    let summary = orchestrator.update_at(5, as_of()).unwrap();

    // THEN: overwritten rows equal the backfilled ones
    assert_eq!(summary.price_rows, 3 * 5);
    assert_eq!(fingerprints(orchestrator.store()), before);
}

#[test]
fn overlapping_runs_never_duplicate_keys() {
    // GIVEN
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("krxlab.db"));
    let (listing, prices) = fixture(60);
    let (mut orchestrator, _) = orchestrator(&config, listing, prices);

    // WHEN: a backfill followed by two overlapping updates
    orchestrator.initialize_at(1, as_of()).unwrap();
    orchestrator.update_at(3, as_of()).unwrap();
    orchestrator.update_at(10, as_of()).unwrap();

    // THEN: one row per natural key
    let store = orchestrator.store();
    assert_eq!(store.row_count(Table::Instruments).unwrap(), 3);
    assert_eq!(store.row_count(Table::DailyPrices).unwrap(), 3 * 60);
    assert_eq!(store.row_count(Table::TechnicalIndicators).unwrap(), 3 * 60);
    assert_eq!(store.row_count(Table::MarketIndices).unwrap(), 2 * 60);
    assert_eq!(store.row_count(Table::MarketStats).unwrap(), 3 * 60);

    for instrument in store.instruments(None, false).unwrap() {
        let rows = store.indicators(instrument.id).unwrap();
        assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
    }
}

#[test]
fn reopened_store_keeps_instrument_ids() {
    // GIVEN: a run against a database file
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("krxlab.db"));
    let (listing, prices) = fixture(10);
    let (mut orchestrator, _) = orchestrator(&config, listing, prices);
    orchestrator.update_at(3, as_of()).unwrap();
    let ids: Vec<_> = orchestrator
        .store()
        .instruments(None, false)
        .unwrap()
        .into_iter()
        .map(|i| (i.symbol, i.id))
        .collect();
    drop(orchestrator);

    // WHEN: a new orchestrator opens the same file
    let (listing, prices) = fixture(10);
    let (mut reopened, _) = common::orchestrator(&config, listing, prices);
    reopened.update_at(3, as_of()).unwrap();

    // THEN: ids are stable
    let again: Vec<_> = reopened
        .store()
        .instruments(None, false)
        .unwrap()
        .into_iter()
        .map(|i| (i.symbol, i.id))
        .collect();
    assert_eq!(again, ids);
}
