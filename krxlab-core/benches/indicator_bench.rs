//! Criterion benchmarks for the enrichment hot paths.
//!
//! Benchmarks:
//! 1. Indicator engine over one instrument's history (1y / 3y / 10y)
//! 2. Individual indicators over a 3y close series
//! 3. Market aggregation over a full-market cross-section

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use krxlab_core::aggregate::{CrossSection, MarketAggregator};
use krxlab_core::domain::{DailyPrice, Market};
use krxlab_core::indicators::{Bollinger, Indicator, IndicatorEngine, Macd, Rsi, Sma};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_history(n: usize) -> Vec<DailyPrice> {
    let base = NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = (50_000.0 + (i as f64 * 0.1).sin() * 5_000.0).round();
            DailyPrice {
                instrument_id: 1,
                date: base + Duration::days(i as i64),
                open: Some(close - 300.0),
                high: Some(close + 1_500.0),
                low: Some(close - 1_500.0),
                close: Some(close),
                adjusted_close: Some(close),
                volume: 1_000_000 + (i as i64 % 500_000),
                change: None,
                change_rate: None,
            }
        })
        .collect()
}

fn make_cross_section(n: usize) -> CrossSection {
    let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let rows = (0..n)
        .map(|i| {
            let market = if i % 3 == 0 { Market::Kosdaq } else { Market::Kospi };
            let close = 1_000.0 + (i % 997) as f64 * 50.0;
            let row = DailyPrice {
                instrument_id: i as i64,
                date,
                open: Some(close),
                high: Some(close),
                low: Some(close),
                close: Some(close),
                adjusted_close: Some(close),
                volume: 10_000 + i as i64,
                change: Some((i % 7) as f64 - 3.0),
                change_rate: None,
            };
            (market, row)
        })
        .collect();
    CrossSection::new(rows)
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_engine(c: &mut Criterion) {
    let engine = IndicatorEngine::new();
    let mut group = c.benchmark_group("indicator_engine");
    for days in [250usize, 750, 2_500] {
        let history = make_history(days);
        group.bench_with_input(BenchmarkId::from_parameter(days), &history, |b, h| {
            b.iter(|| engine.compute(black_box(h)))
        });
    }
    group.finish();
}

fn bench_single_indicators(c: &mut Criterion) {
    let closes: Vec<f64> = make_history(750)
        .iter()
        .filter_map(|p| p.close)
        .collect();

    let mut group = c.benchmark_group("indicators_750");
    group.bench_function("sma_120", |b| {
        let sma = Sma::new(120);
        b.iter(|| sma.compute(black_box(&closes)))
    });
    group.bench_function("rsi_14", |b| {
        let rsi = Rsi::new(14);
        b.iter(|| rsi.compute(black_box(&closes)))
    });
    group.bench_function("bollinger_20", |b| {
        let bb = Bollinger::new(20, 2.0);
        b.iter(|| bb.compute(black_box(&closes)))
    });
    group.bench_function("macd_12_26_9", |b| {
        let macd = Macd::default();
        b.iter(|| macd.compute(black_box(&closes)))
    });
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let aggregator = MarketAggregator::new();
    let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let snapshot = make_cross_section(2_700);
    c.bench_function("aggregate_2700", |b| {
        b.iter(|| aggregator.aggregate_cross_section(date, black_box(snapshot.clone())))
    });
}

criterion_group!(benches, bench_engine, bench_single_indicators, bench_aggregate);
criterion_main!(benches);
