//! Criterion benchmarks for the fetch and analytics hot paths.
//!
//! Benchmarks:
//! 1. Range planning over a large universe
//! 2. Merging overlapping chunk fragments
//! 3. Orchestrated fetch with scripted providers (no waits)
//! 4. Returns and indicator computation
//! 5. Building the polars frame

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;
use std::sync::Arc;

use vnprice_core::analytics::{compute_returns, macd, rolling_volatility, rsi, Macd};
use vnprice_core::data::{synthetic_bars, ProviderSet, ScriptedProvider, Universe};
use vnprice_core::domain::{DateRange, SeriesResult, TickerSymbol};
use vnprice_core::fetch::{merge, plan, FetchMode, ModeFlag, Orchestrator, RetryPolicy};
use vnprice_core::frame::to_frame;

// ── Helpers ──────────────────────────────────────────────────────────

fn universe_tickers() -> Vec<TickerSymbol> {
    Universe::default_vn().tickers().unwrap()
}

fn five_years() -> DateRange {
    DateRange::parse("2020-01-01", "2024-12-31").unwrap()
}

fn series_for(tickers: &[TickerSymbol], range: &DateRange) -> BTreeMap<TickerSymbol, SeriesResult> {
    tickers
        .iter()
        .map(|t| (t.clone(), SeriesResult::from_bars(t.clone(), synthetic_bars(t, range))))
        .collect()
}

// ── 1. Planning ──────────────────────────────────────────────────────

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let tickers = universe_tickers();
    let range = five_years();

    for mode in [FetchMode::Normal, FetchMode::DegradedSecondaryOnly] {
        group.bench_with_input(BenchmarkId::new("universe_5y", mode), &mode, |b, &mode| {
            b.iter(|| plan(black_box(&tickers), black_box(range), mode));
        });
    }

    group.finish();
}

// ── 2. Merge ─────────────────────────────────────────────────────────

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    let tickers = universe_tickers();
    let range = five_years();
    let units = plan(&tickers, range, FetchMode::DegradedSecondaryOnly);
    let fragments: Vec<_> = units
        .iter()
        .map(|u| (u.ticker.clone(), synthetic_bars(&u.ticker, &u.range)))
        .collect();

    group.bench_function("universe_5y_half_years", |b| {
        b.iter(|| merge(black_box(fragments.clone())));
    });

    group.finish();
}

// ── 3. Orchestrated fetch ────────────────────────────────────────────

fn bench_fetch_ticker(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_ticker");
    let orch = Orchestrator::new(
        ProviderSet::new(
            Arc::new(ScriptedProvider::synthetic("primary")),
            Arc::new(ScriptedProvider::synthetic("secondary")),
        ),
        Arc::new(ModeFlag::new()),
    )
    .with_policy(RetryPolicy::immediate(3));
    let ticker = TickerSymbol::new("VCB").unwrap();

    group.bench_function("5y_normal", |b| {
        b.iter(|| orch.fetch_ticker(black_box(&ticker), five_years()));
    });

    group.finish();
}

// ── 4. Analytics ─────────────────────────────────────────────────────

fn bench_analytics(c: &mut Criterion) {
    let mut group = c.benchmark_group("analytics");
    let ticker = TickerSymbol::new("FPT").unwrap();
    let series = SeriesResult::from_bars(ticker.clone(), synthetic_bars(&ticker, &five_years()));
    let closes = series.adj_closes();

    group.bench_function("returns_5y", |b| {
        b.iter(|| compute_returns(black_box(&series)));
    });
    group.bench_function("volatility_20", |b| {
        b.iter(|| rolling_volatility(black_box(&closes), 20));
    });
    group.bench_function("rsi_14", |b| {
        b.iter(|| rsi(black_box(&closes), 14));
    });
    group.bench_function("macd_12_26_9", |b| {
        b.iter(|| macd(black_box(&closes), Macd::default()));
    });

    group.finish();
}

// ── 5. Frame ─────────────────────────────────────────────────────────

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    let data = series_for(&universe_tickers(), &five_years());

    group.bench_function("universe_5y", |b| {
        b.iter(|| to_frame(black_box(&data)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_plan,
    bench_merge,
    bench_fetch_ticker,
    bench_analytics,
    bench_frame,
);
criterion_main!(benches);
