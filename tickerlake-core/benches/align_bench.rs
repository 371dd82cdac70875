//! Criterion benchmarks for the processing hot path.
//!
//! 1. Adjustment of a long raw history
//! 2. Calendar alignment with forward-fill across many tickers
//! 3. Long and wide projection of an aligned panel

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tickerlake_core::data::synthetic::generate_bars;
use tickerlake_core::panel::{Field, PanelRow};
use tickerlake_core::transform::{add_returns, adjust, align, BadFactorPolicy, CalendarPolicy};

fn adjusted_series(tickers: usize) -> BTreeMap<String, Vec<PanelRow>> {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    (0..tickers)
        .map(|i| {
            let ticker = format!("T{i:03}");
            let bars = generate_bars(&ticker, start, end);
            let rows = adjust(&ticker, &bars, BadFactorPolicy::Null).rows;
            (ticker, rows)
        })
        .collect()
}

fn bench_adjust(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let bars = generate_bars("SPY", start, end);
    c.bench_function("adjust_25y", |b| {
        b.iter(|| adjust("SPY", black_box(&bars), BadFactorPolicy::Null))
    });
}

fn bench_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("align_10y");
    for tickers in [1usize, 10, 50] {
        let series = adjusted_series(tickers);
        for (name, policy) in [
            ("business", CalendarPolicy::BusinessDay),
            ("xnys", CalendarPolicy::Exchange("XNYS".into())),
        ] {
            group.bench_with_input(BenchmarkId::new(name, tickers), &series, |b, s| {
                b.iter(|| align(black_box(s.clone()), &policy, 5).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_projections(c: &mut Criterion) {
    let mut panel = align(adjusted_series(20), &CalendarPolicy::BusinessDay, 5).unwrap();
    for rows in panel.series.values_mut() {
        add_returns(rows);
    }
    c.bench_function("to_long_20x10y", |b| b.iter(|| panel.to_long(black_box(&Field::ALL))));
    c.bench_function("to_wide_20x10y", |b| b.iter(|| panel.to_wide(black_box(&Field::ALL))));
}

criterion_group!(benches, bench_adjust, bench_align, bench_projections);
criterion_main!(benches);
