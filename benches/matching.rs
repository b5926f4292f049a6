//! Benchmarks for window matching and full queries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use yapm::prelude::*;

/// Deterministic "random walk" closes
fn generate_closes(n: usize, seed: usize) -> Vec<f64> {
  let mut closes = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = (((i + seed) * 7 + 13) % 100) as f64 / 50.0 - 1.0;
    price = (price + change).max(1.0);
    closes.push(price);
  }

  closes
}

fn generate_cache(tickers: usize, len: usize) -> SeriesCache {
  let start = chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
  SeriesCache::from_series((0..tickers).map(|t| {
    TimeSeries::from_closes(&format!("T{t:04}"), start, generate_closes(len, t * 31)).unwrap()
  }))
}

fn bench_measurements(c: &mut Criterion) {
  let closes = generate_closes(2500, 0);
  let pattern = generate_closes(30, 99);

  let mut group = c.benchmark_group("best_window_2500");
  for measurement in [Measurement::pearson(), Measurement::spearman(), Measurement::dtw()] {
    let matcher = Matcher::new(measurement);
    group.bench_with_input(BenchmarkId::from_parameter(measurement), &closes, |b, closes| {
      b.iter(|| black_box(matcher.best_window(black_box(closes), &pattern, 10, 1)))
    });
  }
  group.finish();
}

fn bench_pools(c: &mut Criterion) {
  let cache = generate_cache(200, 1000);

  let mut group = c.benchmark_group("run_200_tickers");
  group.sample_size(10);
  for pool in [PoolKind::Threads, PoolKind::Workers] {
    let runner = RunnerBuilder::new()
      .pool(pool)
      .build(CacheHandle::new(cache.clone()))
      .unwrap();
    group.bench_function(format!("{pool:?}"), |b| {
      b.iter(|| black_box(runner.run("T0000", 30, 10, 10).unwrap()))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_measurements, bench_pools);
criterion_main!(benches);
