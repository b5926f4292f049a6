//! Cache loading and snapshot swapping under concurrent queries.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use yapm::prelude::*;

fn write_csv(dir: &Path, ticker: &str, closes: impl IntoIterator<Item = f64>) {
    let mut body = String::from("Date,Open,High,Low,Close,Volume\n");
    let start = chrono::NaiveDate::from_ymd_opt(2021, 2, 1).unwrap();
    for (date, close) in start.iter_days().zip(closes) {
        body.push_str(&format!("{date},0,0,0,{close},100\n"));
    }
    std::fs::write(dir.join(format!("{ticker}.csv")), body).unwrap();
}

fn seed(dir: &Path) {
    write_csv(dir, "AAA", (0..60).map(|i| 10.0 + (i as f64 / 3.0).sin()));
    write_csv(dir, "BBB", (0..60).map(|i| 20.0 + (i as f64 / 5.0).cos()));
}

#[test]
fn test_runner_over_loaded_directory() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let cache = SeriesCache::load(&CacheSource::new(dir.path())).unwrap();
    assert_eq!(cache.tickers().collect::<Vec<_>>(), vec!["AAA", "BBB"]);

    let runner = RunnerBuilder::new()
        .concurrency(2)
        .build(CacheHandle::new(cache))
        .unwrap();
    let response = runner.run("bbb", 10, 5, 2).unwrap();
    assert_eq!(response.origin.ticker, "BBB");
    assert_eq!(response.matches.len(), 2);
}

#[test]
fn test_malformed_file_aborts_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    std::fs::write(dir.path().join("CCC.csv"), "Date,Close\n2021-01-01,abc\n").unwrap();

    let err = SeriesCache::load(&CacheSource::new(dir.path())).unwrap_err();
    assert!(matches!(err, MatchError::Io { ref ticker, .. } if ticker == "CCC"));
    assert!(!err.is_client_error());
}

#[test]
fn test_missing_directory_is_config_error() {
    let err = SeriesCache::load(&CacheSource::new("/no/such/dir/for/yapm")).unwrap_err();
    assert!(matches!(err, MatchError::Config(_)));
}

#[test]
fn test_query_keeps_snapshot_across_reload() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let source = CacheSource::new(dir.path());

    let runner = RunnerBuilder::new()
        .concurrency(2)
        .build(CacheHandle::new(SeriesCache::load(&source).unwrap()))
        .unwrap();

    let before = runner.snapshot();
    let first = runner.run("AAA", 8, 4, 5).unwrap();
    assert_eq!(first.matches.len(), 2);

    write_csv(dir.path(), "CCC", (0..60).map(|i| 5.0 + (i as f64 / 3.0).sin()));
    runner.cache().reload(&source).unwrap();

    assert_eq!(before.len(), 2);
    assert_eq!(runner.snapshot().len(), 3);
    assert_eq!(runner.run("AAA", 8, 4, 5).unwrap().matches.len(), 3);
}

#[test]
fn test_concurrent_queries_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let source = CacheSource::new(dir.path());

    let runner = Arc::new(
        RunnerBuilder::new()
            .pool(PoolKind::Workers)
            .concurrency(2)
            .build(CacheHandle::new(SeriesCache::load(&source).unwrap()))
            .unwrap(),
    );

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let runner = runner.clone();
            scope.spawn(move || {
                for _ in 0..20 {
                    let response = runner.run("AAA", 6, 3, 10).unwrap();
                    // either the old (2) or the new (3) universe, never a mix
                    let n = response.matches.len();
                    assert!(n == 2 || n == 3, "saw {n} matches");
                    for dates in response.history_time_set.values() {
                        assert_eq!(dates.len(), n);
                    }
                }
            });
        }

        scope.spawn(|| {
            write_csv(dir.path(), "CCC", (0..60).map(|i| 30.0 + (i as f64 / 7.0).sin()));
            for _ in 0..5 {
                runner.cache().reload(&source).unwrap();
            }
        });
    });

    assert_eq!(runner.snapshot().len(), 3);
}

#[test]
fn test_background_reloader() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let source = CacheSource::new(dir.path());

    let handle = Arc::new(CacheHandle::new(SeriesCache::load(&source).unwrap()));
    let reloader = Reloader::spawn(handle.clone(), source, Duration::from_millis(20)).unwrap();

    write_csv(dir.path(), "DDD", (0..30).map(f64::from));
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !handle.snapshot().contains("DDD") && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    reloader.stop();

    assert!(handle.snapshot().contains("DDD"));
}
