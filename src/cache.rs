//! In-memory series cache
//!
//! The cache is built once from a directory holding one CSV file per ticker
//! and then only ever replaced wholesale. Readers take an `Arc` snapshot from
//! [`CacheHandle::snapshot`] and keep using it for the duration of a query,
//! while [`CacheHandle::reload`] (or a [`Reloader`] running in the background)
//! publishes a brand-new snapshot next to it.
//!
//! # Example
//!
//! ```rust,no_run
//! use yapm::cache::{CacheHandle, CacheSource, SeriesCache};
//!
//! let source = CacheSource::new("data/daily");
//! let handle = CacheHandle::new(SeriesCache::load(&source).unwrap());
//! let snapshot = handle.snapshot();
//! println!("{} tickers cached", snapshot.len());
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::NaiveDate;
use rayon::prelude::*;

use crate::series::{normalize_ticker, Observation, TimeSeries};
use crate::{MatchError, Result};

// ============================================================
// SOURCE
// ============================================================

/// Where the per-ticker record files live
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheSource {
    pub dir: PathBuf,
    /// File suffix including the dot, e.g. `.csv`
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    ".csv".to_string()
}

impl CacheSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: default_extension(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// List every ticker with a record file in the source directory.
    ///
    /// The ticker is the file name up to its first `.`, upper-cased.
    pub fn discover_tickers(&self) -> Result<Vec<String>> {
        if self.extension.is_empty() {
            return Err(MatchError::Config("file extension cannot be empty".into()));
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            MatchError::Config(format!("cannot read {}: {e}", self.dir.display()))
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                MatchError::Config(format!("cannot list {}: {e}", self.dir.display()))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(&self.extension) {
                continue;
            }
            let stem = name.split('.').next().unwrap_or_default();
            if !stem.is_empty() {
                tickers.push(normalize_ticker(stem));
            }
        }

        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }

    /// Path of the record file for `ticker`, trying the upper- then lower-case name.
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        let upper = self
            .dir
            .join(format!("{}{}", ticker.to_uppercase(), self.extension));
        if upper.exists() {
            return upper;
        }
        let lower = self
            .dir
            .join(format!("{}{}", ticker.to_lowercase(), self.extension));
        if lower.exists() {
            lower
        } else {
            upper
        }
    }
}

// ============================================================
// LOADER
// ============================================================

#[derive(Debug, serde::Deserialize)]
struct Record {
    #[serde(alias = "Date", alias = "DATE")]
    date: NaiveDate,
    #[serde(alias = "Close", alias = "CLOSE")]
    close: f64,
}

/// Parse one record source (CSV with `date` and `close` columns).
pub fn load_series<R: Read>(ticker: &str, reader: R) -> Result<TimeSeries> {
    let io_err = |reason: String| MatchError::Io {
        ticker: normalize_ticker(ticker),
        reason,
    };

    let mut rdr = csv::Reader::from_reader(reader);
    let mut observations = Vec::new();
    for (row, record) in rdr.deserialize::<Record>().enumerate() {
        let record = record.map_err(|e| io_err(format!("row {row}: {e}")))?;
        observations.push(Observation {
            date: record.date,
            close: record.close,
        });
    }

    if observations.is_empty() {
        return Err(io_err("no records".into()));
    }

    TimeSeries::new(ticker, observations)
}

/// Load one ticker's record file from disk.
pub fn load_file(ticker: &str, path: &Path) -> Result<TimeSeries> {
    let file = File::open(path).map_err(|e| MatchError::Io {
        ticker: normalize_ticker(ticker),
        reason: format!("{}: {e}", path.display()),
    })?;
    load_series(ticker, file)
}

/// Load every ticker, aborting the whole load on the first failure.
pub fn load_all(source: &CacheSource, tickers: &[String]) -> Result<SeriesCache> {
    let start = Instant::now();

    let series = tickers
        .par_iter()
        .map(|ticker| load_file(ticker, &source.path_for(ticker)))
        .collect::<Result<Vec<_>>>()
        .inspect_err(|e| tracing::error!("Aborting cache load from {}: {e}", source.dir.display()))?;

    let cache = SeriesCache::from_series(series);
    tracing::info!(
        "Loaded {} tickers from {} in {:.2?}",
        cache.len(),
        source.dir.display(),
        start.elapsed()
    );
    Ok(cache)
}

// ============================================================
// SNAPSHOT
// ============================================================

/// Immutable ticker -> series mapping
#[derive(Debug, Clone, Default)]
pub struct SeriesCache {
    series: BTreeMap<String, TimeSeries>,
}

impl SeriesCache {
    /// Build a snapshot from already-parsed series. Later duplicates win.
    pub fn from_series(series: impl IntoIterator<Item = TimeSeries>) -> Self {
        Self {
            series: series
                .into_iter()
                .map(|s| (s.ticker().to_string(), s))
                .collect(),
        }
    }

    /// Discover and load every ticker in `source`.
    pub fn load(source: &CacheSource) -> Result<Self> {
        let tickers = source.discover_tickers()?;
        tracing::info!(
            "Loading {} tickers from {}",
            tickers.len(),
            source.dir.display()
        );
        load_all(source, &tickers)
    }

    pub fn get(&self, ticker: &str) -> Option<&TimeSeries> {
        self.series.get(ticker)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.series.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Tickers in ascending order
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Series in ascending ticker order
    pub fn iter(&self) -> impl Iterator<Item = &TimeSeries> {
        self.series.values()
    }
}

// ============================================================
// HANDLE
// ============================================================

/// Publishes the current snapshot; swapped atomically on reload
#[derive(Debug)]
pub struct CacheHandle {
    current: ArcSwap<SeriesCache>,
}

impl CacheHandle {
    pub fn new(cache: SeriesCache) -> Self {
        Self {
            current: ArcSwap::from_pointee(cache),
        }
    }

    /// The snapshot in effect right now. Never changes under the caller.
    #[inline]
    pub fn snapshot(&self) -> Arc<SeriesCache> {
        self.current.load_full()
    }

    /// Publish `cache`, returning the snapshot it replaced.
    pub fn replace(&self, cache: SeriesCache) -> Arc<SeriesCache> {
        self.current.swap(Arc::new(cache))
    }

    /// Rebuild from `source` and swap it in. On failure the old snapshot stays.
    pub fn reload(&self, source: &CacheSource) -> Result<usize> {
        let cache = SeriesCache::load(source)?;
        let count = cache.len();
        let previous = self.replace(cache);
        tracing::info!("Cache reloaded: {} -> {} tickers", previous.len(), count);
        Ok(count)
    }
}

// ============================================================
// BACKGROUND RELOAD
// ============================================================

/// Periodically reloads a [`CacheHandle`] on a background thread.
///
/// Stops when [`Reloader::stop`] is called or the value is dropped.
#[derive(Debug)]
pub struct Reloader {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reloader {
    pub fn spawn(handle: Arc<CacheHandle>, source: CacheSource, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(MatchError::Config("reload period must be > 0".into()));
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("yapm-reloader".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = handle.reload(&source) {
                            tracing::error!("Cache reload failed, keeping previous snapshot: {e}");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| MatchError::Config(format!("cannot spawn reloader: {e}")))?;

        tracing::debug!("Reloader started with period {period:?}");
        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Reloader thread panicked");
            }
        }
    }
}

impl Drop for Reloader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================
// TESTS
// ============================================================
