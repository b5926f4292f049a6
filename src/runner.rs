//! Query orchestration: validate, extract, dispatch, rank, format
//!
//! # Example
//!
//! ```rust
//! use yapm::prelude::*;
//!
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let cache = SeriesCache::from_series([
//!     TimeSeries::from_closes("AAA", start, (1..=30).map(f64::from)).unwrap(),
//!     TimeSeries::from_closes("BBB", start, (1..=30).map(|i| f64::from(i % 7))).unwrap(),
//! ]);
//!
//! let runner = RunnerBuilder::new()
//!     .measurement(Measurement::spearman())
//!     .pool(PoolKind::Workers)
//!     .concurrency(2)
//!     .build(CacheHandle::new(cache))
//!     .unwrap();
//!
//! let response = runner.run("aaa", 5, 3, 2).unwrap();
//! assert_eq!(response.origin.ticker, "AAA");
//! assert_eq!(response.matches[&1].ticker, "AAA");
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::cache::{CacheHandle, SeriesCache};
use crate::matcher::{MatchResult, Matcher, WindowSlice};
use crate::measures::{Measure, Measurement};
use crate::processor::{default_concurrency, Job, PoolKind, Processor};
use crate::series::normalize_ticker;
use crate::{Days, MatchError, Result};

// ============================================================
// CONFIG
// ============================================================

/// Whether the origin ticker competes against its own history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfMatch {
    #[default]
    Include,
    Exclude,
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub measurement: Measurement,
    pub pool: PoolKind,
    /// Worker count; defaults to the number of available cores
    pub concurrency: usize,
    /// Sliding-window stride
    pub step: usize,
    pub self_match: SelfMatch,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            measurement: Measurement::default(),
            pool: PoolKind::default(),
            concurrency: default_concurrency(),
            step: 1,
            self_match: SelfMatch::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(MatchError::Config("concurrency must be > 0".into()));
        }
        if self.step == 0 {
            return Err(MatchError::Config("step must be > 0".into()));
        }
        Ok(())
    }
}

// ============================================================
// QUERY / RESPONSE
// ============================================================

/// Query parameters as received from an HTTP front-end
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchQuery {
    pub ticker: String,
    pub days_back: Days,
    pub days_forward: Days,
    pub top: Days,
}

/// The query pattern
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Origin {
    pub ticker: String,
    pub values: Vec<f64>,
    /// First and last date of the pattern
    pub dates: [NaiveDate; 2],
}

/// One ranked match as returned to the caller
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMatch {
    pub ticker: String,
    pub similarity: f64,
    pub matched: WindowSlice,
    pub projected: WindowSlice,
    /// Length of the candidate series
    pub series_len: usize,
}

impl From<MatchResult> for RankedMatch {
    fn from(m: MatchResult) -> Self {
        Self {
            ticker: m.ticker,
            similarity: m.similarity,
            matched: m.matched,
            projected: m.projected,
            series_len: m.series_len,
        }
    }
}

/// Ranked, formatted answer to one query
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResponse {
    pub origin: Origin,
    /// Day index (1-based) -> date of that day in every match's matched window
    pub history_time_set: BTreeMap<usize, Vec<NaiveDate>>,
    /// Day index (1-based) -> date of that day in every match's projection
    pub future_time_set: BTreeMap<usize, Vec<NaiveDate>>,
    /// Rank (1-based) -> match
    pub matches: BTreeMap<usize, RankedMatch>,
}

impl RankedResponse {
    fn format(origin: Origin, ranked: Vec<MatchResult>, days_back: usize, days_forward: usize) -> Self {
        let history_time_set = time_set(&ranked, days_back, |m| &m.matched);
        let future_time_set = time_set(&ranked, days_forward, |m| &m.projected);

        let matches = ranked
            .into_iter()
            .enumerate()
            .map(|(i, m)| (i + 1, RankedMatch::from(m)))
            .collect();

        Self {
            origin,
            history_time_set,
            future_time_set,
            matches,
        }
    }
}

/// Day index (1-based) -> that day's date in each ranked window, in rank order.
///
/// Only days present in at least one window get a key, so an empty ranking
/// yields an empty map whatever `days` is.
fn time_set(
    ranked: &[MatchResult],
    days: usize,
    pick: fn(&MatchResult) -> &WindowSlice,
) -> BTreeMap<usize, Vec<NaiveDate>> {
    let span = ranked
        .iter()
        .map(|m| pick(m).len())
        .max()
        .unwrap_or(0)
        .min(days);
    (1..=span)
        .map(|day| {
            let dates = ranked
                .iter()
                .filter_map(|m| pick(m).dates.get(day - 1).copied())
                .collect();
            (day, dates)
        })
        .collect()
}

// ============================================================
// RUNNER
// ============================================================

/// Answers pattern-matching queries against the current cache snapshot
#[derive(Debug)]
pub struct Runner {
    cache: Arc<CacheHandle>,
    processor: Processor,
    matcher: Matcher<Measurement>,
    config: RunnerConfig,
}

impl Runner {
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Shared handle, e.g. for a [`crate::cache::Reloader`]
    pub fn cache(&self) -> &Arc<CacheHandle> {
        &self.cache
    }

    pub fn snapshot(&self) -> Arc<SeriesCache> {
        self.cache.snapshot()
    }

    /// Forward a parsed query to [`Runner::run`].
    pub fn run_query(&self, query: &MatchQuery) -> Result<RankedResponse> {
        self.run(
            &query.ticker,
            query.days_back.get(),
            query.days_forward.get(),
            query.top.get(),
        )
    }

    /// Find the `top` most similar historical windows to the last `days_back`
    /// closes of `ticker`, each with its following `days_forward` days.
    pub fn run(
        &self,
        ticker: &str,
        days_back: usize,
        days_forward: usize,
        top: usize,
    ) -> Result<RankedResponse> {
        // correlation over a single point is undefined
        if days_back < 2 {
            return Err(MatchError::InvalidValue("days_back must be >= 2"));
        }
        if days_forward == 0 {
            return Err(MatchError::InvalidValue("days_forward must be > 0"));
        }
        if top == 0 {
            return Err(MatchError::InvalidValue("top must be > 0"));
        }

        let ticker = normalize_ticker(ticker);
        tracing::info!(
            "Run pattern matching with ticker: {ticker} - measurement: {}",
            self.matcher.measure().name()
        );

        // held for the whole query; reloads publish next to it
        let snapshot = self.cache.snapshot();

        let Some(series) = snapshot.get(&ticker) else {
            tracing::info!("Unsupported ticker: {ticker}");
            return Err(MatchError::NotFound { ticker });
        };

        let (values, dates) = series.tail(days_back)?;
        let origin = Origin {
            ticker: ticker.clone(),
            values: values.to_vec(),
            dates: [dates[0], dates[dates.len() - 1]],
        };

        let mut job = Job::new(
            format!("{}-{}-{}", self.matcher.measure().name(), ticker, days_back),
            self.matcher.clone(),
            values,
            days_forward,
            self.config.step,
        );
        if self.config.self_match == SelfMatch::Exclude {
            job = job.excluding(ticker.clone());
        }

        let batch = self.processor.process(&snapshot, &job);
        if !batch.failures.is_empty() {
            tracing::warn!(
                "{} of {} tickers failed for {ticker}",
                batch.failures.len(),
                snapshot.len()
            );
        }

        let ranked = rank(batch.results, top);
        Ok(RankedResponse::format(origin, ranked, days_back, days_forward))
    }
}

/// Stable sort by similarity (descending), keeping the first `top`.
pub fn rank(mut results: Vec<MatchResult>, top: usize) -> Vec<MatchResult> {
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(top);
    results
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Runner instances
#[derive(Debug, Clone, Default)]
pub struct RunnerBuilder {
    config: RunnerConfig,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a deserialized configuration
    pub fn from_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn measurement(mut self, measurement: Measurement) -> Self {
        self.config.measurement = measurement;
        self
    }

    pub fn pool(mut self, pool: PoolKind) -> Self {
        self.config.pool = pool;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn step(mut self, step: usize) -> Self {
        self.config.step = step;
        self
    }

    pub fn self_match(mut self, policy: SelfMatch) -> Self {
        self.config.self_match = policy;
        self
    }

    /// Build the runner
    pub fn build(self, cache: impl Into<Arc<CacheHandle>>) -> Result<Runner> {
        self.config.validate()?;
        let processor = Processor::new(self.config.pool, self.config.concurrency)?;
        tracing::info!(
            "Runner ready: measurement={} pool={:?} concurrency={} step={} self_match={:?}",
            self.config.measurement,
            self.config.pool,
            self.config.concurrency,
            self.config.step,
            self.config.self_match
        );
        Ok(Runner {
            cache: cache.into(),
            processor,
            matcher: Matcher::new(self.config.measurement),
            config: self.config,
        })
    }
}

// ============================================================
// TESTS
// ============================================================
