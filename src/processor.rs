//! Batch dispatch of one matcher call per cached ticker
//!
//! A [`Job`] describes the work shared by every worker in a batch. A
//! [`Processor`] fans the job out over a bounded pool and blocks until every
//! ticker has been handled. Two pool strategies satisfy the same contract:
//!
//! - [`ThreadProcessor`]: a dedicated rayon pool reading the snapshot through
//!   shared references. Lowest overhead.
//! - [`WorkerProcessor`]: a fresh set of scoped worker threads per batch, fed
//!   through a task queue. Each task carries its own copy of the candidate
//!   series, so a worker never touches the snapshot. Results are gathered in
//!   completion order.
//!
//! A failing ticker (error or panic) is logged and reported in
//! [`Batch::failures`]; it never aborts the rest of the batch. Results come
//! back in cache order regardless of which worker finished first.

use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::cache::SeriesCache;
use crate::matcher::{MatchResult, Matcher};
use crate::measures::{Measure, Measurement};
use crate::series::TimeSeries;
use crate::{MatchError, Result};

/// Number of worker threads used when none is configured
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

// ============================================================
// JOB
// ============================================================

/// Immutable description of one matching batch
#[derive(Debug, Clone)]
pub struct Job<M: Measure = Measurement> {
    name: String,
    matcher: Matcher<M>,
    pattern: Arc<[f64]>,
    days_forward: usize,
    step: usize,
    exclude: Option<String>,
}

impl<M: Measure> Job<M> {
    pub fn new(
        name: impl Into<String>,
        matcher: Matcher<M>,
        pattern: impl Into<Arc<[f64]>>,
        days_forward: usize,
        step: usize,
    ) -> Self {
        Self {
            name: name.into(),
            matcher,
            pattern: pattern.into(),
            days_forward,
            step,
            exclude: None,
        }
    }

    /// Leave `ticker` out of the candidate pool.
    pub fn excluding(mut self, ticker: impl Into<String>) -> Self {
        self.exclude = Some(ticker.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &Matcher<M> {
        &self.matcher
    }

    pub fn pattern(&self) -> &[f64] {
        &self.pattern
    }

    pub fn days_forward(&self) -> usize {
        self.days_forward
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// One-line summary for logs
    pub fn describe(&self) -> String {
        format!(
            "Job info: [name: {}, measure: {}, pattern_len: {}, days_forward: {}, step: {}, exclude: {:?}]",
            self.name,
            self.matcher.measure().name(),
            self.pattern.len(),
            self.days_forward,
            self.step,
            self.exclude
        )
    }

    fn accepts(&self, ticker: &str) -> bool {
        self.exclude.as_deref() != Some(ticker)
    }

    /// Match one series, turning a panic into a [`MatchError::Compute`].
    fn run_isolated(&self, series: &TimeSeries, batch_start: Instant) -> Result<Option<MatchResult>> {
        catch_unwind(AssertUnwindSafe(|| {
            self.matcher
                .match_series(series, &self.pattern, self.days_forward, self.step, batch_start)
        }))
        .unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic during scoring".to_string());
            Err(MatchError::Compute {
                ticker: series.ticker().to_string(),
                reason,
            })
        })
    }
}

// ============================================================
// BATCH RESULT
// ============================================================

/// A ticker whose match call failed
#[derive(Debug, Clone)]
pub struct MatchFailure {
    pub ticker: String,
    pub error: MatchError,
}

/// Everything a batch produced
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Successful matches, in cache (ticker) order
    pub results: Vec<MatchResult>,
    pub failures: Vec<MatchFailure>,
    /// Tickers with no eligible window
    pub skipped: usize,
    pub elapsed: Duration,
}

impl Batch {
    fn collect(
        outcomes: impl IntoIterator<Item = (String, Result<Option<MatchResult>>)>,
        begin: Instant,
    ) -> Self {
        let mut batch = Batch::default();
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(Some(result)) => batch.results.push(result),
                Ok(None) => batch.skipped += 1,
                Err(error) => {
                    tracing::warn!("Failed to process {ticker}: {error}");
                    batch.failures.push(MatchFailure { ticker, error });
                }
            }
        }
        batch.elapsed = begin.elapsed();
        batch
    }
}

// ============================================================
// POOLS
// ============================================================

/// Which pool strategy a [`Processor`] uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    #[default]
    Threads,
    Workers,
}

/// Rayon-backed pool sharing the snapshot by reference
#[derive(Debug)]
pub struct ThreadProcessor {
    pool: rayon::ThreadPool,
    concurrency: usize,
}

impl ThreadProcessor {
    pub fn new(concurrency: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("yapm-match-{i}"))
            .build()
            .map_err(|e| MatchError::Config(format!("cannot build thread pool: {e}")))?;
        Ok(Self { pool, concurrency })
    }

    pub fn process<M: Measure>(&self, cache: &SeriesCache, job: &Job<M>) -> Batch {
        let begin = Instant::now();
        tracing::info!("Running job with {} threads", self.concurrency);

        let candidates: Vec<&TimeSeries> = cache.iter().filter(|s| job.accepts(s.ticker())).collect();
        let outcomes: Vec<_> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|series| (series.ticker().to_string(), job.run_isolated(series, begin)))
                .collect()
        });

        Batch::collect(outcomes, begin)
    }
}

/// Queue-fed worker threads, each task owning a copy of its series
#[derive(Debug, Clone)]
pub struct WorkerProcessor {
    concurrency: usize,
}

type Outcome = (usize, String, Result<Option<MatchResult>>);

impl WorkerProcessor {
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(MatchError::Config("concurrency must be > 0".into()));
        }
        Ok(Self { concurrency })
    }

    pub fn process<M: Measure>(&self, cache: &SeriesCache, job: &Job<M>) -> Batch {
        let begin = Instant::now();

        let tasks: Vec<(usize, TimeSeries)> = cache
            .iter()
            .filter(|s| job.accepts(s.ticker()))
            .cloned()
            .enumerate()
            .collect();
        let workers = self.concurrency.min(tasks.len()).max(1);
        tracing::info!("Running job with {workers} workers");

        let (task_tx, task_rx) = mpsc::channel::<(usize, TimeSeries)>();
        let task_rx = Mutex::new(task_rx);
        let (result_tx, result_rx) = mpsc::channel::<Outcome>();

        for task in tasks {
            // receiver is alive until the scope below ends
            let _ = task_tx.send(task);
        }
        drop(task_tx);

        let mut outcomes: Vec<Outcome> = std::thread::scope(|scope| {
            for _ in 0..workers {
                let result_tx = result_tx.clone();
                let task_rx = &task_rx;
                scope.spawn(move || loop {
                    let next = task_rx
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .recv();
                    let Ok((index, series)) = next else {
                        break;
                    };
                    let outcome = job.run_isolated(&series, begin);
                    if result_tx
                        .send((index, series.ticker().to_string(), outcome))
                        .is_err()
                    {
                        break;
                    }
                });
            }
            drop(result_tx);

            // completion order
            result_rx.iter().collect()
        });

        outcomes.sort_by_key(|(index, _, _)| *index);
        Batch::collect(
            outcomes
                .into_iter()
                .map(|(_, ticker, outcome)| (ticker, outcome)),
            begin,
        )
    }
}

// ============================================================
// PROCESSOR
// ============================================================

/// Worker pool chosen by configuration
#[derive(Debug)]
pub enum Processor {
    Threads(ThreadProcessor),
    Workers(WorkerProcessor),
}

impl Processor {
    pub fn new(kind: PoolKind, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(MatchError::Config("concurrency must be > 0".into()));
        }
        Ok(match kind {
            PoolKind::Threads => Self::Threads(ThreadProcessor::new(concurrency)?),
            PoolKind::Workers => Self::Workers(WorkerProcessor::new(concurrency)?),
        })
    }

    pub fn kind(&self) -> PoolKind {
        match self {
            Self::Threads(_) => PoolKind::Threads,
            Self::Workers(_) => PoolKind::Workers,
        }
    }

    pub fn concurrency(&self) -> usize {
        match self {
            Self::Threads(p) => p.concurrency,
            Self::Workers(p) => p.concurrency,
        }
    }

    /// Match every cached ticker against `job`; blocks until all are done.
    pub fn process<M: Measure>(&self, cache: &SeriesCache, job: &Job<M>) -> Batch {
        tracing::debug!("Processing {}", job.describe());
        let batch = match self {
            Self::Threads(p) => p.process(cache, job),
            Self::Workers(p) => p.process(cache, job),
        };
        tracing::debug!(
            "Job {} finished in {:.2?}: {} matched, {} skipped, {} failed",
            job.name(),
            batch.elapsed,
            batch.results.len(),
            batch.skipped,
            batch.failures.len()
        );
        batch
    }
}

// ============================================================
// TESTS
// ============================================================
