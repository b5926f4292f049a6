//! Sliding-window search over one candidate series
//!
//! For a pattern of length `W`, every window `close[offset .. offset + W]` with
//! `offset + W < len - days_forward` is scored against the pattern, advancing
//! `offset` by `step`. The best window is kept with a strict `>` comparison, so
//! on equal scores the earliest offset wins. Scores are taken on raw closes;
//! no normalization happens here.

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::measures::{Measure, Measurement};
use crate::series::TimeSeries;
use crate::{MatchError, Result};

/// Values and dates of one contiguous window
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WindowSlice {
    pub values: Vec<f64>,
    pub dates: Vec<NaiveDate>,
}

impl WindowSlice {
    fn from_series(series: &TimeSeries, range: std::ops::Range<usize>) -> Self {
        let (values, dates) = series.window(range);
        Self {
            values: values.to_vec(),
            dates: dates.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// When a match call ran, relative to its batch start
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Timing {
    pub start: Duration,
    pub end: Duration,
}

/// Best window found in one candidate series
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MatchResult {
    pub ticker: String,
    pub similarity: f64,
    /// Offset of the matched window in the candidate series
    pub offset: usize,
    pub matched: WindowSlice,
    /// The `days_forward` observations right after the matched window
    pub projected: WindowSlice,
    pub timing: Timing,
    pub series_len: usize,
}

/// Sliding-window matcher bound to one measurement
#[derive(Debug, Clone, Default)]
pub struct Matcher<M: Measure = Measurement> {
    measure: M,
}

impl<M: Measure> Matcher<M> {
    pub fn new(measure: M) -> Self {
        Self { measure }
    }

    #[inline]
    pub fn measure(&self) -> &M {
        &self.measure
    }

    /// Scan `closes` and return `(offset, score)` of the best window.
    ///
    /// `None` when no window is eligible or none produced a finite score.
    pub fn best_window(
        &self,
        closes: &[f64],
        pattern: &[f64],
        days_forward: usize,
        step: usize,
    ) -> Option<(usize, f64)> {
        let window = pattern.len();
        if window == 0 || step == 0 {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        let mut offset: usize = 0;
        let limit = closes.len().saturating_sub(days_forward);
        while offset.saturating_add(window) < limit {
            let score = self
                .measure
                .measure(pattern, &closes[offset..offset + window]);
            // NaN fails both checks
            if score.is_finite() && best.map_or(true, |(_, b)| score > b) {
                best = Some((offset, score));
            }
            offset = offset.saturating_add(step);
        }
        best
    }

    /// Find the best window of `series` and cut out its projection.
    ///
    /// `Ok(None)` means the ticker has no eligible window and is simply left
    /// out of the results.
    pub fn match_series(
        &self,
        series: &TimeSeries,
        pattern: &[f64],
        days_forward: usize,
        step: usize,
        batch_start: Instant,
    ) -> Result<Option<MatchResult>> {
        let start = batch_start.elapsed();

        if pattern.is_empty() {
            return Err(MatchError::Compute {
                ticker: series.ticker().to_string(),
                reason: "empty pattern".into(),
            });
        }
        if step == 0 {
            return Err(MatchError::Compute {
                ticker: series.ticker().to_string(),
                reason: "step must be > 0".into(),
            });
        }

        let Some((offset, similarity)) =
            self.best_window(series.closes(), pattern, days_forward, step)
        else {
            tracing::trace!("{}: no eligible window", series.ticker());
            return Ok(None);
        };

        let to = offset + pattern.len();
        Ok(Some(MatchResult {
            ticker: series.ticker().to_string(),
            similarity,
            offset,
            matched: WindowSlice::from_series(series, offset..to),
            projected: WindowSlice::from_series(series, to..to.saturating_add(days_forward)),
            timing: Timing {
                start,
                end: batch_start.elapsed(),
            },
            series_len: series.len(),
        }))
    }
}
