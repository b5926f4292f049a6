//! # YAPM - Yet Another Pattern Matcher
//!
//! Finds, for a ticker and its most recent window of closing prices, the most
//! similar historical window in every cached series, and uses the days that
//! followed each match as a projected trajectory.
//!
//! ## Quick Start
//!
//! ```rust
//! use yapm::prelude::*;
//!
//! // Build a cache snapshot (normally loaded from a directory of CSV files)
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let series = TimeSeries::from_closes("aaa", start, (1..=10).map(f64::from)).unwrap();
//! let cache = SeriesCache::from_series([series]);
//!
//! let runner = RunnerBuilder::new()
//!     .measurement(Measurement::pearson())
//!     .concurrency(2)
//!     .build(CacheHandle::new(cache))
//!     .unwrap();
//!
//! let response = runner.run("AAA", 3, 2, 1).unwrap();
//! assert_eq!(response.matches.len(), 1);
//! ```

pub mod cache;
pub mod matcher;
pub mod measures;
pub mod processor;
pub mod runner;
pub mod series;

pub mod prelude {
    pub use crate::{
        // Cache
        cache::{CacheHandle, CacheSource, Reloader, SeriesCache},
        // Matching
        matcher::{MatchResult, Matcher, Timing, WindowSlice},
        // Measurements
        measures::{Dtw, Measure, Measurement, Pearson, Spearman},
        // Processing
        processor::{Batch, Job, MatchFailure, PoolKind, Processor},
        // Orchestration
        runner::{
            MatchQuery, Origin, RankedMatch, RankedResponse, Runner, RunnerBuilder, RunnerConfig,
            SelfMatch,
        },
        // Types
        series::{normalize_ticker, Observation, TimeSeries},
        Days,
        // Errors
        MatchError,
        Result,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors raised while loading, matching or ranking
#[derive(Debug, Clone, thiserror::Error)]
pub enum MatchError {
    /// Cache source misconfigured. Fatal at startup.
    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Ticker not found: {ticker}")]
    NotFound { ticker: String },

    /// One ticker's scoring failed. Isolated to that ticker.
    #[error("Failed to match {ticker}: {reason}")]
    Compute { ticker: String, reason: String },

    /// A record source could not be read. Fatal for the whole load.
    #[error("Failed to load {ticker}: {reason}")]
    Io { ticker: String, reason: String },

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Insufficient data: need {need} days, got {got}")]
    InsufficientData { need: usize, got: usize },
}

impl MatchError {
    /// True for errors caused by the caller's query rather than the service.
    ///
    /// An HTTP front-end maps these to a 4xx response.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MatchError::NotFound { .. }
                | MatchError::InvalidValue(_)
                | MatchError::InsufficientData { .. }
        )
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Number of trading days (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Days(usize);

impl Days {
    /// Create a new Days, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(MatchError::InvalidValue("Days must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Days {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Days {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Days::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_validation() {
        assert!(Days::new(1).is_ok());
        assert!(Days::new(250).is_ok());
        assert!(Days::new(0).is_err());
        assert_eq!(Days::new(30).unwrap().get(), 30);
    }

    #[test]
    fn test_days_deserialize_rejects_zero() {
        let ok: Days = serde_json::from_str("5").unwrap();
        assert_eq!(ok.get(), 5);
        assert!(serde_json::from_str::<Days>("0").is_err());
    }

    #[test]
    fn test_client_errors() {
        assert!(MatchError::NotFound {
            ticker: "ZZZ".into()
        }
        .is_client_error());
        assert!(MatchError::InvalidValue("top must be > 0").is_client_error());
        assert!(MatchError::InsufficientData { need: 5, got: 2 }.is_client_error());
        assert!(!MatchError::Config("missing dir".into()).is_client_error());
        assert!(!MatchError::Io {
            ticker: "AAA".into(),
            reason: "bad row".into()
        }
        .is_client_error());
    }

    #[test]
    fn test_error_messages() {
        let err = MatchError::NotFound {
            ticker: "MSFT".into(),
        };
        assert_eq!(err.to_string(), "Ticker not found: MSFT");

        let err = MatchError::InsufficientData { need: 30, got: 12 };
        assert_eq!(err.to_string(), "Insufficient data: need 30 days, got 12");
    }
}
