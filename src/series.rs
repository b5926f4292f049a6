//! Per-ticker closing-price series
//!
//! A [`TimeSeries`] is immutable once built: observations are stored in the
//! order the ingestion side wrote them (ascending by date) and are never
//! re-sorted here.

use std::ops::Range;

use chrono::NaiveDate;

use crate::{MatchError, Result};

/// Upper-case and trim a ticker symbol
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// One trading day
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub close: f64,
}

/// Ordered (date, close) pairs for one ticker
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    ticker: String,
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from observations, rejecting non-finite closes.
    pub fn new(ticker: &str, observations: impl IntoIterator<Item = Observation>) -> Result<Self> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(MatchError::InvalidValue("Ticker cannot be empty"));
        }

        let (dates, closes): (Vec<_>, Vec<_>) = observations
            .into_iter()
            .map(|o| (o.date, o.close))
            .unzip();

        if let Some(index) = closes.iter().position(|c| !c.is_finite()) {
            return Err(MatchError::Io {
                ticker,
                reason: format!("non-finite close at row {index}"),
            });
        }

        Ok(Self {
            ticker,
            dates,
            closes,
        })
    }

    /// Build a series of consecutive calendar days starting at `start`.
    pub fn from_closes(
        ticker: &str,
        start: NaiveDate,
        closes: impl IntoIterator<Item = f64>,
    ) -> Result<Self> {
        let observations = closes
            .into_iter()
            .zip(start.iter_days())
            .map(|(close, date)| Observation { date, close });
        Self::new(ticker, observations)
    }

    #[inline]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    #[inline]
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    #[inline]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Closes and dates for `range`, clamped to the series bounds.
    pub fn window(&self, range: Range<usize>) -> (&[f64], &[NaiveDate]) {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        (&self.closes[start..end], &self.dates[start..end])
    }

    /// The most recent `days` observations.
    pub fn tail(&self, days: usize) -> Result<(&[f64], &[NaiveDate])> {
        if days > self.len() {
            return Err(MatchError::InsufficientData {
                need: days,
                got: self.len(),
            });
        }
        Ok(self.window(self.len() - days..self.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_ticker_normalized() {
        assert_eq!(normalize_ticker(" aapl "), "AAPL");
        let s = TimeSeries::from_closes("msft", day(1), [1.0, 2.0]).unwrap();
        assert_eq!(s.ticker(), "MSFT");
    }

    #[test]
    fn test_empty_ticker_rejected() {
        assert!(TimeSeries::from_closes("  ", day(1), [1.0]).is_err());
    }

    #[test]
    fn test_non_finite_close_rejected() {
        let err = TimeSeries::from_closes("AAA", day(1), [1.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, MatchError::Io { .. }));
    }

    #[test]
    fn test_from_closes_consecutive_dates() {
        let s = TimeSeries::from_closes("AAA", day(1), [1.0, 2.0, 3.0]).unwrap();
        assert_eq!(s.dates(), &[day(1), day(2), day(3)]);
        assert_eq!(s.first_date(), Some(day(1)));
        assert_eq!(s.last_date(), Some(day(3)));
    }

    #[test]
    fn test_window_clamped() {
        let s = TimeSeries::from_closes("AAA", day(1), [1.0, 2.0, 3.0, 4.0]).unwrap();
        let (closes, dates) = s.window(2..10);
        assert_eq!(closes, &[3.0, 4.0]);
        assert_eq!(dates.len(), 2);

        let (closes, _) = s.window(7..9);
        assert!(closes.is_empty());
    }

    #[test]
    fn test_tail() {
        let s = TimeSeries::from_closes("AAA", day(1), [1.0, 2.0, 3.0, 4.0]).unwrap();
        let (closes, dates) = s.tail(2).unwrap();
        assert_eq!(closes, &[3.0, 4.0]);
        assert_eq!(dates, &[day(3), day(4)]);

        let err = s.tail(5).unwrap_err();
        assert!(matches!(err, MatchError::InsufficientData { need: 5, got: 4 }));
    }
}
