//! Dynamic time warping
//!
//! DTW is a distance, not a correlation, and it is not scale invariant. Both
//! inputs are z-normalized first so that a window trading at 20 can still
//! match a pattern trading at 200, and the distance is negated so that a
//! higher score still means a closer match.

use super::helpers::{check_inputs, z_normalize};
use super::Measure;

/// Negated DTW distance between z-normalized inputs (`<= 0`, `0` is identical)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dtw {
    /// Sakoe-Chiba band half-width. `None` searches the full cost matrix.
    pub band: Option<usize>,
}

impl Dtw {
    pub fn with_band(band: usize) -> Self {
        Self { band: Some(band) }
    }

    /// Raw DTW distance with absolute-difference cost.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let (n, m) = (a.len(), b.len());
        if n == 0 || m == 0 {
            return f64::NAN;
        }
        // the band must at least cover the diagonal offset
        let band = self.band.map(|w| w.max(n.abs_diff(m)));

        let mut prev = vec![f64::INFINITY; m + 1];
        let mut curr = vec![f64::INFINITY; m + 1];
        prev[0] = 0.0;

        for i in 1..=n {
            curr.fill(f64::INFINITY);
            let (lo, hi) = match band {
                Some(w) => (i.saturating_sub(w).max(1), (i + w).min(m)),
                None => (1, m),
            };
            for j in lo..=hi {
                let cost = (a[i - 1] - b[j - 1]).abs();
                curr[j] = cost + prev[j].min(curr[j - 1]).min(prev[j - 1]);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        prev[m]
    }
}

impl Measure for Dtw {
    fn name(&self) -> &'static str {
        "dtw"
    }

    fn measure(&self, a: &[f64], b: &[f64]) -> f64 {
        if !check_inputs(self.name(), a, b) {
            return f64::NAN;
        }
        match (z_normalize(a), z_normalize(b)) {
            (Some(za), Some(zb)) => -self.distance(&za, &zb),
            _ => f64::NAN,
        }
    }
}
