//! Spearman rank correlation

use super::helpers::{check_inputs, ranks};
use super::pearson::correlation;
use super::Measure;

/// Rank correlation coefficient in `[-1, 1]`.
///
/// Ties receive the average of the ranks they span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spearman;

impl Measure for Spearman {
    fn name(&self) -> &'static str {
        "spearman"
    }

    fn measure(&self, a: &[f64], b: &[f64]) -> f64 {
        if !check_inputs(self.name(), a, b) {
            return f64::NAN;
        }
        correlation(&ranks(a), &ranks(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_is_one() {
        // non-linear but monotonic
        let r = Spearman.measure(&[1.0, 2.0, 3.0, 4.0], &[1.0, 4.0, 9.0, 16.0]);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reversed_is_minus_one() {
        let r = Spearman.measure(&[1.0, 2.0, 3.0, 4.0], &[9.0, 7.0, 3.0, 1.0]);
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_with_ties() {
        let r = Spearman.measure(&[1.0, 2.0, 3.0, 4.0, 5.0], &[5.0, 6.0, 7.0, 8.0, 7.0]);
        assert!((r - 0.820_782_7).abs() < 1e-6, "r = {r}");
    }

    #[test]
    fn test_constant_is_nan() {
        assert!(Spearman.measure(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_length_mismatch_is_nan() {
        assert!(Spearman.measure(&[1.0, 2.0], &[1.0, 2.0, 3.0]).is_nan());
    }
}
