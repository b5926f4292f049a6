//! Pearson product-moment correlation

use super::helpers::{check_inputs, is_constant, mean};
use super::Measure;

/// Linear correlation coefficient in `[-1, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pearson;

impl Measure for Pearson {
    fn name(&self) -> &'static str {
        "pearson"
    }

    fn measure(&self, a: &[f64], b: &[f64]) -> f64 {
        if !check_inputs(self.name(), a, b) {
            return f64::NAN;
        }
        correlation(a, b)
    }
}

/// Pearson correlation of two equal-length slices.
///
/// `NaN` when either side has zero variance.
pub(crate) fn correlation(a: &[f64], b: &[f64]) -> f64 {
    if is_constant(a) || is_constant(b) {
        return f64::NAN;
    }

    let mean_a = mean(a);
    let mean_b = mean(b);

    let (cov, var_a, var_b) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(cov, va, vb), (&x, &y)| {
            let dx = x - mean_a;
            let dy = y - mean_b;
            (cov + dx * dy, va + dx * dx, vb + dy * dy)
        });

    let denom = (var_a * var_b).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return f64::NAN;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_positive() {
        let r = Pearson.measure(&[1.0, 2.0, 3.0], &[8.0, 9.0, 10.0]);
        assert_eq!(r, 1.0);
    }

    #[test]
    fn test_perfect_negative() {
        let r = Pearson.measure(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]);
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_value() {
        // x = 1.1 1.7 2.1 1.4 0.2, y = 3.0 4.2 4.9 4.1 2.5
        let x = [1.1, 1.7, 2.1, 1.4, 0.2];
        let y = [3.0, 4.2, 4.9, 4.1, 2.5];
        let r = Pearson.measure(&x, &y);
        assert!((r - 0.954_25).abs() < 1e-4, "r = {r}");
    }

    #[test]
    fn test_zero_variance_is_nan() {
        assert!(Pearson.measure(&[2.0, 2.0, 2.0], &[2.0, 2.0, 2.0]).is_nan());
        assert!(Pearson.measure(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).is_nan());
    }

    #[test]
    fn test_length_mismatch_is_nan() {
        assert!(Pearson.measure(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_nan());
    }

    #[test]
    fn test_scale_invariant() {
        let a = [1.0, 3.0, 2.0, 5.0];
        let b = [10.0, 30.0, 20.0, 50.0];
        assert!((Pearson.measure(&a, &b) - 1.0).abs() < 1e-12);
    }
}
