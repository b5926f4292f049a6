//! Numeric helpers shared by the measurement strategies

/// Arithmetic mean. `NaN` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// True when every value equals the first one (or the slice is empty).
#[inline]
pub fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Check two inputs are comparable, logging why when they are not.
pub fn check_inputs(measure: &str, a: &[f64], b: &[f64]) -> bool {
    if a.len() != b.len() {
        tracing::warn!(
            "{measure}: invalid input, lengths differ ({} vs {})",
            a.len(),
            b.len()
        );
        return false;
    }
    if a.len() < 2 {
        tracing::warn!("{measure}: invalid input, need at least 2 values, got {}", a.len());
        return false;
    }
    true
}

/// 1-based ranks with ties sharing the average of their positions.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end (0-based) share rank mean(start+1 ..= end)
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Z-score normalization. `None` when the input has no spread.
pub fn z_normalize(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() || is_constant(values) {
        return None;
    }
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    let sd = var.sqrt();
    if sd <= f64::EPSILON {
        return None;
    }
    Some(values.iter().map(|v| (v - mu) / sd).collect())
}
