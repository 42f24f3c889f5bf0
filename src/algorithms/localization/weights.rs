//! Weight bookkeeping for particle sets.

/// Normalise log-weights into probabilities with the log-sum-exp trick.
///
/// Returns `None` when no log-weight is finite.
pub fn normalize_log_weights(log_weights: &[f64]) -> Option<Vec<f64>> {
    let max = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return None;
    }
    let sum_exp: f64 = log_weights.iter().map(|&lw| (lw - max).exp()).sum();
    Some(
        log_weights
            .iter()
            .map(|&lw| (lw - max).exp() / sum_exp)
            .collect(),
    )
}

/// Effective particle count of normalised weights.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq > 1e-12 { 1.0 / sum_sq } else { 0.0 }
}

/// Shannon entropy `-Σ w ln w` of normalised weights.
pub fn entropy(weights: &[f64]) -> f64 {
    weights
        .iter()
        .filter(|&&w| w > 0.0)
        .map(|&w| -w * w.ln())
        .sum()
}

/// Low-variance resampling.
///
/// `offset` is a uniform sample in `[0, 1)`. Returns the source index of
/// each of the `weights.len()` new particles, in ascending order.
pub fn low_variance_indices(weights: &[f64], offset: f64) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }

    let total: f64 = weights.iter().sum();
    let mut cumulative = Vec::with_capacity(n);
    let mut sum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        sum += if total > 1e-12 { w / total } else { 1.0 / n as f64 };
        cumulative.push(if i + 1 == n { 1.0 } else { sum });
    }

    let step = 1.0 / n as f64;
    let mut r = offset * step;
    let mut idx = 0;
    let mut indices = Vec::with_capacity(n);

    for _ in 0..n {
        while r > cumulative[idx] && idx < n - 1 {
            idx += 1;
        }
        indices.push(idx);
        r += step;
    }

    indices
}
