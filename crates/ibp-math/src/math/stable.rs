//! Numerically stable primitives for log-domain sampling.

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Convert log weights into a probability vector in place.
///
/// Returns the log normalizer, or None when every weight is -inf or any is NaN.
/// Entries at -inf become exactly 0.
pub fn normalize_log_weights(log_weights: &mut [f64]) -> Option<f64> {
    let norm = log_sum_exp(log_weights);
    if !norm.is_finite() {
        return None;
    }
    for w in log_weights.iter_mut() {
        *w = (*w - norm).exp();
    }
    Some(norm)
}

/// Harmonic number H_n = Σ_{i=1..n} 1/i.
pub fn harmonic_number(n: usize) -> f64 {
    (1..=n).map(|i| 1.0 / i as f64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn log_sum_exp_basic() {
        let v = [0.0, 0.0];
        let out = log_sum_exp(&v);
        assert!(approx_eq(out, 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_sum_exp_dominance() {
        let v = [-1000.0, 0.0];
        let out = log_sum_exp(&v);
        assert!(approx_eq(out, 0.0, 1e-12));
    }

    #[test]
    fn log_sum_exp_all_neg_inf() {
        let v = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        let out = log_sum_exp(&v);
        assert!(out.is_infinite() && out.is_sign_negative());
    }

    #[test]
    fn log_sum_exp_nan_propagates() {
        let out = log_sum_exp(&[0.0, f64::NAN]);
        assert!(out.is_nan());
    }

    #[test]
    fn normalize_masks_neg_infinity() {
        let mut w = [0.0, f64::NEG_INFINITY, 0.0];
        let norm = normalize_log_weights(&mut w).unwrap();
        assert!(approx_eq(norm, 2.0f64.ln(), 1e-12));
        assert_eq!(w[1], 0.0);
        assert!(approx_eq(w[0], 0.5, 1e-12));
        assert!(approx_eq(w[2], 0.5, 1e-12));
    }

    #[test]
    fn normalize_rejects_degenerate_weights() {
        let mut all_masked = [f64::NEG_INFINITY; 3];
        assert!(normalize_log_weights(&mut all_masked).is_none());

        let mut empty: [f64; 0] = [];
        assert!(normalize_log_weights(&mut empty).is_none());
    }

    #[test]
    fn normalize_survives_large_magnitudes() {
        let mut w = [-1e4, -1e4 + 1.0_f64.ln()];
        normalize_log_weights(&mut w).unwrap();
        assert!(approx_eq(w[0] + w[1], 1.0, 1e-12));
    }

    #[test]
    fn harmonic_numbers() {
        assert_eq!(harmonic_number(0), 0.0);
        assert!(approx_eq(harmonic_number(1), 1.0, 1e-15));
        assert!(approx_eq(harmonic_number(4), 25.0 / 12.0, 1e-12));
    }
}
