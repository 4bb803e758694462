//! Univariate Normal density and draws (variance parameterization).

use rand::Rng;
use rand_distr::{Distribution, Normal};

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)

/// Log density of `N(mean, variance)` at x.
///
/// Returns NAN for a non-positive or non-finite variance.
pub fn normal_log_pdf(x: f64, mean: f64, variance: f64) -> f64 {
    if !variance.is_finite() || variance <= 0.0 {
        return f64::NAN;
    }
    let diff = x - mean;
    -LOG_SQRT_2PI - 0.5 * variance.ln() - 0.5 * diff * diff / variance
}

/// Draw from `N(mean, variance)`.
pub fn sample_normal<R: Rng + ?Sized>(mean: f64, variance: f64, rng: &mut R) -> Option<f64> {
    if !mean.is_finite() || !variance.is_finite() || variance < 0.0 {
        return None;
    }
    let dist = Normal::new(mean, variance.sqrt()).ok()?;
    Some(dist.sample(rng))
}
