//! Gamma and inverse-Gamma helpers for conjugate updates.
//!
//! # Parameterization
//!
//! Uses **rate parameterization**: `Gamma(α, β)` where:
//! - `α` = shape parameter (α > 0)
//! - `β` = rate parameter (β > 0)
//!
//! `rand_distr::Gamma` takes a scale, so draws convert with `θ = 1/β`.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

fn valid_shape_rate(shape: f64, rate: f64) -> bool {
    shape.is_finite() && rate.is_finite() && shape > 0.0 && rate > 0.0
}

/// Mean of `Gamma(shape, rate)`: α/β.
///
/// Returns None for non-finite or non-positive parameters.
pub fn gamma_mean(shape: f64, rate: f64) -> Option<f64> {
    if !valid_shape_rate(shape, rate) {
        return None;
    }
    Some(shape / rate)
}

/// Draw from `Gamma(shape, rate)`.
pub fn sample_gamma<R: Rng + ?Sized>(shape: f64, rate: f64, rng: &mut R) -> Option<f64> {
    if !valid_shape_rate(shape, rate) {
        return None;
    }
    let dist = Gamma::new(shape, 1.0 / rate).ok()?;
    Some(dist.sample(rng))
}

/// Draw `ln X` for `X ~ Gamma(shape, 1)` without underflow for tiny shapes.
///
/// Uses `X = Y · U^(1/α)` with `Y ~ Gamma(α + 1, 1)` and `U ~ Uniform(0, 1)`.
pub fn sample_log_gamma<R: Rng + ?Sized>(shape: f64, rng: &mut R) -> Option<f64> {
    if !shape.is_finite() || shape <= 0.0 {
        return None;
    }
    if shape >= 1.0 {
        let dist = Gamma::new(shape, 1.0).ok()?;
        let x: f64 = dist.sample(rng);
        return Some(x.ln());
    }
    let dist = Gamma::new(shape + 1.0, 1.0).ok()?;
    let y: f64 = dist.sample(rng);
    // random() is in [0, 1); flip to (0, 1] so the log stays finite.
    let u: f64 = 1.0 - rng.random::<f64>();
    Some(y.ln() + u.ln() / shape)
}

/// Draw from `InvGamma(shape, scale)`: `1/X` with `X ~ Gamma(shape, rate = scale)`.
pub fn sample_inverse_gamma<R: Rng + ?Sized>(shape: f64, scale: f64, rng: &mut R) -> Option<f64> {
    let x = sample_gamma(shape, scale, rng)?;
    if x <= 0.0 {
        return None;
    }
    Some(1.0 / x)
}
