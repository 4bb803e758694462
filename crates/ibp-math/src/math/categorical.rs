//! Categorical draws from probability or log-weight vectors.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use super::stable::normalize_log_weights;

/// Draw an index with probability proportional to `weights`.
///
/// Returns None when the weights are empty, negative, non-finite, or all zero.
pub fn sample_categorical<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    if weights.iter().any(|w| !w.is_finite()) {
        return None;
    }
    let dist = WeightedIndex::<f64>::new(weights.iter().copied()).ok()?;
    Some(dist.sample(rng))
}

/// Draw an index from unnormalized log weights (-inf entries are never drawn).
pub fn sample_log_categorical<R: Rng + ?Sized>(log_weights: &[f64], rng: &mut R) -> Option<usize> {
    let mut probs = log_weights.to_vec();
    normalize_log_weights(&mut probs)?;
    sample_categorical(&probs, rng)
}
