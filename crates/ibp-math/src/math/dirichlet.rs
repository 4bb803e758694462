//! Dirichlet-Multinomial conjugate model for transition and emission rows.
//!
//! The model uses:
//! - Prior: `p = (p_1..p_K) ~ Dirichlet(α_1..α_K)`
//! - Likelihood: `n = (n_1..n_K) | p ~ Multinomial(N, p)` where `N = Σ_i n_i`
//! - Posterior: `p | n ~ Dirichlet(α_i + η·n_i)`
//!
//! Draws go through log-space Gamma variates so rows with very small
//! concentrations still normalize instead of collapsing to all zeros.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::gamma::sample_log_gamma;
use super::stable::normalize_log_weights;

/// Parameters for a Dirichlet distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirichletParams {
    /// Concentration parameters (all must be > 0)
    pub alpha: Vec<f64>,
}

impl DirichletParams {
    /// Create new Dirichlet parameters with validation.
    ///
    /// Returns None if any parameter is non-positive, non-finite, or if the vector is empty.
    pub fn new(alpha: Vec<f64>) -> Option<Self> {
        if alpha.is_empty() {
            return None;
        }
        for &a in &alpha {
            if !a.is_finite() || a <= 0.0 {
                return None;
            }
        }
        Some(Self { alpha })
    }

    /// Create a symmetric Dirichlet with all α_i = value.
    pub fn symmetric(k: usize, value: f64) -> Option<Self> {
        if k == 0 || !value.is_finite() || value <= 0.0 {
            return None;
        }
        Some(Self {
            alpha: vec![value; k],
        })
    }

    /// Number of categories K.
    pub fn k(&self) -> usize {
        self.alpha.len()
    }

    /// Sum of all concentration parameters: α_0 = Σ_i α_i.
    pub fn concentration(&self) -> f64 {
        self.alpha.iter().sum()
    }

    /// Mean of the Dirichlet distribution: E[p_i] = α_i / α_0.
    pub fn mean(&self) -> Vec<f64> {
        let sum = self.concentration();
        self.alpha.iter().map(|a| a / sum).collect()
    }

    /// Draw a probability vector.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<f64>> {
        let mut logs = Vec::with_capacity(self.alpha.len());
        for &a in &self.alpha {
            logs.push(sample_log_gamma(a, rng)?);
        }
        normalize_log_weights(&mut logs)?;
        Some(logs)
    }
}

/// Compute posterior parameters after observing counts.
///
/// Uses η-tempering: posterior_i = α_i + η·n_i
///
/// # Arguments
/// * `prior` - Prior Dirichlet parameters
/// * `counts` - Observed counts for each category (must have same length as prior)
/// * `eta` - Tempering factor in (0, 1]; use 1.0 for standard updates
///
/// # Returns
/// Posterior DirichletParams, or None if inputs are invalid.
pub fn posterior_params(
    prior: &DirichletParams,
    counts: &[f64],
    eta: f64,
) -> Option<DirichletParams> {
    if counts.len() != prior.k() {
        return None;
    }
    if eta.is_nan() || eta <= 0.0 || eta > 1.0 {
        return None;
    }
    for &c in counts {
        if c.is_nan() || c < 0.0 {
            return None;
        }
    }

    let new_alpha: Vec<f64> = prior
        .alpha
        .iter()
        .zip(counts.iter())
        .map(|(&a, &n)| a + eta * n)
        .collect();

    DirichletParams::new(new_alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    fn vec_approx_eq(a: &[f64], b: &[f64], tol: f64) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b.iter()).all(|(&x, &y)| approx_eq(x, y, tol))
    }

    // =======================================================================
    // DirichletParams tests
    // =======================================================================

    #[test]
    fn dirichlet_params_new_valid() {
        let p = DirichletParams::new(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(p.k(), 3);
        assert!(approx_eq(p.concentration(), 6.0, 1e-12));
    }

    #[test]
    fn dirichlet_params_new_invalid() {
        assert!(DirichletParams::new(vec![]).is_none());
        assert!(DirichletParams::new(vec![0.0, 1.0]).is_none());
        assert!(DirichletParams::new(vec![-1.0, 1.0]).is_none());
        assert!(DirichletParams::new(vec![f64::NAN, 1.0]).is_none());
        assert!(DirichletParams::new(vec![f64::INFINITY, 1.0]).is_none());
    }

    #[test]
    fn dirichlet_params_symmetric() {
        let p = DirichletParams::symmetric(5, 2.0).unwrap();
        assert_eq!(p.k(), 5);
        assert!(approx_eq(p.concentration(), 10.0, 1e-12));
        assert!(DirichletParams::symmetric(0, 1.0).is_none());
    }

    #[test]
    fn dirichlet_params_mean() {
        let p = DirichletParams::new(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(vec_approx_eq(
            &p.mean(),
            &[1.0 / 6.0, 2.0 / 6.0, 3.0 / 6.0],
            1e-12
        ));
    }

    // =======================================================================
    // posterior_params tests
    // =======================================================================

    #[test]
    fn posterior_params_standard_update() {
        let prior = DirichletParams::symmetric(3, 1.0).unwrap();
        let post = posterior_params(&prior, &[5.0, 3.0, 2.0], 1.0).unwrap();
        assert!(vec_approx_eq(&post.alpha, &[6.0, 4.0, 3.0], 1e-12));
    }

    #[test]
    fn posterior_params_invalid_inputs() {
        let prior = DirichletParams::symmetric(3, 1.0).unwrap();
        assert!(posterior_params(&prior, &[1.0, 2.0], 1.0).is_none());
        assert!(posterior_params(&prior, &[1.0, 2.0, 3.0], 0.0).is_none());
        assert!(posterior_params(&prior, &[-1.0, 2.0, 3.0], 1.0).is_none());
    }

    // =======================================================================
    // sampling tests
    // =======================================================================

    #[test]
    fn sample_is_a_probability_vector() {
        let mut rng = StdRng::seed_from_u64(17);
        let p = DirichletParams::new(vec![0.5, 2.0, 7.0]).unwrap();
        for _ in 0..100 {
            let draw = p.sample(&mut rng).unwrap();
            assert_eq!(draw.len(), 3);
            assert!(draw.iter().all(|&x| (0.0..=1.0).contains(&x)));
            assert!(approx_eq(draw.iter().sum::<f64>(), 1.0, 1e-9));
        }
    }

    #[test]
    fn sample_tiny_concentration_still_normalizes() {
        let mut rng = StdRng::seed_from_u64(23);
        let p = DirichletParams::symmetric(4, 1e-4).unwrap();
        for _ in 0..100 {
            let draw = p.sample(&mut rng).unwrap();
            assert!(approx_eq(draw.iter().sum::<f64>(), 1.0, 1e-9));
        }
    }

    #[test]
    fn sample_mean_tracks_params() {
        let mut rng = StdRng::seed_from_u64(29);
        let p = DirichletParams::new(vec![2.0, 6.0]).unwrap();
        let n = 5_000;
        let mut acc = 0.0;
        for _ in 0..n {
            acc += p.sample(&mut rng).unwrap()[1];
        }
        assert!((acc / n as f64 - 0.75).abs() < 0.02);
    }
}
