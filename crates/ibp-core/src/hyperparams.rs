//! Concentration hyperparameters of the IBP-HMM.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, HmmHyperPriors};

/// Current hyperparameter values.
///
/// Only the hyperparameter resampler produces new values after
/// initialization; the orchestrator never edits them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    /// State-usage concentration.
    pub alpha: f64,
    /// Self-transition stickiness.
    pub kappa: f64,
    /// Transition scale. Fixed at 1.
    pub sigma: f64,
    /// Feature-allocation mass.
    pub gamma: f64,
}

impl Hyperparams {
    /// Prior means `a_*/b_*`, with `sigma = 1`.
    pub fn initialize(priors: &HmmHyperPriors) -> Result<Self, ConfigError> {
        Ok(Self {
            alpha: prior_mean(("a_alpha", priors.a_alpha), ("b_alpha", priors.b_alpha))?,
            kappa: prior_mean(("a_kappa", priors.a_kappa), ("b_kappa", priors.b_kappa))?,
            sigma: 1.0,
            gamma: prior_mean(("a_gamma", priors.a_gamma), ("b_gamma", priors.b_gamma))?,
        })
    }
}

fn prior_mean(
    (shape_name, shape): (&'static str, f64),
    (rate_name, rate): (&'static str, f64),
) -> Result<f64, ConfigError> {
    for (name, value) in [(rate_name, rate), (shape_name, shape)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::InvalidPrior { name, value });
        }
    }
    ibp_math::gamma_mean(shape, rate).ok_or(ConfigError::InvalidPrior {
        name: rate_name,
        value: rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_means() {
        let priors = HmmHyperPriors {
            a_alpha: 2.0,
            b_alpha: 4.0,
            a_kappa: 30.0,
            b_kappa: 3.0,
            a_gamma: 5.0,
            b_gamma: 2.0,
        };
        let h = Hyperparams::initialize(&priors).unwrap();
        assert_eq!(h.alpha, 0.5);
        assert_eq!(h.kappa, 10.0);
        assert_eq!(h.sigma, 1.0);
        assert_eq!(h.gamma, 2.5);
    }

    #[test]
    fn bit_identical_on_repeat() {
        let priors = HmmHyperPriors {
            a_alpha: 0.1,
            b_alpha: 0.3,
            ..Default::default()
        };
        let a = Hyperparams::initialize(&priors).unwrap();
        let b = Hyperparams::initialize(&priors).unwrap();
        assert_eq!(a.alpha.to_bits(), b.alpha.to_bits());
        assert_eq!(a.kappa.to_bits(), b.kappa.to_bits());
        assert_eq!(a.gamma.to_bits(), b.gamma.to_bits());
    }

    #[test]
    fn non_positive_rate_rejected() {
        for rate in [0.0, -1.0, f64::NAN] {
            let priors = HmmHyperPriors {
                b_kappa: rate,
                ..Default::default()
            };
            match Hyperparams::initialize(&priors) {
                Err(ConfigError::InvalidPrior { name, .. }) => assert_eq!(name, "b_kappa"),
                other => panic!("expected InvalidPrior, got {other:?}"),
            }
        }
    }

    #[test]
    fn non_positive_shape_rejected() {
        let priors = HmmHyperPriors {
            a_gamma: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            Hyperparams::initialize(&priors),
            Err(ConfigError::InvalidPrior { name: "a_gamma", .. })
        ));
    }
}
