//! Conjugate update of the IBP mass parameter.

use ibp_config::HmmHyperPriors;
use rand::RngCore;

use crate::error::SamplerError;
use crate::features::FeatureMatrix;
use crate::hyperparams::Hyperparams;

/// `gamma ~ Gamma(a_gamma + K+, b_gamma + H_N)`, with `K+` the number of
/// active features and `H_N` the harmonic number of the object count.
/// `alpha`, `kappa` and `sigma` are returned unchanged.
pub fn resample_gamma(
    current: &Hyperparams,
    priors: &HmmHyperPriors,
    features: &FeatureMatrix,
    rng: &mut dyn RngCore,
) -> Result<Hyperparams, SamplerError> {
    let active = features.active_states().len() as f64;
    let shape = priors.a_gamma + active;
    let rate = priors.b_gamma + ibp_math::harmonic_number(features.num_objects());
    let gamma = ibp_math::sample_gamma(shape, rate, rng).ok_or_else(|| {
        SamplerError::Degenerate {
            what: "gamma posterior",
            detail: format!("shape={shape}, rate={rate}"),
        }
    })?;
    Ok(Hyperparams { gamma, ..*current })
}
