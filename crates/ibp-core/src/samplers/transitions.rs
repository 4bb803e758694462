//! Transition draws restricted to each object's allowed states.
//!
//! Row `j` of object `i` is `η_jk ~ Gamma(α + κ·δ_jk + n_jk, σ)` over
//! allowed `k`, normalized. The common scale `σ` cancels in the
//! normalization, so draws are made in log space with unit scale.

use rand::RngCore;

use crate::error::SamplerError;
use crate::hyperparams::Hyperparams;
use crate::model::{ObjectTransitions, StateCounts};

/// Normalized draw of `Gamma(shape_k, 1)` variates, in probability space.
fn normalized_gamma_draws(
    shapes: &[f64],
    rng: &mut dyn RngCore,
) -> Result<Vec<f64>, SamplerError> {
    let mut logs = shapes
        .iter()
        .map(|&a| {
            ibp_math::sample_log_gamma(a, rng).ok_or_else(|| SamplerError::Degenerate {
                what: "transition weight",
                detail: format!("gamma shape {}", a),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    ibp_math::normalize_log_weights(&mut logs).ok_or_else(|| SamplerError::Degenerate {
        what: "transition row",
        detail: format!("shapes {:?}", shapes),
    })?;
    Ok(logs)
}

/// Draw object `object`'s initial distribution and transition rows.
pub fn sample_object_transitions(
    object: usize,
    counts: &StateCounts,
    hyperparams: &Hyperparams,
    allowed: &[usize],
    num_states: usize,
    rng: &mut dyn RngCore,
) -> Result<ObjectTransitions, SamplerError> {
    if allowed.is_empty() {
        return Err(SamplerError::Degenerate {
            what: "feature row",
            detail: format!("object {} has no allowed states", object),
        });
    }

    let mut initial = vec![0.0; num_states];
    let shapes: Vec<f64> = allowed
        .iter()
        .map(|&k| hyperparams.alpha + counts.initial_count(object, k) as f64)
        .collect();
    for (&k, p) in allowed.iter().zip(normalized_gamma_draws(&shapes, rng)?) {
        initial[k] = p;
    }

    let mut rows = vec![vec![0.0; num_states]; num_states];
    for &j in allowed {
        let shapes: Vec<f64> = allowed
            .iter()
            .map(|&k| {
                let sticky = if j == k { hyperparams.kappa } else { 0.0 };
                hyperparams.alpha + sticky + counts.transition_count(object, j, k) as f64
            })
            .collect();
        for (&k, p) in allowed.iter().zip(normalized_gamma_draws(&shapes, rng)?) {
            rows[j][k] = p;
        }
    }

    Ok(ObjectTransitions { initial, rows })
}
