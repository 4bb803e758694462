//! State-sequence draws.
//!
//! [`forward_backward_sample`] is blocked forward filtering / backward
//! sampling in log space over an object's allowed states only.
//! [`sample_from_prior`] walks the transition model forward, honouring
//! fixed initial labels.

use ibp_math::{log_sum_exp, sample_categorical, sample_log_categorical};
use rand::RngCore;

use crate::error::{SamplerError, ShapeError};
use crate::model::ObjectTransitions;

/// Draw a state sequence given per-timestep log-likelihoods.
///
/// `log_lik[t][a]` scores state `allowed[a]` at time `t`. Returned labels
/// are global state indices.
pub fn forward_backward_sample(
    object: usize,
    log_lik: &[Vec<f64>],
    allowed: &[usize],
    transitions: &ObjectTransitions,
    rng: &mut dyn RngCore,
) -> Result<Vec<usize>, SamplerError> {
    let len = log_lik.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    let width = allowed.len();
    let log_init: Vec<f64> = allowed
        .iter()
        .map(|&k| transitions.initial[k].ln())
        .collect();
    let log_trans: Vec<Vec<f64>> = allowed
        .iter()
        .map(|&j| allowed.iter().map(|&k| transitions.rows[j][k].ln()).collect())
        .collect();

    // Normalized log filtering distributions.
    let mut filtered: Vec<Vec<f64>> = Vec::with_capacity(len);
    let mut scratch = vec![0.0; width];
    for (t, ll) in log_lik.iter().enumerate() {
        let mut msg: Vec<f64> = if t == 0 {
            (0..width).map(|a| log_init[a] + ll[a]).collect()
        } else {
            let prev = &filtered[t - 1];
            (0..width)
                .map(|b| {
                    for a in 0..width {
                        scratch[a] = prev[a] + log_trans[a][b];
                    }
                    ll[b] + log_sum_exp(&scratch)
                })
                .collect()
        };
        let norm = log_sum_exp(&msg);
        if !norm.is_finite() {
            return Err(SamplerError::DeadEnd { object, t });
        }
        msg.iter_mut().for_each(|m| *m -= norm);
        filtered.push(msg);
    }

    let mut local = vec![0usize; len];
    local[len - 1] = sample_log_categorical(&filtered[len - 1], rng)
        .ok_or(SamplerError::DeadEnd { object, t: len - 1 })?;
    for t in (0..len - 1).rev() {
        let next = local[t + 1];
        let weights: Vec<f64> = (0..width)
            .map(|a| filtered[t][a] + log_trans[a][next])
            .collect();
        local[t] = sample_log_categorical(&weights, rng).ok_or(SamplerError::DeadEnd { object, t })?;
    }

    Ok(local.into_iter().map(|a| allowed[a]).collect())
}

/// Walk the transition model forward for `len` steps.
///
/// `fixed[t] = Some(k)` clamps the label at `t`; the next step then
/// continues from `k`.
pub fn sample_from_prior(
    object: usize,
    len: usize,
    fixed: Option<&[Option<usize>]>,
    transitions: &ObjectTransitions,
    rng: &mut dyn RngCore,
) -> Result<Vec<usize>, SamplerError> {
    if let Some(labels) = fixed {
        if labels.len() != len {
            return Err(ShapeError::LengthMismatch {
                object,
                field: "z_init".to_string(),
                expected: len,
                actual: labels.len(),
            }
            .into());
        }
    }

    let num_states = transitions.num_states();
    let mut seq = Vec::with_capacity(len);
    for t in 0..len {
        let clamped = fixed.and_then(|labels| labels[t]);
        let state = match clamped {
            Some(k) if k >= num_states => {
                return Err(SamplerError::UnknownState {
                    object,
                    state: k,
                    num_states,
                })
            }
            Some(k) => k,
            None => {
                let weights = match seq.last() {
                    None => &transitions.initial,
                    Some(&prev) => &transitions.rows[prev],
                };
                sample_categorical(weights, rng).ok_or(SamplerError::DeadEnd { object, t })?
            }
        };
        seq.push(state);
    }
    Ok(seq)
}
