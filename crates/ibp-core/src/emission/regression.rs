//! Per-dimension Normal-Inverse-Gamma regression kernel.
//!
//! Each output dimension `d` of state `k` follows `y = a·x + e`,
//! `e ~ N(0, σ²)`, with prior `σ² ~ InvGamma(a0, b0)` and
//! `a | σ² ~ N(m0, σ²/k0)`. The regressor `x` is the constant 1 for
//! Gaussian emissions and the previous observation for AR(1) dynamics.

use ibp_config::RegressionPriors;
use rand::RngCore;

use super::{check_param_count, check_sequence_len, check_state, EmissionModel};
use crate::data::{ObjectRecord, ObservationSet, Observations};
use crate::error::{SamplerError, ShapeError};
use crate::model::{EmissionParams, RegressionStats, StateAssignment, SufficientStats};

/// What multiplies the coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regressor {
    /// `x = 1`: the coefficient is the state mean.
    Constant,
    /// `x = y[t-1]` per dimension, `0` at `t = 0`.
    Lagged,
}

impl Regressor {
    fn value(self, rows: &[Vec<f64>], t: usize, d: usize) -> f64 {
        match self {
            Regressor::Constant => 1.0,
            Regressor::Lagged if t == 0 => 0.0,
            Regressor::Lagged => rows[t - 1][d],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionKernel {
    pub priors: RegressionPriors,
    pub regressor: Regressor,
}

impl RegressionKernel {
    pub fn new(priors: RegressionPriors, regressor: Regressor) -> Self {
        Self { priors, regressor }
    }

    fn rows<'a>(object: usize, record: &'a ObjectRecord) -> Result<&'a [Vec<f64>], ShapeError> {
        match &record.obs {
            Observations::Continuous(rows) => Ok(rows),
            Observations::Discrete(symbols) if symbols.is_empty() => Ok(&[]),
            Observations::Discrete(_) => Err(ShapeError::Kind {
                object,
                expected: "continuous",
            }),
        }
    }

    /// Posterior `(mean, precision, shape, scale)` of one accumulator.
    fn posterior(&self, s: &RegressionStats) -> (f64, f64, f64, f64) {
        let p = &self.priors;
        let kn = p.coef_precision + s.sxx;
        let mn = (p.coef_precision * p.coef_mean + s.sxy) / kn;
        let an = p.noise_shape + 0.5 * s.n;
        let resid = s.syy + p.coef_precision * p.coef_mean * p.coef_mean - kn * mn * mn;
        // The residual is non-negative in exact arithmetic; rounding can push it below.
        let bn = p.noise_scale + 0.5 * resid.max(0.0);
        (mn, kn, an, bn)
    }
}

impl EmissionModel for RegressionKernel {
    fn prior_stats(&self, num_states: usize) -> SufficientStats {
        SufficientStats::Regression(vec![
            vec![RegressionStats::default(); self.priors.dim];
            num_states
        ])
    }

    fn initial_params(&self, num_states: usize) -> EmissionParams {
        let p = &self.priors;
        let var_mode = p.noise_scale / (p.noise_shape + 1.0);
        EmissionParams::Regression {
            coef: vec![vec![p.coef_mean; p.dim]; num_states],
            noise_var: vec![vec![var_mode; p.dim]; num_states],
        }
    }

    fn accumulate(
        &self,
        data: &ObservationSet,
        assignment: &StateAssignment,
    ) -> Result<SufficientStats, SamplerError> {
        let dim = self.priors.dim;
        let mut stats = vec![vec![RegressionStats::default(); dim]; assignment.num_states];
        for (object, (record, seq)) in data.iter().zip(&assignment.sequences).enumerate() {
            let rows = Self::rows(object, record)?;
            check_sequence_len(object, rows.len(), seq.len())?;
            for (t, (row, &k)) in rows.iter().zip(seq).enumerate() {
                if row.len() != dim {
                    return Err(ShapeError::Dimension {
                        object,
                        t,
                        expected: dim,
                        actual: row.len(),
                    }
                    .into());
                }
                for (d, &y) in row.iter().enumerate() {
                    stats[k][d].add(self.regressor.value(rows, t, d), y);
                }
            }
        }
        Ok(SufficientStats::Regression(stats))
    }

    fn sample_params(
        &self,
        stats: &SufficientStats,
        rng: &mut dyn RngCore,
    ) -> Result<EmissionParams, SamplerError> {
        let SufficientStats::Regression(stats) = stats else {
            return Err(SamplerError::Failed(
                "regression kernel given multinomial statistics".to_string(),
            ));
        };

        let mut coef = Vec::with_capacity(stats.len());
        let mut noise_var = Vec::with_capacity(stats.len());
        for per_dim in stats {
            let mut a = Vec::with_capacity(per_dim.len());
            let mut v = Vec::with_capacity(per_dim.len());
            for s in per_dim {
                let (mn, kn, an, bn) = self.posterior(s);
                let var = ibp_math::sample_inverse_gamma(an, bn, rng).ok_or_else(|| {
                    SamplerError::Degenerate {
                        what: "noise variance posterior",
                        detail: format!("shape={an}, scale={bn}"),
                    }
                })?;
                let c = ibp_math::sample_normal(mn, var / kn, rng).ok_or_else(|| {
                    SamplerError::Degenerate {
                        what: "coefficient posterior",
                        detail: format!("mean={mn}, variance={}", var / kn),
                    }
                })?;
                a.push(c);
                v.push(var);
            }
            coef.push(a);
            noise_var.push(v);
        }
        Ok(EmissionParams::Regression { coef, noise_var })
    }

    fn log_likelihoods(
        &self,
        params: &EmissionParams,
        object: usize,
        record: &ObjectRecord,
        states: &[usize],
    ) -> Result<Vec<Vec<f64>>, SamplerError> {
        let EmissionParams::Regression { coef, noise_var } = params else {
            return Err(SamplerError::Failed(
                "regression kernel given multinomial parameters".to_string(),
            ));
        };
        self.check_params(params, 0)?;
        let rows = Self::rows(object, record)?;
        for &k in states {
            check_state(object, k, coef.len())?;
        }
        let dim = self.priors.dim;
        if let Some((t, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != dim) {
            return Err(ShapeError::Dimension {
                object,
                t,
                expected: dim,
                actual: row.len(),
            }
            .into());
        }

        Ok(rows
            .iter()
            .enumerate()
            .map(|(t, row)| {
                states
                    .iter()
                    .map(|&k| {
                        row.iter()
                            .enumerate()
                            .map(|(d, &y)| {
                                let mean = coef[k][d] * self.regressor.value(rows, t, d);
                                ibp_math::normal_log_pdf(y, mean, noise_var[k][d])
                            })
                            .sum()
                    })
                    .collect()
            })
            .collect())
    }

    fn check_params(&self, params: &EmissionParams, num_states: usize) -> Result<(), ShapeError> {
        let EmissionParams::Regression { coef, noise_var } = params else {
            return Err(ShapeError::Params {
                detail: "expected regression parameters, got multinomial".to_string(),
            });
        };
        if coef.len() != noise_var.len() {
            return Err(ShapeError::Params {
                detail: format!(
                    "{} coefficient rows but {} noise variance rows",
                    coef.len(),
                    noise_var.len()
                ),
            });
        }
        check_param_count(coef.len(), num_states)?;
        let dim = self.priors.dim;
        let bad = coef
            .iter()
            .zip(noise_var)
            .enumerate()
            .find(|(_, (c, v))| c.len() != dim || v.len() != dim);
        if let Some((k, (c, v))) = bad {
            return Err(ShapeError::Params {
                detail: format!(
                    "state {k} has {} coefficients and {} variances, expected {dim}",
                    c.len(),
                    v.len()
                ),
            });
        }
        Ok(())
    }
}
