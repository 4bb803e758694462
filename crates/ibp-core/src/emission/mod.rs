//! Observation models.
//!
//! The model is chosen once from configuration. Each variant knows how to
//! accumulate sufficient statistics, draw parameters from their posterior
//! and score observations under each state.

mod multinomial;
mod regression;

pub use multinomial::MultinomialModel;
pub use regression::{RegressionKernel, Regressor};

use rand::RngCore;

use crate::config::{ConfigError, ObsModelConfig};
use crate::data::{ObjectRecord, ObservationSet};
use crate::error::{SamplerError, ShapeError};
use crate::model::{EmissionParams, StateAssignment, SufficientStats};

/// Parameter sampling capability shared by every observation model.
pub trait EmissionModel {
    /// Statistics of an empty assignment.
    fn prior_stats(&self, num_states: usize) -> SufficientStats;

    /// Deterministic starting parameters (prior mode) for `num_states` states.
    fn initial_params(&self, num_states: usize) -> EmissionParams;

    /// Statistics of the data under `assignment`.
    fn accumulate(
        &self,
        data: &ObservationSet,
        assignment: &StateAssignment,
    ) -> Result<SufficientStats, SamplerError>;

    /// Draw every state's parameters from the posterior given `stats`.
    fn sample_params(
        &self,
        stats: &SufficientStats,
        rng: &mut dyn RngCore,
    ) -> Result<EmissionParams, SamplerError>;

    /// `out[t][j]`: log-likelihood of observation `t` of `object` under
    /// state `states[j]`.
    fn log_likelihoods(
        &self,
        params: &EmissionParams,
        object: usize,
        record: &ObjectRecord,
        states: &[usize],
    ) -> Result<Vec<Vec<f64>>, SamplerError>;

    /// Reject parameters of the wrong variant, covering fewer than
    /// `num_states` states, or with rows of the wrong width.
    fn check_params(&self, params: &EmissionParams, num_states: usize) -> Result<(), ShapeError>;
}

/// Closed set of supported observation models.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationModel {
    Gaussian(RegressionKernel),
    AutoRegressive(RegressionKernel),
    Multinomial(MultinomialModel),
}

impl ObservationModel {
    pub fn from_config(config: &ObsModelConfig) -> Result<Self, ConfigError> {
        match config {
            ObsModelConfig::Gaussian(p) => Ok(Self::Gaussian(RegressionKernel::new(
                p.clone(),
                Regressor::Constant,
            ))),
            ObsModelConfig::AutoRegressive(p) => Ok(Self::AutoRegressive(RegressionKernel::new(
                p.clone(),
                Regressor::Lagged,
            ))),
            ObsModelConfig::Multinomial(p) => Ok(Self::Multinomial(MultinomialModel::new(p.clone()))),
            ObsModelConfig::Slds => Err(ConfigError::Unsupported {
                what: "observation model 'slds'".to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObservationModel::Gaussian(_) => "gaussian",
            ObservationModel::AutoRegressive(_) => "auto_regressive",
            ObservationModel::Multinomial(_) => "multinomial",
        }
    }

    fn inner(&self) -> &dyn EmissionModel {
        match self {
            ObservationModel::Gaussian(k) | ObservationModel::AutoRegressive(k) => k,
            ObservationModel::Multinomial(m) => m,
        }
    }
}

impl EmissionModel for ObservationModel {
    fn prior_stats(&self, num_states: usize) -> SufficientStats {
        self.inner().prior_stats(num_states)
    }

    fn initial_params(&self, num_states: usize) -> EmissionParams {
        self.inner().initial_params(num_states)
    }

    fn accumulate(
        &self,
        data: &ObservationSet,
        assignment: &StateAssignment,
    ) -> Result<SufficientStats, SamplerError> {
        self.inner().accumulate(data, assignment)
    }

    fn sample_params(
        &self,
        stats: &SufficientStats,
        rng: &mut dyn RngCore,
    ) -> Result<EmissionParams, SamplerError> {
        self.inner().sample_params(stats, rng)
    }

    fn log_likelihoods(
        &self,
        params: &EmissionParams,
        object: usize,
        record: &ObjectRecord,
        states: &[usize],
    ) -> Result<Vec<Vec<f64>>, SamplerError> {
        self.inner().log_likelihoods(params, object, record, states)
    }

    fn check_params(&self, params: &EmissionParams, num_states: usize) -> Result<(), ShapeError> {
        self.inner().check_params(params, num_states)
    }
}

/// Sequence length check shared by the models.
fn check_sequence_len(object: usize, expected: usize, actual: usize) -> Result<(), SamplerError> {
    if expected != actual {
        return Err(ShapeError::LengthMismatch {
            object,
            field: "z".to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn check_param_count(actual: usize, num_states: usize) -> Result<(), ShapeError> {
    if actual < num_states {
        return Err(ShapeError::Params {
            detail: format!("cover {actual} states, features use {num_states}"),
        });
    }
    Ok(())
}

/// Reject a state that has no parameters.
fn check_state(object: usize, state: usize, num_states: usize) -> Result<(), SamplerError> {
    if state >= num_states {
        return Err(SamplerError::UnknownState {
            object,
            state,
            num_states,
        });
    }
    Ok(())
}
