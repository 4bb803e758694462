use ibp_config::{HmmHyperPriors, ModelConfig};
use rand::RngCore;

use super::{hyper, states, transitions, InitialStructs, SamplerSuite};
use crate::config::ConfigError;
use crate::data::{ObjectRecord, ObservationSet};
use crate::emission::{EmissionModel, ObservationModel};
use crate::error::{SamplerError, ShapeError};
use crate::features::FeatureMatrix;
use crate::hyperparams::Hyperparams;
use crate::model::{
    EmissionParams, ObjectTransitions, StateAssignment, StateCounts, SufficientStats,
    TransitionDists,
};

/// Reference samplers: Gamma-normalized transitions, FFBS state
/// sequences, conjugate emission posteriors and the IBP mass update.
#[derive(Debug, Clone)]
pub struct ConjugateSamplers {
    emission: ObservationModel,
    hyper_priors: HmmHyperPriors,
}

impl ConjugateSamplers {
    pub fn new(model: &ModelConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            emission: ObservationModel::from_config(&model.obs_model)?,
            hyper_priors: model.hmm.clone(),
        })
    }

    pub fn emission(&self) -> &ObservationModel {
        &self.emission
    }
}

impl SamplerSuite for ConjugateSamplers {
    fn initialize_structs(
        &self,
        features: &FeatureMatrix,
        data: &ObservationSet,
    ) -> Result<InitialStructs, SamplerError> {
        if features.num_objects() != data.len() {
            return Err(ShapeError::ObjectCount {
                field: "features".to_string(),
                expected: data.len(),
                actual: features.num_objects(),
            }
            .into());
        }
        let num_states = features.num_states();
        Ok(InitialStructs {
            params: self.emission.initial_params(num_states),
            stats: self.emission.prior_stats(num_states),
            counts: StateCounts::empty(data.len(), num_states),
        })
    }

    fn sample_transitions(
        &self,
        counts: &StateCounts,
        hyperparams: &Hyperparams,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<TransitionDists, SamplerError> {
        let objects = (0..features.num_objects())
            .map(|i| {
                transitions::sample_object_transitions(
                    i,
                    counts,
                    hyperparams,
                    &features.allowed_states(i),
                    features.num_states(),
                    rng,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TransitionDists { objects })
    }

    fn sample_initial_states(
        &self,
        data: &ObservationSet,
        transitions: &TransitionDists,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<StateAssignment, SamplerError> {
        let sequences = data
            .iter()
            .zip(&transitions.objects)
            .enumerate()
            .map(|(i, (record, tr))| {
                states::sample_from_prior(i, record.len(), record.z_init.as_deref(), tr, rng)
            })
            .collect::<Result<Vec<_>, _>>()?;
        StateAssignment::from_sequences(sequences, features.num_states())
    }

    fn sample_object_states(
        &self,
        object: usize,
        record: &ObjectRecord,
        transitions: &ObjectTransitions,
        params: &EmissionParams,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<usize>, SamplerError> {
        let allowed = features.allowed_states(object);
        let log_lik = self
            .emission
            .log_likelihoods(params, object, record, &allowed)?;
        states::forward_backward_sample(object, &log_lik, &allowed, transitions, rng)
    }

    fn update_sufficient_stats(
        &self,
        data: &ObservationSet,
        assignment: &StateAssignment,
    ) -> Result<SufficientStats, SamplerError> {
        self.emission.accumulate(data, assignment)
    }

    fn sample_parameters(
        &self,
        _params: &EmissionParams,
        stats: &SufficientStats,
        rng: &mut dyn RngCore,
    ) -> Result<EmissionParams, SamplerError> {
        self.emission.sample_params(stats, rng)
    }

    fn check_parameters(
        &self,
        params: &EmissionParams,
        num_states: usize,
    ) -> Result<(), ShapeError> {
        self.emission.check_params(params, num_states)
    }

    fn resample_hyperparams(
        &self,
        hyperparams: &Hyperparams,
        features: &FeatureMatrix,
        _counts: &StateCounts,
        rng: &mut dyn RngCore,
    ) -> Result<Hyperparams, SamplerError> {
        hyper::resample_gamma(hyperparams, &self.hyper_priors, features, rng)
    }
}
