//! Sampling collaborators.
//!
//! The orchestrator owns the order of the sweep; everything random happens
//! behind [`SamplerSuite`]. [`ConjugateSamplers`] is the reference
//! implementation built from conjugate updates.

mod conjugate;
pub mod hyper;
pub mod states;
pub mod transitions;

pub use conjugate::ConjugateSamplers;

use rand::RngCore;

use crate::data::{ObjectRecord, ObservationSet};
use crate::error::{SamplerError, ShapeError};
use crate::features::FeatureMatrix;
use crate::hyperparams::Hyperparams;
use crate::model::{
    EmissionParams, ObjectTransitions, StateAssignment, StateCounts, SufficientStats,
    TransitionDists,
};

/// Structures built before the first draw.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialStructs {
    pub params: EmissionParams,
    pub stats: SufficientStats,
    pub counts: StateCounts,
}

/// Conditional samplers invoked by the sweep.
///
/// Implementations must be `Sync`: [`sample_object_states`] runs for many
/// objects at once, each with its own RNG.
///
/// [`sample_object_states`]: SamplerSuite::sample_object_states
pub trait SamplerSuite: Send + Sync {
    fn initialize_structs(
        &self,
        features: &FeatureMatrix,
        data: &ObservationSet,
    ) -> Result<InitialStructs, SamplerError>;

    fn sample_transitions(
        &self,
        counts: &StateCounts,
        hyperparams: &Hyperparams,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<TransitionDists, SamplerError>;

    /// First state sequence: fixed `z_init` labels where present, the
    /// transition prior elsewhere.
    fn sample_initial_states(
        &self,
        data: &ObservationSet,
        transitions: &TransitionDists,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<StateAssignment, SamplerError>;

    fn sample_object_states(
        &self,
        object: usize,
        record: &ObjectRecord,
        transitions: &ObjectTransitions,
        params: &EmissionParams,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<usize>, SamplerError>;

    fn update_sufficient_stats(
        &self,
        data: &ObservationSet,
        assignment: &StateAssignment,
    ) -> Result<SufficientStats, SamplerError>;

    fn sample_parameters(
        &self,
        params: &EmissionParams,
        stats: &SufficientStats,
        rng: &mut dyn RngCore,
    ) -> Result<EmissionParams, SamplerError>;

    /// Validate emission parameters coming from outside the sweep, such as
    /// a checkpoint, before any state sequence is scored against them.
    fn check_parameters(
        &self,
        params: &EmissionParams,
        num_states: usize,
    ) -> Result<(), ShapeError>;

    fn resample_hyperparams(
        &self,
        hyperparams: &Hyperparams,
        _features: &FeatureMatrix,
        _counts: &StateCounts,
        _rng: &mut dyn RngCore,
    ) -> Result<Hyperparams, SamplerError> {
        Ok(*hyperparams)
    }

    fn resample_features(
        &self,
        features: &FeatureMatrix,
        _assignment: &StateAssignment,
        _rng: &mut dyn RngCore,
    ) -> Result<FeatureMatrix, SamplerError> {
        Ok(features.clone())
    }
}
