//! Shared fixtures and test doubles for integration tests.

#![allow(dead_code)]

use ibp_config::{ModelConfig, MultinomialPriors, ObsModelConfig, RegressionPriors};
use ibp_core::config::{RunConfig, SamplerSettings};
use ibp_core::data::{ObjectRecord, ObservationSet};
use ibp_core::error::{SamplerError, ShapeError};
use ibp_core::features::FeatureMatrix;
use ibp_core::hyperparams::Hyperparams;
use ibp_core::model::{
    EmissionParams, ObjectTransitions, StateAssignment, StateCounts, SufficientStats,
    TransitionDists,
};
use ibp_core::samplers::{ConjugateSamplers, InitialStructs, SamplerSuite};
use ibp_core::stats::{MemoryStore, StatsRecorder};
use ibp_core::sweep::{CancelToken, SweepOrchestrator};
use rand::RngCore;
use std::sync::{Arc, Mutex};

/// One collaborator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    InitializeStructs,
    Transitions,
    InitialStates,
    ObjectStates(usize),
    SufficientStats,
    Parameters,
    Hyperparams,
    Features,
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::InitializeStructs => "initialize_structs",
            Call::Transitions => "transitions",
            Call::InitialStates => "initial_states",
            Call::ObjectStates(_) => "object_states",
            Call::SufficientStats => "sufficient_stats",
            Call::Parameters => "parameters",
            Call::Hyperparams => "hyperparams",
            Call::Features => "features",
        }
    }
}

/// Values that crossed the collaborator boundary, in call order.
///
/// Object draws run in parallel, so `object_inputs` and `object_outputs`
/// are ordered by object only within one iteration's block.
#[derive(Debug, Default, Clone)]
pub struct Exchange {
    pub transitions_out: Vec<TransitionDists>,
    pub object_inputs: Vec<(usize, ObjectTransitions, EmissionParams)>,
    pub object_outputs: Vec<(usize, Vec<usize>)>,
    pub stats_inputs: Vec<StateAssignment>,
    pub stats_outputs: Vec<SufficientStats>,
    pub params_inputs: Vec<(EmissionParams, SufficientStats)>,
    pub params_outputs: Vec<EmissionParams>,
}

impl Exchange {
    /// The `block`-th group of `num_objects` object draws, sorted by object.
    pub fn object_block(
        &self,
        block: usize,
        num_objects: usize,
    ) -> (
        Vec<(usize, ObjectTransitions, EmissionParams)>,
        Vec<(usize, Vec<usize>)>,
    ) {
        let range = block * num_objects..(block + 1) * num_objects;
        let mut inputs = self.object_inputs[range.clone()].to_vec();
        let mut outputs = self.object_outputs[range].to_vec();
        inputs.sort_by_key(|(object, _, _)| *object);
        outputs.sort_by_key(|(object, _)| *object);
        (inputs, outputs)
    }
}

/// Wraps the reference samplers, logs every call and can fail on demand.
pub struct Recording {
    inner: ConjugateSamplers,
    log: Arc<Mutex<Vec<Call>>>,
    exchange: Arc<Mutex<Exchange>>,
    /// Fail the n-th (1-based) call with this name.
    fail: Option<(&'static str, usize)>,
    /// Cancel this token when the n-th transitions call starts.
    cancel: Option<(CancelToken, usize)>,
}

impl Recording {
    pub fn new(model: &ModelConfig) -> Self {
        Self {
            inner: ConjugateSamplers::new(model).expect("supported model"),
            log: Arc::default(),
            exchange: Arc::default(),
            fail: None,
            cancel: None,
        }
    }

    pub fn failing(mut self, name: &'static str, nth: usize) -> Self {
        self.fail = Some((name, nth));
        self
    }

    pub fn cancelling(mut self, token: CancelToken, nth_transitions: usize) -> Self {
        self.cancel = Some((token, nth_transitions));
        self
    }

    pub fn log_handle(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.log)
    }

    pub fn exchange_handle(&self) -> Arc<Mutex<Exchange>> {
        Arc::clone(&self.exchange)
    }

    fn exchange(&self) -> std::sync::MutexGuard<'_, Exchange> {
        self.exchange.lock().unwrap()
    }

    fn note(&self, call: Call) -> Result<(), SamplerError> {
        let mut log = self.log.lock().unwrap();
        log.push(call);
        let seen = log.iter().filter(|c| c.name() == call.name()).count();
        if let Some((token, nth)) = &self.cancel {
            if call == Call::Transitions && seen == *nth {
                token.cancel();
            }
        }
        match self.fail {
            Some((name, nth)) if name == call.name() && seen == nth => Err(SamplerError::Failed(
                format!("injected failure in {name} call {nth}"),
            )),
            _ => Ok(()),
        }
    }
}

impl SamplerSuite for Recording {
    fn initialize_structs(
        &self,
        features: &FeatureMatrix,
        data: &ObservationSet,
    ) -> Result<InitialStructs, SamplerError> {
        self.note(Call::InitializeStructs)?;
        self.inner.initialize_structs(features, data)
    }

    fn sample_transitions(
        &self,
        counts: &StateCounts,
        hyperparams: &Hyperparams,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<TransitionDists, SamplerError> {
        self.note(Call::Transitions)?;
        let out = self
            .inner
            .sample_transitions(counts, hyperparams, features, rng)?;
        self.exchange().transitions_out.push(out.clone());
        Ok(out)
    }

    fn sample_initial_states(
        &self,
        data: &ObservationSet,
        transitions: &TransitionDists,
        features: &FeatureMatrix,
        rng: &mut dyn RngCore,
    ) -> Result<StateAssignment, SamplerError> {
        self.note(Call::InitialStates)?;
        self.inner
            .sample_initial_states(data, transitions, features, rng)
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
        self.note(Call::ObjectStates(object))?;
        self.exchange()
            .object_inputs
            .push((object, transitions.clone(), params.clone()));
        let out = self
            .inner
            .sample_object_states(object, record, transitions, params, features, rng)?;
        self.exchange().object_outputs.push((object, out.clone()));
        Ok(out)
    }

    fn update_sufficient_stats(
        &self,
        data: &ObservationSet,
        assignment: &StateAssignment,
    ) -> Result<SufficientStats, SamplerError> {
        self.note(Call::SufficientStats)?;
        self.exchange().stats_inputs.push(assignment.clone());
        let out = self.inner.update_sufficient_stats(data, assignment)?;
        self.exchange().stats_outputs.push(out.clone());
        Ok(out)
    }

    fn sample_parameters(
        &self,
        params: &EmissionParams,
        stats: &SufficientStats,
        rng: &mut dyn RngCore,
    ) -> Result<EmissionParams, SamplerError> {
        self.note(Call::Parameters)?;
        self.exchange()
            .params_inputs
            .push((params.clone(), stats.clone()));
        let out = self.inner.sample_parameters(params, stats, rng)?;
        self.exchange().params_outputs.push(out.clone());
        Ok(out)
    }

    fn check_parameters(
        &self,
        params: &EmissionParams,
        num_states: usize,
    ) -> Result<(), ShapeError> {
        self.inner.check_parameters(params, num_states)
    }

    fn resample_hyperparams(
        &self,
        hyperparams: &Hyperparams,
        features: &FeatureMatrix,
        counts: &StateCounts,
        rng: &mut dyn RngCore,
    ) -> Result<Hyperparams, SamplerError> {
        self.note(Call::Hyperparams)?;
        self.inner
            .resample_hyperparams(hyperparams, features, counts, rng)
    }

    fn resample_features(
        &self,
        features: &FeatureMatrix,
        assignment: &StateAssignment,
        rng: &mut dyn RngCore,
    ) -> Result<FeatureMatrix, SamplerError> {
        self.note(Call::Features)?;
        self.inner.resample_features(features, assignment, rng)
    }
}

/// Collapse each run of per-object calls into one entry so logs compare
/// independently of thread scheduling.
pub fn collapse_object_calls(log: &[Call]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for call in log {
        let name = call.name();
        if name == "object_states" && out.last() == Some(&"object_states") {
            continue;
        }
        out.push(name);
    }
    out
}

pub fn gaussian_model() -> ModelConfig {
    ModelConfig {
        obs_model: ObsModelConfig::Gaussian(RegressionPriors::weak(1)),
        ..ModelConfig::default()
    }
}

pub fn multinomial_model(num_symbols: usize) -> ModelConfig {
    ModelConfig {
        obs_model: ObsModelConfig::Multinomial(MultinomialPriors {
            num_symbols,
            concentration: 1.0,
        }),
        ..ModelConfig::default()
    }
}

/// Two objects of lengths 5 and 3 with ground-truth labels.
pub fn two_object_data() -> ObservationSet {
    ObservationSet::new(vec![
        ObjectRecord::continuous(vec![
            vec![-2.1],
            vec![-1.9],
            vec![-2.0],
            vec![3.1],
            vec![2.9],
        ])
        .with_true_labels(vec![0, 0, 0, 1, 1]),
        ObjectRecord::continuous(vec![vec![3.0], vec![3.2], vec![-2.2]])
            .with_true_labels(vec![1, 1, 0]),
    ])
}

/// Same sequences, with initial labels for every timestep.
pub fn two_object_data_with_z_init() -> ObservationSet {
    let mut data = two_object_data();
    data.objects[0].z_init = Some(vec![Some(0), Some(0), None, Some(1), Some(1)]);
    data.objects[1].z_init = Some(vec![Some(1), None, Some(0)]);
    data
}

pub fn settings(n_iter: u64, save_min: u64) -> SamplerSettings {
    let mut s = SamplerSettings::with_iterations(n_iter);
    s.save_min = save_min;
    s.seed = Some(7);
    s
}

pub fn orchestrator<S: SamplerSuite>(
    model: ModelConfig,
    settings: SamplerSettings,
    data: ObservationSet,
    samplers: S,
) -> (SweepOrchestrator<S>, MemoryStore) {
    let store = MemoryStore::new();
    let recorder = StatsRecorder::new(&settings, Box::new(store.clone()));
    let run = Arc::new(RunConfig::new(model, settings).expect("valid config"));
    let orch = SweepOrchestrator::new(run, Arc::new(data), samplers, recorder)
        .expect("orchestrator builds");
    (orch, store)
}
