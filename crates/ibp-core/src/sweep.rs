//! Gibbs sweep orchestration.
//!
//! [`SweepOrchestrator`] owns the chain state and the order in which the
//! collaborators are called:
//!
//! ```text
//! Uninitialized --bootstrap--> Bootstrapped --step--> Iterating(1) --step--> ...
//!       |                           |                      |
//!       +------------ Failed { iteration } <---------------+
//! Iterating(n) --finish--> Done
//! ```
//!
//! Each iteration builds a new [`SweepState`] from the previous one and
//! swaps it in only after every step succeeded. A failed iteration leaves
//! the previous state in place and records nothing for itself.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info_span;

use crate::config::{ConfigError, RunConfig, SamplerSettings};
use crate::data::ObservationSet;
use crate::error::{SamplerError, ShapeError, SweepError, SweepStep};
use crate::features::FeatureMatrix;
use crate::hyperparams::Hyperparams;
use crate::log_event;
use crate::logging::{event_names, generate_run_id, get_host_id, LogContext, Stage};
use crate::model::{ModelState, StateAssignment, StateCounts, SweepState};
use crate::samplers::SamplerSuite;
use crate::sequence::{EvaluationArrays, SequenceIndex};
use crate::stats::{RunInfo, StatsRecorder, StatsSnapshot};

/// Lifecycle of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Uninitialized,
    Bootstrapped,
    /// The given iteration (1-based) is the last completed one.
    Iterating(u64),
    Done,
    /// The given iteration (0 = bootstrap) failed.
    Failed { iteration: u64 },
}

impl SweepPhase {
    /// Last completed iteration, when the chain has a state.
    pub fn completed(&self) -> Option<u64> {
        match self {
            SweepPhase::Bootstrapped => Some(0),
            SweepPhase::Iterating(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SweepPhase::Done | SweepPhase::Failed { .. })
    }
}

impl std::fmt::Display for SweepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepPhase::Uninitialized => write!(f, "uninitialized"),
            SweepPhase::Bootstrapped => write!(f, "bootstrapped"),
            SweepPhase::Iterating(i) => write!(f, "iterating({})", i),
            SweepPhase::Done => write!(f, "done"),
            SweepPhase::Failed { iteration } => write!(f, "failed(iteration {})", iteration),
        }
    }
}

/// Cooperative cancellation flag, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How bootstrap seeds the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapPlan {
    /// Build features from `z_init` and draw an initial state sequence.
    pub seed_from_labels: bool,
    /// Parameter draws after the first one.
    pub extra_param_draws: u32,
}

impl BootstrapPlan {
    pub fn from_settings(settings: &SamplerSettings) -> Self {
        Self {
            seed_from_labels: settings.form_z_init,
            extra_param_draws: 1,
        }
    }
}

/// How `run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed { iterations: u64 },
    /// Stopped by the cancel token or the deadline after `iteration`.
    Cancelled { iteration: u64 },
}

pub struct SweepOrchestrator<S> {
    config: Arc<RunConfig>,
    data: Arc<ObservationSet>,
    index: SequenceIndex,
    samplers: S,
    recorder: StatsRecorder,
    phase: SweepPhase,
    state: Option<Arc<SweepState>>,
    rng: StdRng,
    pool: Option<rayon::ThreadPool>,
    cancel: CancelToken,
    deadline: Option<Instant>,
    ctx: LogContext,
}

impl<S: SamplerSuite> SweepOrchestrator<S> {
    pub fn new(
        config: Arc<RunConfig>,
        data: Arc<ObservationSet>,
        samplers: S,
        recorder: StatsRecorder,
    ) -> Result<Self, SweepError> {
        let settings = &config.settings;
        let pool = match settings.num_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("ibp-sweep-{i}"))
                    .build()
                    .map_err(|e| ConfigError::Invalid {
                        field: "num_threads".to_string(),
                        message: e.to_string(),
                    })?,
            ),
            None => None,
        };
        Ok(Self {
            index: SequenceIndex::from_observations(&data),
            rng: StdRng::seed_from_u64(settings.effective_seed()),
            ctx: LogContext::new(generate_run_id(), get_host_id()).with_trial(settings.trial),
            config,
            data,
            samplers,
            recorder,
            phase: SweepPhase::Uninitialized,
            state: None,
            pool,
            cancel: CancelToken::new(),
            deadline: None,
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop `run` after the iteration in progress at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_log_context(mut self, ctx: LogContext) -> Self {
        self.ctx = ctx.with_trial(self.config.settings.trial);
        self
    }

    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    /// Latest completed state. Cheap to clone and never partially updated.
    pub fn state(&self) -> Option<Arc<SweepState>> {
        self.state.clone()
    }

    pub fn samplers(&self) -> &S {
        &self.samplers
    }

    pub fn recorder(&self) -> &StatsRecorder {
        &self.recorder
    }

    pub fn index(&self) -> &SequenceIndex {
        &self.index
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn log_context(&self) -> &LogContext {
        &self.ctx
    }

    fn trial(&self) -> u32 {
        self.config.settings.trial
    }

    /// Flattened true labels and current state sequence.
    pub fn evaluation_arrays(&self) -> Result<EvaluationArrays, ShapeError> {
        let assignment = self
            .state
            .as_deref()
            .and_then(|s| s.model.assignment.as_ref());
        EvaluationArrays::build(&self.data, &self.index, assignment)
    }

    /// Build the iteration-0 state.
    pub fn bootstrap(&mut self) -> Result<(), SweepError> {
        if self.phase != SweepPhase::Uninitialized {
            return Err(SweepError::InvalidPhase {
                operation: "bootstrap",
                phase: self.phase,
            });
        }
        let span = info_span!(
            "bootstrap",
            run_id = %self.ctx.run_id,
            trial = self.trial(),
            stage = %Stage::Bootstrap
        );
        let _enter = span.enter();

        let plan = BootstrapPlan::from_settings(&self.config.settings);
        log_event!(
            self.ctx,
            INFO,
            event_names::BOOTSTRAP_STARTED,
            Stage::Bootstrap,
            "Bootstrapping chain",
            num_objects = self.data.len(),
            total_len = self.index.total_len(),
            seed_from_labels = plan.seed_from_labels
        );
        if self.config.settings.ploton {
            log_event!(
                self.ctx,
                DEBUG,
                event_names::BOOTSTRAP_STARTED,
                Stage::Bootstrap,
                "Plotting is not supported; ploton ignored"
            );
        }

        match self.build_initial_state(plan) {
            Ok(state) => {
                let state = Arc::new(state);
                self.state = Some(Arc::clone(&state));
                let info = RunInfo::new(&self.ctx.run_id, &self.config.model, &self.config.settings);
                let persisted = self
                    .recorder
                    .record_info(info)
                    .and_then(|()| self.recorder.record_initial(&state));
                if let Err(source) = persisted {
                    self.phase = SweepPhase::Failed { iteration: 0 };
                    return Err(SweepError::Persist {
                        trial: self.trial(),
                        iteration: 0,
                        source,
                    });
                }
                self.phase = SweepPhase::Bootstrapped;
                log_event!(
                    self.ctx,
                    INFO,
                    event_names::BOOTSTRAP_FINISHED,
                    Stage::Bootstrap,
                    "Chain bootstrapped",
                    num_states = state.features.num_states(),
                    active_states = state.features.active_states().len()
                );
                Ok(())
            }
            Err(e) => {
                self.phase = SweepPhase::Failed { iteration: 0 };
                log_event!(
                    self.ctx,
                    ERROR,
                    event_names::SWEEP_FAILED,
                    Stage::Bootstrap,
                    "Bootstrap failed",
                    error = tracing::field::display(&e)
                );
                Err(e)
            }
        }
    }

    fn build_initial_state(&mut self, plan: BootstrapPlan) -> Result<SweepState, SweepError> {
        let trial = self.trial();
        let model = &self.config.model;
        let data = &*self.data;
        data.check_model(&model.obs_model)?;

        let hyperparams = Hyperparams::initialize(&model.hmm)?;
        let features = if plan.seed_from_labels {
            let labels: Vec<&[Option<usize>]> = data
                .iter()
                .map(|r| r.z_init.as_deref().unwrap_or(&[]))
                .collect();
            FeatureMatrix::initialize(data.len(), Some(&labels))?
        } else {
            FeatureMatrix::initialize(data.len(), None)?
        };

        let init = self
            .samplers
            .initialize_structs(&features, data)
            .map_err(|source| SweepError::Init { trial, source })?;
        let fail = |step: SweepStep| {
            move |source: SamplerError| SweepError::Sampler {
                trial,
                iteration: 0,
                step,
                source,
            }
        };

        let rng = &mut self.rng;
        let transitions = self
            .samplers
            .sample_transitions(&init.counts, &hyperparams, &features, rng)
            .map_err(fail(SweepStep::Transitions))?;

        let (stats, counts, assignment) = if plan.seed_from_labels {
            let assignment = self
                .samplers
                .sample_initial_states(data, &transitions, &features, rng)
                .map_err(fail(SweepStep::InitialStates))?;
            check_assignment(&self.index, &assignment).map_err(fail(SweepStep::InitialStates))?;
            let stats = self
                .samplers
                .update_sufficient_stats(data, &assignment)
                .map_err(fail(SweepStep::SufficientStats))?;
            (stats, StateCounts::from_assignment(&assignment), Some(assignment))
        } else {
            (init.stats, init.counts, None)
        };

        let mut params = self
            .samplers
            .sample_parameters(&init.params, &stats, rng)
            .map_err(fail(SweepStep::Parameters))?;
        for _ in 0..plan.extra_param_draws {
            params = self
                .samplers
                .sample_parameters(&params, &stats, rng)
                .map_err(fail(SweepStep::Parameters))?;
        }

        Ok(SweepState {
            iteration: 0,
            hyperparams,
            features,
            model: ModelState {
                transitions,
                params,
                stats,
                counts,
                assignment,
            },
        })
    }

    /// Run one Gibbs iteration. Returns its number.
    pub fn step(&mut self) -> Result<u64, SweepError> {
        let (Some(done), Some(prev)) = (self.phase.completed(), self.state.clone()) else {
            return Err(SweepError::InvalidPhase {
                operation: "step",
                phase: self.phase,
            });
        };
        let iteration = done + 1;
        let span = info_span!(
            "sweep",
            run_id = %self.ctx.run_id,
            trial = self.trial(),
            iteration,
            stage = %Stage::Sweep
        );
        let _enter = span.enter();

        let next = match self.iterate(&prev, iteration) {
            Ok(next) => Arc::new(next),
            Err(e) => {
                self.phase = SweepPhase::Failed { iteration };
                log_event!(
                    self.ctx,
                    ERROR,
                    event_names::SWEEP_FAILED,
                    Stage::Sweep,
                    "Iteration failed; keeping previous state",
                    iteration = iteration,
                    error = tracing::field::display(&e)
                );
                if let Err(flush) = self.recorder.flush() {
                    log_event!(
                        self.ctx,
                        WARN,
                        event_names::STATS_FLUSHED,
                        Stage::Persist,
                        "Flush after failure failed",
                        error = tracing::field::display(&flush)
                    );
                }
                return Err(e);
            }
        };

        self.state = Some(Arc::clone(&next));
        self.phase = SweepPhase::Iterating(iteration);
        log_event!(
            self.ctx,
            INFO,
            event_names::SWEEP_ITERATION,
            Stage::Sweep,
            "Iteration complete",
            iteration = iteration,
            active_states = next.features.active_states().len(),
            used_states = next.model.assignment.as_ref().map_or(0, |a| a.num_used_states()),
            gamma = next.hyperparams.gamma
        );

        match self.recorder.record(&next) {
            Ok(saved) => {
                if saved.is_some() {
                    log_event!(
                        self.ctx,
                        INFO,
                        event_names::STATS_SAVED,
                        Stage::Persist,
                        "Statistics persisted",
                        iteration = iteration
                    );
                }
                Ok(iteration)
            }
            Err(source) => {
                self.phase = SweepPhase::Failed { iteration };
                Err(SweepError::Persist {
                    trial: self.trial(),
                    iteration,
                    source,
                })
            }
        }
    }

    fn iterate(&mut self, prev: &SweepState, iteration: u64) -> Result<SweepState, SweepError> {
        let trial = self.trial();
        let fail = |step: SweepStep| {
            move |source: SamplerError| SweepError::Sampler {
                trial,
                iteration,
                step,
                source,
            }
        };
        let data = &*self.data;
        let samplers = &self.samplers;
        let num_objects = data.len();

        // (a) transitions given the previous counts
        let transitions = samplers
            .sample_transitions(&prev.model.counts, &prev.hyperparams, &prev.features, &mut self.rng)
            .map_err(fail(SweepStep::Transitions))?;
        if transitions.objects.len() != num_objects {
            return Err(fail(SweepStep::Transitions)(
                ShapeError::ObjectCount {
                    field: "transitions".to_string(),
                    expected: num_objects,
                    actual: transitions.objects.len(),
                }
                .into(),
            ));
        }

        // (b) state sequences, one independent RNG per object
        let seeds: Vec<u64> = (0..num_objects).map(|_| self.rng.random()).collect();
        let params = &prev.model.params;
        let features = &prev.features;
        let objects = &transitions.objects;
        let draw = || {
            data.objects
                .par_iter()
                .zip(seeds.par_iter())
                .enumerate()
                .map(|(object, (record, &seed))| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    samplers.sample_object_states(
                        object,
                        record,
                        &objects[object],
                        params,
                        features,
                        &mut rng,
                    )
                })
                .collect::<Result<Vec<_>, SamplerError>>()
        };
        let sequences = match &self.pool {
            Some(pool) => pool.install(draw),
            None => draw(),
        }
        .map_err(fail(SweepStep::StateSequences))?;
        let assignment = StateAssignment::from_sequences(sequences, features.num_states())
            .map_err(fail(SweepStep::StateSequences))?;
        check_assignment(&self.index, &assignment).map_err(fail(SweepStep::StateSequences))?;
        let counts = StateCounts::from_assignment(&assignment);

        // (c) sufficient statistics
        let stats = samplers
            .update_sufficient_stats(data, &assignment)
            .map_err(fail(SweepStep::SufficientStats))?;

        // (d) parameters
        let params = samplers
            .sample_parameters(params, &stats, &mut self.rng)
            .map_err(fail(SweepStep::Parameters))?;

        // (e) hyperparameters and features
        let (hyperparams, features) = if self.config.settings.resample_hyperparams {
            let hyperparams = samplers
                .resample_hyperparams(&prev.hyperparams, features, &counts, &mut self.rng)
                .map_err(fail(SweepStep::Hyperparams))?;
            let next = samplers
                .resample_features(features, &assignment, &mut self.rng)
                .map_err(fail(SweepStep::Features))?;
            if next.num_objects() != num_objects {
                return Err(fail(SweepStep::Features)(
                    ShapeError::ObjectCount {
                        field: "features".to_string(),
                        expected: num_objects,
                        actual: next.num_objects(),
                    }
                    .into(),
                ));
            }
            (hyperparams, next)
        } else {
            (prev.hyperparams, features.clone())
        };

        Ok(SweepState {
            iteration,
            hyperparams,
            features,
            model: ModelState {
                transitions,
                params,
                stats,
                counts,
                assignment: Some(assignment),
            },
        })
    }

    /// Bootstrap if needed, then iterate up to `n_iter`.
    pub fn run(&mut self) -> Result<SweepOutcome, SweepError> {
        if self.phase == SweepPhase::Uninitialized {
            self.bootstrap()?;
        }
        let n_iter = self.config.settings.n_iter;
        loop {
            let Some(done) = self.phase.completed() else {
                return Err(SweepError::InvalidPhase {
                    operation: "run",
                    phase: self.phase,
                });
            };
            if done >= n_iter {
                break;
            }
            if self.should_stop() {
                log_event!(
                    self.ctx,
                    WARN,
                    event_names::SWEEP_CANCELLED,
                    Stage::Sweep,
                    "Sweep cancelled between iterations",
                    iteration = done
                );
                self.recorder.finish().map_err(|source| SweepError::Persist {
                    trial: self.trial(),
                    iteration: done,
                    source,
                })?;
                return Ok(SweepOutcome::Cancelled { iteration: done });
            }
            self.step()?;
        }
        self.finish()?;
        Ok(SweepOutcome::Completed { iterations: n_iter })
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Flush statistics and close the trial.
    pub fn finish(&mut self) -> Result<(), SweepError> {
        let Some(done) = self.phase.completed() else {
            return Err(SweepError::InvalidPhase {
                operation: "finish",
                phase: self.phase,
            });
        };
        self.recorder.finish().map_err(|source| SweepError::Persist {
            trial: self.trial(),
            iteration: done,
            source,
        })?;
        self.phase = SweepPhase::Done;
        log_event!(
            self.ctx,
            INFO,
            event_names::SWEEP_FINISHED,
            Stage::Sweep,
            "Sweep finished",
            iterations = done,
            saved = self.recorder.saved_iterations().len()
        );
        Ok(())
    }

    /// Resume from a persisted checkpoint instead of bootstrapping.
    ///
    /// The snapshot must carry features, transitions, params and state
    /// sequences, and its params must fit the configured observation model.
    /// Sufficient statistics and counts are recomputed.
    pub fn restore(&mut self, snapshot: &StatsSnapshot) -> Result<(), SweepError> {
        if self.phase != SweepPhase::Uninitialized {
            return Err(SweepError::InvalidPhase {
                operation: "restore",
                phase: self.phase,
            });
        }
        let trial = self.trial();
        if snapshot.trial != trial {
            return Err(ConfigError::Invalid {
                field: "snapshot.trial".to_string(),
                message: format!("snapshot is for trial {}, run is trial {}", snapshot.trial, trial),
            }
            .into());
        }
        let (Some(features), Some(transitions), Some(params), Some(sequences)) = (
            &snapshot.features,
            &snapshot.transitions,
            &snapshot.params,
            &snapshot.state_sequences,
        ) else {
            return Err(ConfigError::Invalid {
                field: "snapshot".to_string(),
                message: "missing features, transitions, params or state sequences".to_string(),
            }
            .into());
        };
        self.data.check_model(&self.config.model.obs_model)?;
        self.samplers
            .check_parameters(params, features.num_states())?;
        if features.num_objects() != self.data.len() {
            return Err(ConfigError::ObjectCountMismatch {
                expected: self.data.len(),
                actual: features.num_objects(),
            }
            .into());
        }
        if transitions.objects.len() != self.data.len() {
            return Err(ShapeError::ObjectCount {
                field: "transitions".to_string(),
                expected: self.data.len(),
                actual: transitions.objects.len(),
            }
            .into());
        }
        self.index.flatten::<usize, _>("state_sequences", sequences)?;

        let assignment = StateAssignment::from_sequences(sequences.clone(), features.num_states())
            .map_err(|source| SweepError::Init { trial, source })?;
        if !assignment.respects(features) {
            return Err(ConfigError::Invalid {
                field: "snapshot.state_sequences".to_string(),
                message: "a label lies outside its object's feature row".to_string(),
            }
            .into());
        }
        let stats = self
            .samplers
            .update_sufficient_stats(&self.data, &assignment)
            .map_err(|source| SweepError::Init { trial, source })?;

        let iteration = snapshot.iteration;
        self.state = Some(Arc::new(SweepState {
            iteration,
            hyperparams: snapshot.hyperparams,
            features: features.clone(),
            model: ModelState {
                transitions: transitions.clone(),
                params: params.clone(),
                stats,
                counts: StateCounts::from_assignment(&assignment),
                assignment: Some(assignment),
            },
        }));
        self.rng = StdRng::seed_from_u64(
            self.config
                .settings
                .effective_seed()
                .wrapping_add(iteration),
        );
        self.recorder.resume_at(iteration);
        self.phase = if iteration == 0 {
            SweepPhase::Bootstrapped
        } else {
            SweepPhase::Iterating(iteration)
        };
        log_event!(
            self.ctx,
            INFO,
            event_names::SWEEP_RESTORED,
            Stage::Init,
            "Restored from checkpoint",
            iteration = iteration
        );
        Ok(())
    }
}

/// Sampled sequences must cover each object exactly.
fn check_assignment(index: &SequenceIndex, assignment: &StateAssignment) -> Result<(), SamplerError> {
    index.flatten::<usize, _>("z", &assignment.sequences)?;
    Ok(())
}

impl<S> std::fmt::Debug for SweepOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepOrchestrator")
            .field("trial", &self.config.settings.trial)
            .field("phase", &self.phase)
            .field("num_objects", &self.data.len())
            .finish()
    }
}
