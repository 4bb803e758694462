//! Running statistics and their persistence.
//!
//! The recorder sees each finished [`SweepState`] exactly once, buffers a
//! small summary per iteration, and at checkpoint iterations hands a
//! [`StatsSnapshot`] to a [`SnapshotStore`].

mod background;
mod file;
mod memory;

pub use background::BackgroundStore;
pub use file::{ArtifactEnvelope, FileStore, SnapshotEntry, STATS_SCHEMA_VERSION};
pub use memory::{MemoryStore, MemoryStoreContents};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::{ModelConfig, SamplerSettings, StatsSelection};
use crate::error::StatsError;
use crate::features::FeatureMatrix;
use crate::logging::event_names;
use crate::hyperparams::Hyperparams;
use crate::model::{EmissionParams, SweepState, TransitionDists};

/// Whether iteration `iteration` (1-based) is a checkpoint.
///
/// `save_min` must be positive; configuration validation guarantees it.
pub fn should_save(iteration: u64, save_min: u64, n_iter: u64) -> bool {
    iteration == n_iter || (save_min > 0 && iteration % save_min == 0)
}

/// Per-iteration summary kept between checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: u64,
    /// States allowed for at least one object.
    pub active_states: usize,
    /// States with at least one assigned timestep.
    pub used_states: usize,
    /// Timesteps per state.
    pub state_usage: Vec<usize>,
    pub num_objects: usize,
    /// Wall time since the previous recorded iteration.
    pub elapsed_ms: u64,
    pub hyperparams: Hyperparams,
}

impl IterationSummary {
    pub fn from_state(state: &SweepState, elapsed_ms: u64) -> Self {
        let (used_states, state_usage) = match &state.model.assignment {
            Some(a) => (a.num_used_states(), a.occupancy()),
            None => (0, Vec::new()),
        };
        Self {
            iteration: state.iteration,
            active_states: state.features.active_states().len(),
            used_states,
            state_usage,
            num_objects: state.features.num_objects(),
            elapsed_ms,
            hyperparams: state.hyperparams,
        }
    }
}

/// What a checkpoint persists for one (trial, iteration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub trial: u32,
    pub iteration: u64,
    pub num_objects: usize,
    pub hyperparams: Hyperparams,
    /// Summaries of every iteration since the previous checkpoint.
    pub summaries: Vec<IterationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<TransitionDists>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<EmissionParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_sequences: Option<Vec<Vec<usize>>>,
}

impl StatsSnapshot {
    pub fn from_state(
        trial: u32,
        state: &SweepState,
        summaries: Vec<IterationSummary>,
        selection: StatsSelection,
    ) -> Self {
        Self {
            trial,
            iteration: state.iteration,
            num_objects: state.features.num_objects(),
            hyperparams: state.hyperparams,
            summaries,
            features: selection.features.then(|| state.features.clone()),
            transitions: selection
                .transitions
                .then(|| state.model.transitions.clone()),
            params: selection.params.then(|| state.model.params.clone()),
            state_sequences: if selection.state_sequences {
                state.model.assignment.as_ref().map(|a| a.sequences.clone())
            } else {
                None
            },
        }
    }

    /// Carries features, transitions, params and state sequences.
    pub fn is_restorable(&self) -> bool {
        self.features.is_some()
            && self.transitions.is_some()
            && self.params.is_some()
            && self.state_sequences.is_some()
    }
}

/// Model state right after bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialStats {
    pub trial: u32,
    pub num_states: usize,
    pub hyperparams: Hyperparams,
    pub transitions: TransitionDists,
    pub params: EmissionParams,
}

impl InitialStats {
    pub fn from_state(trial: u32, state: &SweepState) -> Self {
        Self {
            trial,
            num_states: state.features.num_states(),
            hyperparams: state.hyperparams,
            transitions: state.model.transitions.clone(),
            params: state.model.params.clone(),
        }
    }
}

/// Configuration a trial ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub trial: u32,
    pub run_id: String,
    pub started_at: String,
    pub model: ModelConfig,
    pub settings: SamplerSettings,
}

impl RunInfo {
    pub fn new(run_id: &str, model: &ModelConfig, settings: &SamplerSettings) -> Self {
        Self {
            trial: settings.trial,
            run_id: run_id.to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            model: model.clone(),
            settings: settings.clone(),
        }
    }
}

/// Destination of persisted statistics.
///
/// Writes are keyed by (trial, iteration); writing the same key again
/// replaces the earlier value.
pub trait SnapshotStore: Send {
    fn save_info(&mut self, info: RunInfo) -> Result<(), StatsError>;

    fn save_initial(&mut self, initial: InitialStats) -> Result<(), StatsError>;

    fn save(&mut self, snapshot: StatsSnapshot) -> Result<(), StatsError>;

    /// Block until every accepted write is durable.
    fn flush(&mut self) -> Result<(), StatsError> {
        Ok(())
    }
}

/// Decides what to persist and when.
pub struct StatsRecorder {
    trial: u32,
    save_min: u64,
    n_iter: u64,
    selection: StatsSelection,
    store: Box<dyn SnapshotStore>,
    pending: Vec<IterationSummary>,
    last_state: Option<Arc<SweepState>>,
    last_saved: Option<u64>,
    saved: Vec<u64>,
    tick: Instant,
}

impl StatsRecorder {
    pub fn new(settings: &SamplerSettings, store: Box<dyn SnapshotStore>) -> Self {
        Self {
            trial: settings.trial,
            save_min: settings.save_min,
            n_iter: settings.n_iter,
            selection: settings.record,
            store,
            pending: Vec::new(),
            last_state: None,
            last_saved: None,
            saved: Vec::new(),
            tick: Instant::now(),
        }
    }

    pub fn trial(&self) -> u32 {
        self.trial
    }

    /// Iterations persisted so far, in order.
    pub fn saved_iterations(&self) -> &[u64] {
        &self.saved
    }

    pub fn record_info(&mut self, info: RunInfo) -> Result<(), StatsError> {
        self.store.save_info(info)
    }

    /// Persist the bootstrap state.
    pub fn record_initial(&mut self, state: &SweepState) -> Result<(), StatsError> {
        self.tick = Instant::now();
        self.store
            .save_initial(InitialStats::from_state(self.trial, state))
    }

    /// Account for a finished iteration.
    ///
    /// Returns the iteration number when it was persisted.
    pub fn record(&mut self, state: &Arc<SweepState>) -> Result<Option<u64>, StatsError> {
        let elapsed_ms = self.tick.elapsed().as_millis() as u64;
        self.tick = Instant::now();
        self.pending
            .push(IterationSummary::from_state(state, elapsed_ms));
        self.last_state = Some(Arc::clone(state));

        if !should_save(state.iteration, self.save_min, self.n_iter) {
            return Ok(None);
        }
        self.persist(state).map(Some)
    }

    /// Continue after a restart from `iteration`, which is already persisted.
    pub fn resume_at(&mut self, iteration: u64) {
        self.pending.clear();
        self.last_state = None;
        self.last_saved = Some(iteration);
        self.tick = Instant::now();
    }

    /// Persist the last recorded iteration if it is not yet saved, then flush.
    pub fn finish(&mut self) -> Result<(), StatsError> {
        if let Some(state) = self.last_state.clone() {
            if self.last_saved != Some(state.iteration) {
                self.persist(&state)?;
            }
        }
        self.store.flush()
    }

    /// Flush the store without writing anything new.
    pub fn flush(&mut self) -> Result<(), StatsError> {
        self.store.flush()
    }

    fn persist(&mut self, state: &SweepState) -> Result<u64, StatsError> {
        // Summaries stay buffered until a save succeeds.
        let snapshot =
            StatsSnapshot::from_state(self.trial, state, self.pending.clone(), self.selection);
        self.store.save(snapshot)?;
        self.pending.clear();
        self.last_saved = Some(state.iteration);
        self.saved.push(state.iteration);
        debug!(
            target: event_names::STATS_SAVED,
            trial = self.trial,
            iteration = state.iteration,
            "Persisted statistics"
        );
        Ok(state.iteration)
    }
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder")
            .field("trial", &self.trial)
            .field("save_min", &self.save_min)
            .field("n_iter", &self.n_iter)
            .field("pending", &self.pending.len())
            .field("last_saved", &self.last_saved)
            .finish()
    }
}
