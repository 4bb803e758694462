//! Model state carried from one sweep step to the next.
//!
//! Every value here is immutable once built. An iteration produces a new
//! [`SweepState`] and the orchestrator swaps it in whole.

use serde::{Deserialize, Serialize};

use crate::error::SamplerError;
use crate::features::FeatureMatrix;
use crate::hyperparams::Hyperparams;

/// One object's transition model over the global state space.
///
/// Entries for states the object may not use are exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransitions {
    /// Distribution of the first state.
    pub initial: Vec<f64>,
    /// `rows[j][k]` = P(next = k | current = j).
    pub rows: Vec<Vec<f64>>,
}

impl ObjectTransitions {
    pub fn num_states(&self) -> usize {
        self.initial.len()
    }
}

/// Transition models of all objects, in object order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDists {
    pub objects: Vec<ObjectTransitions>,
}

/// Per-object initial-state and transition counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCounts {
    pub num_states: usize,
    /// `initial[i][k]`: 1 if object `i` starts in `k`.
    pub initial: Vec<Vec<usize>>,
    /// `transitions[i][j][k]`: number of `j -> k` moves in object `i`.
    pub transitions: Vec<Vec<Vec<usize>>>,
}

impl StateCounts {
    /// All-zero counts (no state sequence yet).
    pub fn empty(num_objects: usize, num_states: usize) -> Self {
        Self {
            num_states,
            initial: vec![vec![0; num_states]; num_objects],
            transitions: vec![vec![vec![0; num_states]; num_states]; num_objects],
        }
    }

    pub fn from_assignment(assignment: &StateAssignment) -> Self {
        let mut counts = Self::empty(assignment.sequences.len(), assignment.num_states);
        for (i, seq) in assignment.sequences.iter().enumerate() {
            if let Some(&first) = seq.first() {
                counts.initial[i][first] += 1;
            }
            for pair in seq.windows(2) {
                counts.transitions[i][pair[0]][pair[1]] += 1;
            }
        }
        counts
    }

    pub fn num_objects(&self) -> usize {
        self.initial.len()
    }

    /// Zero for states beyond the counted range.
    pub fn initial_count(&self, object: usize, state: usize) -> usize {
        self.initial
            .get(object)
            .and_then(|r| r.get(state))
            .copied()
            .unwrap_or(0)
    }

    /// Zero for states beyond the counted range.
    pub fn transition_count(&self, object: usize, from: usize, to: usize) -> usize {
        self.transitions
            .get(object)
            .and_then(|m| m.get(from))
            .and_then(|r| r.get(to))
            .copied()
            .unwrap_or(0)
    }
}

/// Sampled state of every timestep, plus the inverse map.
#[derive(Debug, Clone, PartialEq)]
pub struct StateAssignment {
    pub num_states: usize,
    /// `sequences[i][t]`: state of object `i` at time `t`.
    pub sequences: Vec<Vec<usize>>,
    /// `index_map[k]`: every `(object, t)` assigned to state `k`.
    pub index_map: Vec<Vec<(usize, usize)>>,
}

impl StateAssignment {
    pub fn from_sequences(
        sequences: Vec<Vec<usize>>,
        num_states: usize,
    ) -> Result<Self, SamplerError> {
        let mut index_map = vec![Vec::new(); num_states];
        for (object, seq) in sequences.iter().enumerate() {
            for (t, &state) in seq.iter().enumerate() {
                let slot = index_map
                    .get_mut(state)
                    .ok_or(SamplerError::UnknownState {
                        object,
                        state,
                        num_states,
                    })?;
                slot.push((object, t));
            }
        }
        Ok(Self {
            num_states,
            sequences,
            index_map,
        })
    }

    /// Timesteps spent in each state.
    pub fn occupancy(&self) -> Vec<usize> {
        self.index_map.iter().map(Vec::len).collect()
    }

    /// Number of states with at least one timestep.
    pub fn num_used_states(&self) -> usize {
        self.index_map.iter().filter(|v| !v.is_empty()).count()
    }

    /// Every label falls in its object's allowed set.
    pub fn respects(&self, features: &FeatureMatrix) -> bool {
        self.sequences
            .iter()
            .enumerate()
            .all(|(i, seq)| seq.iter().all(|&k| features.is_allowed(i, k)))
    }
}

/// Accumulators of one scalar regression `y = a·x + e`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionStats {
    pub n: f64,
    pub sxx: f64,
    pub sxy: f64,
    pub syy: f64,
}

impl RegressionStats {
    pub fn add(&mut self, x: f64, y: f64) {
        self.n += 1.0;
        self.sxx += x * x;
        self.sxy += x * y;
        self.syy += y * y;
    }
}

/// Sufficient statistics per state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum SufficientStats {
    /// `[state][dim]` regression accumulators.
    Regression(Vec<Vec<RegressionStats>>),
    /// `[state][symbol]` emission counts.
    Multinomial(Vec<Vec<f64>>),
}

impl SufficientStats {
    pub fn num_states(&self) -> usize {
        match self {
            SufficientStats::Regression(s) => s.len(),
            SufficientStats::Multinomial(s) => s.len(),
        }
    }
}

/// Emission / dynamics parameters per state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmissionParams {
    /// `[state][dim]` coefficient and noise variance.
    Regression {
        coef: Vec<Vec<f64>>,
        noise_var: Vec<Vec<f64>>,
    },
    /// `[state][symbol]` emission probabilities.
    Multinomial { probs: Vec<Vec<f64>> },
}

impl EmissionParams {
    pub fn num_states(&self) -> usize {
        match self {
            EmissionParams::Regression { coef, .. } => coef.len(),
            EmissionParams::Multinomial { probs } => probs.len(),
        }
    }
}

/// Transition, emission and assignment state of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub transitions: TransitionDists,
    pub params: EmissionParams,
    pub stats: SufficientStats,
    pub counts: StateCounts,
    /// `None` until a state sequence has been sampled.
    pub assignment: Option<StateAssignment>,
}

/// Complete chain state after a finished iteration (0 = bootstrap).
#[derive(Debug, Clone, PartialEq)]
pub struct SweepState {
    pub iteration: u64,
    pub hyperparams: Hyperparams,
    pub features: FeatureMatrix,
    pub model: ModelState,
}
