//! IBP-HMM Gibbs sampler core library
//!
//! This library drives a Gibbs sampler for a beta-process (IBP) hidden
//! Markov model over a collection of observed sequences:
//! - Configuration loading and validation
//! - Sequence bookkeeping and evaluation arrays
//! - The sweep orchestrator and its sampling collaborators
//! - Persisted running statistics
//! - Structured logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod data;
pub mod emission;
pub mod error;
pub mod exit_codes;
pub mod features;
pub mod hyperparams;
pub mod logging;
pub mod model;
pub mod samplers;
pub mod sequence;
pub mod stats;
pub mod sweep;

pub use config::{ConfigError, RunConfig};
pub use data::{ObjectRecord, ObservationSet, Observations};
pub use error::{SamplerError, ShapeError, StatsError, SweepError, SweepStep};
pub use features::FeatureMatrix;
pub use hyperparams::Hyperparams;
pub use model::{ModelState, StateAssignment, SweepState};
pub use samplers::{ConjugateSamplers, SamplerSuite};
pub use sequence::{EvaluationArrays, SequenceIndex};
pub use stats::{StatsRecorder, StatsSnapshot};
pub use sweep::{CancelToken, SweepOrchestrator, SweepOutcome, SweepPhase};
