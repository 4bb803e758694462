//! Error taxonomy for the sweep.
//!
//! Every error that escapes the orchestrator carries the trial and, for
//! sampling failures, the iteration and the step that failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::exit_codes::ExitCode;
use crate::sweep::SweepPhase;

/// Per-object arrays whose lengths disagree with the sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("object {object}: {field} has length {actual}, expected {expected}")]
    LengthMismatch {
        object: usize,
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("object {object}: {field} is missing while other objects provide it")]
    MissingField { object: usize, field: String },

    #[error("{field}: got {actual} per-object entries, expected {expected}")]
    ObjectCount {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("{field}: flattened length {actual}, expected {expected}")]
    TotalLength {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("object {object}, t={t}: observation has dimension {actual}, expected {expected}")]
    Dimension {
        object: usize,
        t: usize,
        expected: usize,
        actual: usize,
    },

    #[error("object {object}, t={t}: symbol {symbol} outside alphabet of size {num_symbols}")]
    Symbol {
        object: usize,
        t: usize,
        symbol: usize,
        num_symbols: usize,
    },

    #[error("object {object}: expected {expected} observations")]
    Kind { object: usize, expected: &'static str },

    #[error("emission parameters: {detail}")]
    Params { detail: String },
}

/// Failure inside a sampling collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    #[error("degenerate {what}: {detail}")]
    Degenerate { what: &'static str, detail: String },

    #[error("object {object}: no allowed state has positive probability at t={t}")]
    DeadEnd { object: usize, t: usize },

    #[error("state {state} outside the {num_states} known states (object {object})")]
    UnknownState {
        object: usize,
        state: usize,
        num_states: usize,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("{0}")]
    Failed(String),
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("integrity check failed for {path}: payload SHA-256 mismatch")]
    Integrity { path: PathBuf },

    #[error("incompatible schema version at {path}: {actual} (expected {expected})")]
    SchemaVersion {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("background writer: {0}")]
    Worker(String),
}

/// Steps of the bootstrap and of one Gibbs iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStep {
    InitializeStructs,
    Transitions,
    InitialStates,
    StateSequences,
    SufficientStats,
    Parameters,
    Hyperparams,
    Features,
}

impl std::fmt::Display for SweepStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SweepStep::InitializeStructs => "initialize_structs",
            SweepStep::Transitions => "transitions",
            SweepStep::InitialStates => "initial_states",
            SweepStep::StateSequences => "state_sequences",
            SweepStep::SufficientStats => "sufficient_stats",
            SweepStep::Parameters => "parameters",
            SweepStep::Hyperparams => "hyperparams",
            SweepStep::Features => "features",
        };
        write!(f, "{}", s)
    }
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("trial {trial}: building initial structures failed: {source}")]
    Init {
        trial: u32,
        #[source]
        source: SamplerError,
    },

    #[error("trial {trial}, iteration {iteration}, step {step}: {source}")]
    Sampler {
        trial: u32,
        iteration: u64,
        step: SweepStep,
        #[source]
        source: SamplerError,
    },

    #[error("trial {trial}, iteration {iteration}: persisting statistics failed: {source}")]
    Persist {
        trial: u32,
        iteration: u64,
        #[source]
        source: StatsError,
    },

    #[error("cannot {operation} in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SweepPhase,
    },
}

impl SweepError {
    /// Iteration the error is attached to (0 = bootstrap).
    pub fn iteration(&self) -> Option<u64> {
        match self {
            SweepError::Sampler { iteration, .. } | SweepError::Persist { iteration, .. } => {
                Some(*iteration)
            }
            SweepError::Init { .. } => Some(0),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            SweepError::Config(_) => ExitCode::ConfigError,
            SweepError::Shape(_) => ExitCode::DataError,
            SweepError::Init { .. } => ExitCode::InitError,
            SweepError::Sampler { .. } => ExitCode::SamplerError,
            SweepError::Persist {
                source: StatsError::SchemaVersion { .. } | StatsError::Integrity { .. },
                ..
            } => ExitCode::VersionError,
            SweepError::Persist { .. } => ExitCode::IoError,
            SweepError::InvalidPhase { .. } => ExitCode::InternalError,
        }
    }
}
