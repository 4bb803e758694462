//! Sampler run settings (settings.json / settings.toml).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::validate::ValidationError;

/// Settings for one trial of the Gibbs sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Trial number; identifies persisted statistics.
    #[serde(default)]
    pub trial: u32,

    /// Number of Gibbs sweeps.
    #[serde(alias = "Niter")]
    pub n_iter: u64,

    /// Persist statistics every `save_min` iterations (the final one is always saved).
    #[serde(default = "default_save_min", alias = "saveMin")]
    pub save_min: u64,

    /// Directory for persisted statistics. Falls back to the XDG data dir.
    #[serde(default, alias = "saveDir")]
    pub save_dir: Option<PathBuf>,

    /// Diagnostic plotting. Accepted for compatibility; no plots are produced.
    #[serde(default)]
    pub ploton: bool,

    /// Seed the feature matrix and initial state sequence from per-object `z_init`.
    #[serde(default, alias = "formZinit")]
    pub form_z_init: bool,

    /// RNG seed. When unset, the seed is derived from the trial number.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Resample concentration hyperparameters after each parameter draw.
    #[serde(default)]
    pub resample_hyperparams: bool,

    /// Worker threads for per-object state-sequence sampling.
    #[serde(default)]
    pub num_threads: Option<usize>,

    /// Hand persistence to a background writer thread.
    #[serde(default)]
    pub background_persist: bool,

    /// Which parts of the model state go into each persisted snapshot.
    #[serde(default)]
    pub record: StatsSelection,
}

fn default_save_min() -> u64 {
    1
}

/// Subset of the model state written into each persisted snapshot.
///
/// Hyperparameters and per-iteration summaries are always written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSelection {
    #[serde(default = "enabled")]
    pub features: bool,
    #[serde(default = "enabled")]
    pub transitions: bool,
    #[serde(default = "enabled")]
    pub params: bool,
    #[serde(default = "enabled")]
    pub state_sequences: bool,
}

fn enabled() -> bool {
    true
}

impl Default for StatsSelection {
    fn default() -> Self {
        Self {
            features: true,
            transitions: true,
            params: true,
            state_sequences: true,
        }
    }
}

impl StatsSelection {
    /// True when a snapshot carries enough state to restart the chain from it.
    pub fn is_full(&self) -> bool {
        self.features && self.transitions && self.params && self.state_sequences
    }

    /// Record only hyperparameters and summaries.
    pub fn summaries_only() -> Self {
        Self {
            features: false,
            transitions: false,
            params: false,
            state_sequences: false,
        }
    }
}

impl SamplerSettings {
    /// Settings for `n_iter` sweeps with every other option at its default.
    pub fn with_iterations(n_iter: u64) -> Self {
        Self {
            trial: 0,
            n_iter,
            save_min: default_save_min(),
            save_dir: None,
            ploton: false,
            form_z_init: false,
            seed: None,
            resample_hyperparams: false,
            num_threads: None,
            background_persist: false,
            record: StatsSelection::default(),
        }
    }

    /// Effective RNG seed.
    pub fn effective_seed(&self) -> u64 {
        self.seed
            .unwrap_or_else(|| 0x1b9_4e55_u64.wrapping_mul(u64::from(self.trial) + 1))
    }

    /// Load settings from a JSON or TOML file (chosen by extension).
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Parse settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Parse settings from TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ValidationError> {
        toml::from_str(text)
            .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))
    }
}
