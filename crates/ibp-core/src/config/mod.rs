//! Run configuration: model priors plus sampler settings.
//!
//! Handles:
//! - Locating model.json and settings.json|toml (CLI > env > XDG > defaults)
//! - Semantic validation through `ibp_config::validate`
//! - CLI overrides for the common settings
//! - Content hashes so persisted statistics can be traced to their config

pub use ibp_config::validate::ValidationError;
pub use ibp_config::{
    HmmHyperPriors, ModelConfig, ObsModelConfig, SamplerSettings, StatsSelection,
};

use ibp_config::resolve::{default_save_dir, resolve_config, ConfigSource};
use ibp_config::validate::{validate_model, validate_settings};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised before any sampling starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration invalid: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no sampler settings found (pass --settings or --iterations)")]
    MissingSettings,

    #[error("invalid prior {name}: must be positive and finite, got {value}")]
    InvalidPrior { name: &'static str, value: f64 },

    #[error("object {object} has no allowed states")]
    EmptyFeatureRow { object: usize },

    #[error("{what} is not supported")]
    Unsupported { what: String },

    #[error("expected {expected} objects, got {actual}")]
    ObjectCountMismatch { expected: usize, actual: usize },

    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Immutable configuration handed to the orchestrator at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: ModelConfig,
    pub settings: SamplerSettings,
}

impl RunConfig {
    /// Validate both halves and bundle them.
    pub fn new(model: ModelConfig, settings: SamplerSettings) -> Result<Self, ConfigError> {
        validate_model(&model)?;
        validate_settings(&settings)?;
        Ok(Self { model, settings })
    }

    /// Directory for persisted statistics.
    pub fn save_dir(&self) -> PathBuf {
        self.settings
            .save_dir
            .clone()
            .unwrap_or_else(default_save_dir)
    }
}

/// Configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub run: RunConfig,
    /// Path to the model file (None if using defaults).
    pub model_path: Option<PathBuf>,
    pub model_source: ConfigSource,
    /// SHA-256 of the model file content (None if using defaults).
    pub model_hash: Option<String>,
    pub settings_path: Option<PathBuf>,
    pub settings_source: ConfigSource,
    pub settings_hash: Option<String>,
}

impl ResolvedConfig {
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            model_path: self.model_path.clone(),
            model_hash: self.model_hash.clone(),
            settings_path: self.settings_path.clone(),
            settings_hash: self.settings_hash.clone(),
            obs_model: self.run.model.obs_model.name().to_string(),
        }
    }
}

/// Config provenance recorded next to persisted statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub model_path: Option<PathBuf>,
    pub model_hash: Option<String>,
    pub settings_path: Option<PathBuf>,
    pub settings_hash: Option<String>,
    pub obs_model: String,
}

/// Configuration resolution options (CLI flags).
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    pub model_path: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub trial: Option<u32>,
    pub n_iter: Option<u64>,
    pub save_min: Option<u64>,
    pub save_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub num_threads: Option<usize>,
}

/// Load configuration with the standard resolution order, apply CLI
/// overrides, then validate.
///
/// Without a settings file, `n_iter` must come from the options.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let paths = resolve_config(
        options.model_path.as_deref(),
        options.settings_path.as_deref(),
    );

    // An explicit path that does not exist is an error, not a fallback.
    for explicit in [&options.model_path, &options.settings_path]
        .into_iter()
        .flatten()
    {
        if !explicit.exists() {
            return Err(ConfigError::Io {
                path: explicit.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
    }

    let (model, model_hash) = match &paths.model {
        Some(path) => {
            let hash = hash_file(path)?;
            (ModelConfig::from_file(path)?, Some(hash))
        }
        None => (ModelConfig::default(), None),
    };

    let (mut settings, settings_hash) = match &paths.settings {
        Some(path) => {
            let hash = hash_file(path)?;
            (SamplerSettings::from_file(path)?, Some(hash))
        }
        None => match options.n_iter {
            Some(n) => (SamplerSettings::with_iterations(n), None),
            None => return Err(ConfigError::MissingSettings),
        },
    };

    apply_overrides(&mut settings, options);

    Ok(ResolvedConfig {
        run: RunConfig::new(model, settings)?,
        model_path: paths.model,
        model_source: paths.model_source,
        model_hash,
        settings_path: paths.settings,
        settings_source: paths.settings_source,
        settings_hash,
    })
}

fn apply_overrides(settings: &mut SamplerSettings, options: &ConfigOptions) {
    if let Some(trial) = options.trial {
        settings.trial = trial;
    }
    if let Some(n) = options.n_iter {
        settings.n_iter = n;
    }
    if let Some(save_min) = options.save_min {
        settings.save_min = save_min;
    }
    if let Some(dir) = &options.save_dir {
        settings.save_dir = Some(dir.clone());
    }
    if let Some(seed) = options.seed {
        settings.seed = Some(seed);
    }
    if let Some(threads) = options.num_threads {
        settings.num_threads = Some(threads);
    }
}

fn hash_file(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(hex::encode(Sha256::digest(&content)))
}
