//! IBP-HMM configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for model.json (HMM hyperpriors + observation model)
//! - Typed sampler settings (settings.json / settings.toml)
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation

pub mod priors;
pub mod resolve;
pub mod settings;
pub mod validate;

pub use priors::{HmmHyperPriors, ModelConfig, MultinomialPriors, ObsModelConfig, RegressionPriors};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use settings::{SamplerSettings, StatsSelection};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
