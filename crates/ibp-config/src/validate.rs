//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::priors::{HmmHyperPriors, ModelConfig, ObsModelConfig, RegressionPriors};
use crate::settings::SamplerSettings;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Schema validation failed: {0}")]
    SchemaError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SchemaError(_) => 62,
            ValidationError::SemanticError(_) => 63,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }

    /// Dotted path of the offending field, when the error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidValue { field, .. } => Some(field),
            ValidationError::MissingField(field) => Some(field),
            _ => None,
        }
    }
}

/// Validate a model configuration semantically.
///
/// Does not reject `slds`; whether an observation model is supported is
/// decided when the sampler is built.
pub fn validate_model(model: &ModelConfig) -> ValidationResult<()> {
    if model.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: model.schema_version.clone(),
        });
    }

    validate_hyperpriors(&model.hmm)?;

    match &model.obs_model {
        ObsModelConfig::Gaussian(p) => validate_regression("obs_model", p)?,
        ObsModelConfig::AutoRegressive(p) => validate_regression("obs_model", p)?,
        ObsModelConfig::Multinomial(p) => {
            if p.num_symbols == 0 {
                return Err(ValidationError::InvalidValue {
                    field: "obs_model.num_symbols".to_string(),
                    message: "Must be at least 1".to_string(),
                });
            }
            validate_positive("obs_model.concentration", p.concentration)?;
        }
        ObsModelConfig::Slds => {}
    }

    Ok(())
}

fn validate_hyperpriors(hmm: &HmmHyperPriors) -> ValidationResult<()> {
    validate_positive("hmm.a_alpha", hmm.a_alpha)?;
    validate_positive("hmm.b_alpha", hmm.b_alpha)?;
    validate_positive("hmm.a_kappa", hmm.a_kappa)?;
    validate_positive("hmm.b_kappa", hmm.b_kappa)?;
    validate_positive("hmm.a_gamma", hmm.a_gamma)?;
    validate_positive("hmm.b_gamma", hmm.b_gamma)?;
    Ok(())
}

fn validate_regression(prefix: &str, p: &RegressionPriors) -> ValidationResult<()> {
    if p.dim == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{}.dim", prefix),
            message: "Must be at least 1".to_string(),
        });
    }
    if !p.coef_mean.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: format!("{}.coef_mean", prefix),
            message: format!("Must be finite, got {}", p.coef_mean),
        });
    }
    validate_positive(&format!("{}.coef_precision", prefix), p.coef_precision)?;
    validate_positive(&format!("{}.noise_shape", prefix), p.noise_shape)?;
    validate_positive(&format!("{}.noise_scale", prefix), p.noise_scale)?;
    Ok(())
}

fn validate_positive(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be positive and finite, got {}", value),
        });
    }
    Ok(())
}

/// Validate sampler settings.
pub fn validate_settings(settings: &SamplerSettings) -> ValidationResult<()> {
    if settings.save_min == 0 {
        return Err(ValidationError::InvalidValue {
            field: "save_min".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }
    if settings.num_threads == Some(0) {
        return Err(ValidationError::InvalidValue {
            field: "num_threads".to_string(),
            message: "Must be at least 1 when set".to_string(),
        });
    }
    Ok(())
}
