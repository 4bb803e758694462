//! Model configuration: HMM concentration hyperpriors and the observation model.

use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

/// Complete model configuration (model.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Gamma hyperpriors on the HMM concentration parameters.
    #[serde(alias = "HMMmodel")]
    pub hmm: HmmHyperPriors,

    /// Emission / dynamics model and its conjugate priors.
    #[serde(alias = "obsModel")]
    pub obs_model: ObsModelConfig,
}

/// Gamma(shape, rate) hyperpriors on alpha, kappa and gamma.
///
/// Initial values are the prior means `a_* / b_*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmHyperPriors {
    /// Shape of the prior on the state-usage concentration.
    pub a_alpha: f64,
    /// Rate of the prior on the state-usage concentration.
    pub b_alpha: f64,
    /// Shape of the prior on the self-transition weight.
    pub a_kappa: f64,
    /// Rate of the prior on the self-transition weight.
    pub b_kappa: f64,
    /// Shape of the prior on the feature-allocation mass.
    pub a_gamma: f64,
    /// Rate of the prior on the feature-allocation mass.
    pub b_gamma: f64,
}

impl Default for HmmHyperPriors {
    fn default() -> Self {
        Self {
            a_alpha: 1.0,
            b_alpha: 1.0,
            a_kappa: 25.0,
            b_kappa: 1.0,
            a_gamma: 1.0,
            b_gamma: 1.0,
        }
    }
}

/// Observation model, selected once at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObsModelConfig {
    /// Per-state Gaussian emissions (diagonal, conjugate Normal-Inverse-Gamma).
    Gaussian(RegressionPriors),
    /// Per-state first-order autoregressive dynamics (diagonal).
    #[serde(alias = "ar")]
    AutoRegressive(RegressionPriors),
    /// Per-state categorical emissions over a finite alphabet.
    Multinomial(MultinomialPriors),
    /// Switching linear dynamical system. Recognized but not supported.
    Slds,
}

impl ObsModelConfig {
    /// Stable name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ObsModelConfig::Gaussian(_) => "gaussian",
            ObsModelConfig::AutoRegressive(_) => "auto_regressive",
            ObsModelConfig::Multinomial(_) => "multinomial",
            ObsModelConfig::Slds => "slds",
        }
    }
}

/// Normal-Inverse-Gamma priors for a per-dimension scalar regression
/// `y = a·x + e`, `e ~ N(0, σ²)`.
///
/// For Gaussian emissions the regressor is the constant 1, so `a` is the mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionPriors {
    /// Observation dimension D.
    pub dim: usize,
    /// Prior mean of the coefficient.
    #[serde(default)]
    pub coef_mean: f64,
    /// Prior precision multiplier on the coefficient (κ0).
    #[serde(default = "default_coef_precision")]
    pub coef_precision: f64,
    /// Inverse-Gamma shape on the noise variance.
    #[serde(default = "default_noise_shape")]
    pub noise_shape: f64,
    /// Inverse-Gamma scale on the noise variance.
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f64,
}

fn default_coef_precision() -> f64 {
    0.1
}

fn default_noise_shape() -> f64 {
    2.0
}

fn default_noise_scale() -> f64 {
    1.0
}

impl RegressionPriors {
    /// Weakly informative priors for `dim` dimensions.
    pub fn weak(dim: usize) -> Self {
        Self {
            dim,
            coef_mean: 0.0,
            coef_precision: default_coef_precision(),
            noise_shape: default_noise_shape(),
            noise_scale: default_noise_scale(),
        }
    }
}

/// Symmetric Dirichlet prior over emission symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultinomialPriors {
    /// Alphabet size V; symbols are 0..V.
    pub num_symbols: usize,
    /// Symmetric Dirichlet concentration.
    #[serde(default = "default_symbol_concentration")]
    pub concentration: f64,
}

fn default_symbol_concentration() -> f64 {
    1.0
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            hmm: HmmHyperPriors::default(),
            obs_model: ObsModelConfig::Gaussian(RegressionPriors::weak(1)),
        }
    }
}

impl ModelConfig {
    /// Load a model configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    /// Parse a model configuration from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gaussian_model() {
        let json = r#"{
            "schema_version": "1.0.0",
            "hmm": {"a_alpha": 1.0, "b_alpha": 1.0, "a_kappa": 50.0, "b_kappa": 2.0,
                    "a_gamma": 3.0, "b_gamma": 1.5},
            "obs_model": {"type": "gaussian", "dim": 2, "noise_shape": 3.0}
        }"#;

        let model = ModelConfig::from_str(json).unwrap();
        assert_eq!(model.schema_version, "1.0.0");
        assert_eq!(model.hmm.a_kappa, 50.0);
        match model.obs_model {
            ObsModelConfig::Gaussian(p) => {
                assert_eq!(p.dim, 2);
                assert_eq!(p.noise_shape, 3.0);
                assert_eq!(p.coef_precision, 0.1);
            }
            other => panic!("unexpected obs model {other:?}"),
        }
    }

    #[test]
    fn test_parse_legacy_keys() {
        let json = r#"{
            "schema_version": "1.0.0",
            "HMMmodel": {"a_alpha": 1.0, "b_alpha": 1.0, "a_kappa": 1.0, "b_kappa": 1.0,
                         "a_gamma": 1.0, "b_gamma": 1.0},
            "obsModel": {"type": "ar", "dim": 1}
        }"#;

        let model = ModelConfig::from_str(json).unwrap();
        assert_eq!(model.obs_model.name(), "auto_regressive");
    }

    #[test]
    fn test_parse_multinomial_and_slds() {
        let json = r#"{"schema_version": "1.0.0",
            "hmm": {"a_alpha": 1, "b_alpha": 1, "a_kappa": 1, "b_kappa": 1, "a_gamma": 1, "b_gamma": 1},
            "obs_model": {"type": "multinomial", "num_symbols": 4}}"#;
        let model = ModelConfig::from_str(json).unwrap();
        assert_eq!(
            model.obs_model,
            ObsModelConfig::Multinomial(MultinomialPriors {
                num_symbols: 4,
                concentration: 1.0
            })
        );

        let slds = json.replace(r#""type": "multinomial", "num_symbols": 4"#, r#""type": "slds""#);
        assert_eq!(ModelConfig::from_str(&slds).unwrap().obs_model, ObsModelConfig::Slds);
    }

    #[test]
    fn test_parse_errors_are_parse_errors() {
        let err = ModelConfig::from_str("{not json").unwrap_err();
        assert_eq!(err.code(), 61);
    }

    #[test]
    fn test_default_roundtrips_through_json() {
        let model = ModelConfig::default();
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(ModelConfig::from_str(&json).unwrap(), model);
    }
}
