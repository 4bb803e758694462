//! Observation set: the per-object sequences the sampler conditions on.
//!
//! Records are read-only for the whole run. Sampler output lives in the
//! sweep snapshot, never here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{ConfigError, ObsModelConfig};
use crate::error::ShapeError;

/// One object's observation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observations {
    /// T rows of D reals.
    Continuous(Vec<Vec<f64>>),
    /// T symbols from a finite alphabet.
    Discrete(Vec<usize>),
}

impl Observations {
    pub fn len(&self) -> usize {
        match self {
            Observations::Continuous(rows) => rows.len(),
            Observations::Discrete(symbols) => symbols.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One observed sequence plus optional labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub obs: Observations,

    /// Ground-truth state labels. Evaluation only.
    #[serde(default, alias = "trueLabels", skip_serializing_if = "Option::is_none")]
    pub true_labels: Option<Vec<usize>>,

    /// Initial labels; `None` entries are left to the sampler.
    #[serde(default, alias = "zInit", skip_serializing_if = "Option::is_none")]
    pub z_init: Option<Vec<Option<usize>>>,
}

impl ObjectRecord {
    pub fn continuous(rows: Vec<Vec<f64>>) -> Self {
        Self {
            obs: Observations::Continuous(rows),
            true_labels: None,
            z_init: None,
        }
    }

    pub fn discrete(symbols: Vec<usize>) -> Self {
        Self {
            obs: Observations::Discrete(symbols),
            true_labels: None,
            z_init: None,
        }
    }

    pub fn with_true_labels(mut self, labels: Vec<usize>) -> Self {
        self.true_labels = Some(labels);
        self
    }

    pub fn with_z_init(mut self, labels: Vec<Option<usize>>) -> Self {
        self.z_init = Some(labels);
        self
    }

    pub fn len(&self) -> usize {
        self.obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }
}

/// Ordered collection of objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    pub objects: Vec<ObjectRecord>,
}

impl ObservationSet {
    pub fn new(objects: Vec<ObjectRecord>) -> Self {
        Self { objects }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content).map_err(|e| ConfigError::Invalid {
            field: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObjectRecord> {
        self.objects.iter()
    }

    /// Check every object against the observation model.
    ///
    /// Empty sequences are accepted for any model since their JSON form
    /// cannot tell continuous from discrete.
    pub fn check_model(&self, model: &ObsModelConfig) -> Result<(), ShapeError> {
        for (object, record) in self.objects.iter().enumerate() {
            if record.is_empty() {
                continue;
            }
            match (model, &record.obs) {
                (
                    ObsModelConfig::Gaussian(p) | ObsModelConfig::AutoRegressive(p),
                    Observations::Continuous(rows),
                ) => {
                    for (t, row) in rows.iter().enumerate() {
                        if row.len() != p.dim {
                            return Err(ShapeError::Dimension {
                                object,
                                t,
                                expected: p.dim,
                                actual: row.len(),
                            });
                        }
                    }
                }
                (ObsModelConfig::Multinomial(p), Observations::Discrete(symbols)) => {
                    if let Some((t, &symbol)) = symbols
                        .iter()
                        .enumerate()
                        .find(|(_, s)| **s >= p.num_symbols)
                    {
                        return Err(ShapeError::Symbol {
                            object,
                            t,
                            symbol,
                            num_symbols: p.num_symbols,
                        });
                    }
                }
                (ObsModelConfig::Multinomial(_), _) => {
                    return Err(ShapeError::Kind {
                        object,
                        expected: "discrete",
                    })
                }
                (ObsModelConfig::Slds, _) => {}
                (_, _) => {
                    return Err(ShapeError::Kind {
                        object,
                        expected: "continuous",
                    })
                }
            }
        }
        Ok(())
    }
}
