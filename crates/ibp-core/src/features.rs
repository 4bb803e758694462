//! Object × state feature matrix.
//!
//! Row `i` lists the global states object `i` may visit. Every row keeps at
//! least one allowed state. Columns only grow.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Column count when no initial labels are supplied.
pub const DEFAULT_NUM_FEATURES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    num_states: usize,
    rows: Vec<Vec<bool>>,
}

impl FeatureMatrix {
    /// Build the initial matrix.
    ///
    /// With labels, object `i` allows exactly the distinct fixed labels in
    /// `labels[i]` and the width is one past the largest label. Without,
    /// every object allows all `DEFAULT_NUM_FEATURES` states.
    pub fn initialize(
        num_objects: usize,
        initial_labels: Option<&[&[Option<usize>]]>,
    ) -> Result<Self, ConfigError> {
        let Some(labels) = initial_labels else {
            return Ok(Self {
                num_states: DEFAULT_NUM_FEATURES,
                rows: vec![vec![true; DEFAULT_NUM_FEATURES]; num_objects],
            });
        };

        if labels.len() != num_objects {
            return Err(ConfigError::ObjectCountMismatch {
                expected: num_objects,
                actual: labels.len(),
            });
        }

        let num_states = labels
            .iter()
            .flat_map(|l| l.iter().flatten())
            .max()
            .map_or(0, |&k| k + 1);

        let mut rows = vec![vec![false; num_states]; num_objects];
        for (row, object_labels) in rows.iter_mut().zip(labels) {
            for &k in object_labels.iter().flatten() {
                row[k] = true;
            }
        }
        Self::from_rows(rows)
    }

    /// Build from explicit rows. All rows must have the same width and at
    /// least one allowed state.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, ConfigError> {
        let num_states = rows.first().map_or(0, Vec::len);
        for (object, row) in rows.iter().enumerate() {
            if row.len() != num_states {
                return Err(ConfigError::Invalid {
                    field: format!("features[{}]", object),
                    message: format!("row has {} columns, expected {}", row.len(), num_states),
                });
            }
            if !row.iter().any(|&b| b) {
                return Err(ConfigError::EmptyFeatureRow { object });
            }
        }
        Ok(Self { num_states, rows })
    }

    pub fn num_objects(&self) -> usize {
        self.rows.len()
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn row(&self, object: usize) -> &[bool] {
        &self.rows[object]
    }

    pub fn is_allowed(&self, object: usize, state: usize) -> bool {
        self.rows
            .get(object)
            .and_then(|r| r.get(state))
            .copied()
            .unwrap_or(false)
    }

    /// States object `object` may use, ascending.
    pub fn allowed_states(&self, object: usize) -> Vec<usize> {
        self.rows[object]
            .iter()
            .enumerate()
            .filter_map(|(k, &on)| on.then_some(k))
            .collect()
    }

    /// States allowed for at least one object.
    pub fn active_states(&self) -> Vec<usize> {
        (0..self.num_states)
            .filter(|&k| self.rows.iter().any(|r| r[k]))
            .collect()
    }

    /// Append `count` columns, disallowed for every object.
    pub fn add_states(&mut self, count: usize) {
        self.num_states += count;
        for row in &mut self.rows {
            row.resize(self.num_states, false);
        }
    }

    /// Change one entry. Refuses to empty a row.
    pub fn set(&mut self, object: usize, state: usize, allowed: bool) -> Result<(), ConfigError> {
        if state >= self.num_states || object >= self.rows.len() {
            return Err(ConfigError::Invalid {
                field: format!("features[{}][{}]", object, state),
                message: "index out of range".to_string(),
            });
        }
        let row = &mut self.rows[object];
        let previous = row[state];
        row[state] = allowed;
        if !row.iter().any(|&b| b) {
            row[state] = previous;
            return Err(ConfigError::EmptyFeatureRow { object });
        }
        Ok(())
    }
}
