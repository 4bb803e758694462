//! Sequence layout: per-object lengths, cumulative offsets and flattening.
//!
//! All indices are 0-based. Object `i` occupies the half-open range
//! `offsets[i]..offsets[i + 1]` of any flattened array.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::data::{ObjectRecord, ObservationSet};
use crate::error::ShapeError;
use crate::model::StateAssignment;

/// Lengths and offsets of the objects in an observation set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceIndex {
    lengths: Vec<usize>,
    /// `offsets[0] == 0`; `offsets[i + 1] == offsets[i] + lengths[i]`.
    offsets: Vec<usize>,
}

impl SequenceIndex {
    pub fn from_lengths(lengths: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        let mut acc = 0usize;
        offsets.push(acc);
        for &len in &lengths {
            acc += len;
            offsets.push(acc);
        }
        Self { lengths, offsets }
    }

    pub fn from_observations(data: &ObservationSet) -> Self {
        Self::from_lengths(data.iter().map(ObjectRecord::len).collect())
    }

    pub fn num_objects(&self) -> usize {
        self.lengths.len()
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Cumulative lengths: entry `i` is the total length of objects `0..=i`.
    pub fn cumulative(&self) -> &[usize] {
        &self.offsets[1..]
    }

    pub fn total_len(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Flattened range of object `object`. Panics if out of bounds.
    pub fn range(&self, object: usize) -> Range<usize> {
        self.offsets[object]..self.offsets[object + 1]
    }

    /// Concatenate per-object slices in object order.
    pub fn flatten<T: Clone, S: AsRef<[T]>>(
        &self,
        field: &str,
        per_object: &[S],
    ) -> Result<Vec<T>, ShapeError> {
        if per_object.len() != self.num_objects() {
            return Err(ShapeError::ObjectCount {
                field: field.to_string(),
                expected: self.num_objects(),
                actual: per_object.len(),
            });
        }
        let mut flat = Vec::with_capacity(self.total_len());
        for (object, (slice, &expected)) in per_object.iter().zip(&self.lengths).enumerate() {
            let slice = slice.as_ref();
            if slice.len() != expected {
                return Err(ShapeError::LengthMismatch {
                    object,
                    field: field.to_string(),
                    expected,
                    actual: slice.len(),
                });
            }
            flat.extend_from_slice(slice);
        }
        Ok(flat)
    }

    /// Split a flattened array back into per-object vectors.
    pub fn split<T: Clone>(&self, field: &str, flat: &[T]) -> Result<Vec<Vec<T>>, ShapeError> {
        if flat.len() != self.total_len() {
            return Err(ShapeError::TotalLength {
                field: field.to_string(),
                expected: self.total_len(),
                actual: flat.len(),
            });
        }
        Ok((0..self.num_objects())
            .map(|i| flat[self.range(i)].to_vec())
            .collect())
    }
}

/// Flatten an optional per-object field.
///
/// Returns `Ok(None)` when no object has the field and
/// `ShapeError::MissingField` when only some do.
pub fn flatten_field<'a, T, F>(
    data: &'a ObservationSet,
    index: &SequenceIndex,
    field: &str,
    extract: F,
) -> Result<Option<Vec<T>>, ShapeError>
where
    T: Clone + 'a,
    F: Fn(&'a ObjectRecord) -> Option<&'a [T]>,
{
    let slices: Vec<Option<&[T]>> = data.iter().map(extract).collect();
    if slices.iter().all(Option::is_none) {
        return Ok(None);
    }
    let mut present = Vec::with_capacity(slices.len());
    for (object, slice) in slices.into_iter().enumerate() {
        match slice {
            Some(s) => present.push(s),
            None => {
                return Err(ShapeError::MissingField {
                    object,
                    field: field.to_string(),
                })
            }
        }
    }
    index.flatten(field, &present).map(Some)
}

/// Concatenated label arrays for evaluation and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationArrays {
    pub index: SequenceIndex,
    /// Ground-truth labels of all objects, if the data has them.
    pub true_labels_tot: Option<Vec<usize>>,
    /// Sampled states of all objects, once a state sequence exists.
    pub z_tot: Option<Vec<usize>>,
}

impl EvaluationArrays {
    pub fn build(
        data: &ObservationSet,
        index: &SequenceIndex,
        assignment: Option<&StateAssignment>,
    ) -> Result<Self, ShapeError> {
        let true_labels_tot =
            flatten_field(data, index, "true_labels", |r| r.true_labels.as_deref())?;
        let z_tot = assignment
            .map(|a| index.flatten("z", &a.sequences))
            .transpose()?;
        Ok(Self {
            index: index.clone(),
            true_labels_tot,
            z_tot,
        })
    }

    /// Slice of a flattened array belonging to `object`.
    pub fn object_slice<'a, T>(&self, flat: &'a [T], object: usize) -> &'a [T] {
        &flat[self.index.range(object)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ObjectRecord;

    fn two_objects() -> ObservationSet {
        ObservationSet::new(vec![
            ObjectRecord::discrete(vec![0, 1, 1, 0, 2]).with_true_labels(vec![0, 0, 1, 1, 1]),
            ObjectRecord::discrete(vec![2, 2, 0]).with_true_labels(vec![2, 2, 0]),
        ])
    }

    #[test]
    fn offsets_and_ranges() {
        let index = SequenceIndex::from_observations(&two_objects());
        assert_eq!(index.lengths(), &[5, 3]);
        assert_eq!(index.cumulative(), &[5, 8]);
        assert_eq!(index.total_len(), 8);
        assert_eq!(index.range(0), 0..5);
        assert_eq!(index.range(1), 5..8);
    }

    #[test]
    fn zero_length_object_keeps_later_offsets() {
        let index = SequenceIndex::from_lengths(vec![2, 0, 3]);
        assert_eq!(index.cumulative(), &[2, 2, 5]);
        assert_eq!(index.range(1), 2..2);
        assert_eq!(index.range(2), 2..5);

        let flat = index
            .flatten("x", &[vec![1, 2], vec![], vec![3, 4, 5]])
            .unwrap();
        assert_eq!(flat, vec![1, 2, 3, 4, 5]);
        assert_eq!(index.split("x", &flat).unwrap()[1], Vec::<i32>::new());
    }

    #[test]
    fn empty_index() {
        let index = SequenceIndex::from_lengths(vec![]);
        assert_eq!(index.total_len(), 0);
        assert!(index.cumulative().is_empty());
        assert_eq!(index.flatten::<u8, Vec<u8>>("x", &[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn flatten_rejects_wrong_lengths() {
        let index = SequenceIndex::from_lengths(vec![2, 1]);
        let err = index.flatten("z", &[vec![0, 1], vec![0, 0]]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::LengthMismatch {
                object: 1,
                field: "z".into(),
                expected: 1,
                actual: 2
            }
        );
        assert!(matches!(
            index.flatten("z", &[vec![0, 1]]),
            Err(ShapeError::ObjectCount { .. })
        ));
        assert!(matches!(
            index.split("z", &[1, 2]),
            Err(ShapeError::TotalLength { .. })
        ));
    }

    #[test]
    fn partial_field_is_missing_field() {
        let mut data = two_objects();
        data.objects[1].true_labels = None;
        let index = SequenceIndex::from_observations(&data);
        let err = flatten_field(&data, &index, "true_labels", |r| r.true_labels.as_deref())
            .unwrap_err();
        assert_eq!(
            err,
            ShapeError::MissingField {
                object: 1,
                field: "true_labels".into()
            }
        );
    }

    #[test]
    fn evaluation_arrays_place_second_object_after_first() {
        let data = two_objects();
        let index = SequenceIndex::from_observations(&data);
        let assignment =
            StateAssignment::from_sequences(vec![vec![0, 0, 1, 1, 1], vec![1, 1, 0]], 2).unwrap();

        let arrays = EvaluationArrays::build(&data, &index, Some(&assignment)).unwrap();
        let truth = arrays.true_labels_tot.as_ref().unwrap();
        let z = arrays.z_tot.as_ref().unwrap();
        assert_eq!(truth.len(), 8);
        assert_eq!(z.len(), 8);
        assert_eq!(arrays.object_slice(truth, 1), &[2, 2, 0]);
        assert_eq!(arrays.object_slice(z, 1), &[1, 1, 0]);
    }

    #[test]
    fn evaluation_arrays_without_labels_or_states() {
        let data = ObservationSet::new(vec![ObjectRecord::discrete(vec![0])]);
        let index = SequenceIndex::from_observations(&data);
        let arrays = EvaluationArrays::build(&data, &index, None).unwrap();
        assert!(arrays.true_labels_tot.is_none());
        assert!(arrays.z_tot.is_none());
    }
}
