//! The input-score vector `s` (and the optional per-sample `weights`
//! vector), SPEC_FULL.md §3.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Result, SearchError};

/// A length-N vector of finite reals, labeled like the matrix columns.
#[derive(Clone, Debug)]
pub struct LabeledVector {
    labels: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, usize>,
    values: Vec<f64>,
}

impl LabeledVector {
    pub fn new(labels: Vec<Arc<str>>, values: Vec<f64>) -> Result<Self> {
        if labels.len() != values.len() {
            return Err(SearchError::LabelMismatch {
                detail: format!("{} labels but {} values", labels.len(), values.len()),
            });
        }
        for (label, &v) in labels.iter().zip(&values) {
            if label.is_empty() {
                return Err(SearchError::EmptyLabel {
                    kind: "score",
                    label: label.to_string(),
                });
            }
            if !v.is_finite() {
                return Err(SearchError::NonFiniteScore {
                    label: label.clone(),
                    value: v,
                });
            }
        }
        let mut index = FxHashMap::default();
        index.reserve(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if index.insert(label.clone(), i).is_some() {
                return Err(SearchError::DuplicateLabel {
                    kind: "score",
                    label: label.clone(),
                });
            }
        }
        Ok(Self {
            labels,
            index,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn labels(&self) -> &[Arc<str>] {
        &self.labels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, j: usize) -> f64 {
        self.values[j]
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Verifies that `self`'s labels are exactly the column labels of the
    /// matrix (a bijection, invariant 5 of SPEC_FULL.md §8) and returns a
    /// copy of `self` reordered so that `values()[j]` lines up with
    /// `col_labels[j]`.
    pub fn aligned_to(&self, col_labels: &[Arc<str>]) -> Result<Self> {
        if self.len() != col_labels.len() {
            return Err(SearchError::LabelMismatch {
                detail: format!(
                    "score vector has {} entries but matrix has {} columns",
                    self.len(),
                    col_labels.len()
                ),
            });
        }
        let mut values = Vec::with_capacity(col_labels.len());
        for label in col_labels {
            match self.index_of(label) {
                Some(i) => values.push(self.values[i]),
                None => {
                    return Err(SearchError::LabelMismatch {
                        detail: format!("column label {label:?} has no matching score entry"),
                    })
                }
            }
        }
        Self::new(col_labels.to_vec(), values)
    }

    /// Returns a new vector with `values` replaced by `new_values`
    /// (same labels, same order); used by the permutation driver to
    /// produce shuffled variants without re-validating labels.
    pub fn with_values(&self, new_values: Vec<f64>) -> Self {
        debug_assert_eq!(new_values.len(), self.values.len());
        Self {
            labels: self.labels.clone(),
            index: self.index.clone(),
            values: new_values,
        }
    }
}
