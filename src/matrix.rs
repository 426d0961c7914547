//! Bit-packed binary feature matrix (component A, SPEC_FULL.md §4.1).
//!
//! Rows are features, columns are samples. Every row is stored as a vector
//! of 64-bit words so that `or_union` and popcount are a handful of
//! vectorizable word ops rather than per-bit work, mirroring the bit-packed
//! vector trick the teacher crate uses for its own per-column state
//! (`pa-bitpacking`'s `B = u64` bitvectors) adapted here to stable Rust
//! (`u64::count_ones`, no `portable_simd`).

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Result, SearchError};

const WORD_BITS: usize = u64::BITS as usize;

/// A single bit-packed row/column-count vector: one bit per sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitRow {
    words: Vec<u64>,
    len: usize,
}

impl BitRow {
    pub fn zeros(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    pub fn from_bits(bits: &[bool]) -> Self {
        let mut row = Self::zeros(bits.len());
        for (j, &b) in bits.iter().enumerate() {
            if b {
                row.set(j);
            }
        }
        row
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, j: usize) -> bool {
        debug_assert!(j < self.len);
        (self.words[j / WORD_BITS] >> (j % WORD_BITS)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, j: usize) {
        debug_assert!(j < self.len);
        self.words[j / WORD_BITS] |= 1 << (j % WORD_BITS);
    }

    /// Elementwise OR with `other`, returning a freshly owned row.
    pub fn or(&self, other: &BitRow) -> BitRow {
        debug_assert_eq!(self.len, other.len);
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| a | b)
            .collect();
        BitRow {
            words,
            len: self.len,
        }
    }

    pub fn or_assign(&mut self, other: &BitRow) {
        debug_assert_eq!(self.len, other.len);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    /// Popcount, i.e. `row_count_ones`.
    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_all_ones(&self) -> bool {
        self.count_ones() as usize == self.len
    }

    pub fn is_all_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&j| self.get(j))
    }

    pub fn reorder(&self, perm: &[usize]) -> BitRow {
        debug_assert_eq!(perm.len(), self.len);
        let mut out = BitRow::zeros(self.len);
        for (new_j, &old_j) in perm.iter().enumerate() {
            if self.get(old_j) {
                out.set(new_j);
            }
        }
        out
    }
}

/// Owns the M x N bit-packed feature matrix with stable row/column labels.
#[derive(Clone, Debug)]
pub struct BinaryMatrix {
    row_labels: Vec<Arc<str>>,
    col_labels: Vec<Arc<str>>,
    row_index: FxHashMap<Arc<str>, usize>,
    col_index: FxHashMap<Arc<str>, usize>,
    rows: Vec<BitRow>,
}

impl BinaryMatrix {
    /// Builds a matrix from dense 0/1 rows, validating the invariants of
    /// SPEC_FULL.md §3: binary cells, unique non-empty labels, no all-zero
    /// or all-one row.
    pub fn from_dense(
        row_labels: Vec<Arc<str>>,
        col_labels: Vec<Arc<str>>,
        cells: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if row_labels.is_empty() || col_labels.is_empty() {
            return Err(SearchError::EmptyMatrix);
        }
        if cells.len() != row_labels.len() {
            return Err(SearchError::LabelMismatch {
                detail: format!(
                    "{} rows of data but {} row labels",
                    cells.len(),
                    row_labels.len()
                ),
            });
        }

        let row_index = build_label_index("row", &row_labels)?;
        let col_index = build_label_index("column", &col_labels)?;

        let mut rows = Vec::with_capacity(cells.len());
        for (label, row_cells) in row_labels.iter().zip(&cells) {
            if row_cells.len() != col_labels.len() {
                return Err(SearchError::LabelMismatch {
                    detail: format!(
                        "row {label:?} has {} cells but there are {} column labels",
                        row_cells.len(),
                        col_labels.len()
                    ),
                });
            }
            let mut bits = Vec::with_capacity(row_cells.len());
            for (col, &v) in row_cells.iter().enumerate() {
                if v == 0.0 {
                    bits.push(false);
                } else if v == 1.0 {
                    bits.push(true);
                } else {
                    return Err(SearchError::NonBinaryMatrix {
                        row: label.clone(),
                        col,
                        value: v,
                    });
                }
            }
            let row = BitRow::from_bits(&bits);
            if row.is_all_zero() || row.is_all_ones() {
                return Err(SearchError::DegenerateRow(label.clone()));
            }
            rows.push(row);
        }

        Ok(Self {
            row_labels,
            col_labels,
            row_index,
            col_index,
            rows,
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.col_labels.len()
    }

    pub fn row_labels(&self) -> &[Arc<str>] {
        &self.row_labels
    }

    pub fn col_labels(&self) -> &[Arc<str>] {
        &self.col_labels
    }

    pub fn row_label(&self, i: usize) -> &Arc<str> {
        &self.row_labels[i]
    }

    pub fn row_index_of(&self, label: &str) -> Option<usize> {
        self.row_index.get(label).copied()
    }

    pub fn col_index_of(&self, label: &str) -> Option<usize> {
        self.col_index.get(label).copied()
    }

    /// Constant-time row reference.
    pub fn row(&self, i: usize) -> &BitRow {
        &self.rows[i]
    }

    pub fn row_count_ones(&self, i: usize) -> u32 {
        self.rows[i].count_ones()
    }

    /// Elementwise OR across a set of row indices.
    pub fn or_union(&self, row_indices: &[usize]) -> BitRow {
        let mut acc = BitRow::zeros(self.ncols());
        for &i in row_indices {
            acc.or_assign(&self.rows[i]);
        }
        acc
    }

    /// Returns a new matrix containing only the given row indices, in the
    /// given order (used by the pre-filter adapter, SPEC_FULL.md §6).
    pub fn subset_rows(&self, keep: &[usize]) -> Self {
        let row_labels: Vec<Arc<str>> = keep.iter().map(|&i| self.row_labels[i].clone()).collect();
        let rows: Vec<BitRow> = keep.iter().map(|&i| self.rows[i].clone()).collect();
        let row_index = row_labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self {
            row_labels,
            col_labels: self.col_labels.clone(),
            row_index,
            col_index: self.col_index.clone(),
            rows,
        }
    }

    /// Returns a new matrix with columns permuted; row/column labels stay
    /// attached to their (possibly moved) column, row indices are
    /// unaffected.
    pub fn reorder_cols(&self, perm: &[usize]) -> Self {
        debug_assert_eq!(perm.len(), self.ncols());
        let col_labels: Vec<Arc<str>> = perm.iter().map(|&j| self.col_labels[j].clone()).collect();
        let col_index = col_labels
            .iter()
            .enumerate()
            .map(|(j, l)| (l.clone(), j))
            .collect();
        let rows = self.rows.iter().map(|r| r.reorder(perm)).collect();
        Self {
            row_labels: self.row_labels.clone(),
            col_labels,
            row_index: self.row_index.clone(),
            col_index,
            rows,
        }
    }
}

fn build_label_index(kind: &'static str, labels: &[Arc<str>]) -> Result<FxHashMap<Arc<str>, usize>> {
    let mut index = FxHashMap::default();
    index.reserve(labels.len());
    for (i, label) in labels.iter().enumerate() {
        if label.is_empty() {
            return Err(SearchError::EmptyLabel {
                kind,
                label: label.to_string(),
            });
        }
        if index.insert(label.clone(), i).is_some() {
            return Err(SearchError::DuplicateLabel {
                kind,
                label: label.clone(),
            });
        }
    }
    Ok(index)
}
