//! Pre-filter adapter (component G boundary, SPEC_FULL.md §6): restricts a
//! binary matrix to rows whose fraction of 1s lies in `[min_cutoff,
//! max_cutoff]`. Out of scope for the core per §1, kept here because the
//! core's `candidate_search` entry point accepts its output directly.

use crate::matrix::BinaryMatrix;

/// Returns the subset of `matrix`'s rows whose fraction of ones lies in
/// `[min_cutoff, max_cutoff]`. Row order is preserved.
pub fn prefilter_by_prevalence(matrix: &BinaryMatrix, min_cutoff: f64, max_cutoff: f64) -> BinaryMatrix {
    debug_assert!((0.0..=1.0).contains(&min_cutoff));
    debug_assert!((0.0..=1.0).contains(&max_cutoff));
    debug_assert!(min_cutoff <= max_cutoff);

    let ncols = matrix.ncols() as f64;
    let keep: Vec<usize> = (0..matrix.nrows())
        .filter(|&i| {
            let frac = matrix.row_count_ones(i) as f64 / ncols;
            frac >= min_cutoff && frac <= max_cutoff
        })
        .collect();
    matrix.subset_rows(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn labels(names: &[&str]) -> Vec<Arc<str>> {
        names.iter().map(|s| Arc::from(*s)).collect()
    }

    #[test]
    fn keeps_only_rows_within_cutoff_range() {
        let m = BinaryMatrix::from_dense(
            labels(&["rare", "mid", "common"]),
            labels(&["c0", "c1", "c2", "c3"]),
            vec![
                vec![1.0, 0.0, 0.0, 0.0], // 0.25
                vec![1.0, 1.0, 0.0, 0.0], // 0.5
                vec![1.0, 1.0, 1.0, 0.0], // 0.75
            ],
        )
        .unwrap();
        let filtered = prefilter_by_prevalence(&m, 0.3, 0.6);
        assert_eq!(filtered.row_labels().len(), 1);
        assert_eq!(filtered.row_labels()[0].as_ref(), "mid");
    }
}
