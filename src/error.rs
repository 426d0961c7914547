//! Error taxonomy for the candidate-search core (see SPEC_FULL.md §7).

use std::sync::Arc;

/// All fatal/recovered error conditions the core can report.
///
/// Validation and configuration variants abort the top-level call. Runtime
/// variants (permutation failure rate, cancellation) are produced by
/// [`crate::topn`] and [`crate::permutation`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum SearchError {
    #[error("matrix cell at row {row:?}, col {col} is not 0/1: {value}")]
    NonBinaryMatrix {
        row: Arc<str>,
        col: usize,
        value: f64,
    },

    #[error("score vector entry {label:?} is not finite: {value}")]
    NonFiniteScore { label: Arc<str>, value: f64 },

    #[error("matrix has no rows or no columns")]
    EmptyMatrix,

    #[error("row {0:?} is all-zero or all-one and carries no signal")]
    DegenerateRow(Arc<str>),

    #[error("{kind} label {label:?} is empty")]
    EmptyLabel { kind: &'static str, label: String },

    #[error("duplicate {kind} label: {label:?}")]
    DuplicateLabel { kind: &'static str, label: Arc<str> },

    #[error("score vector labels are not a bijection with matrix column labels: {detail}")]
    LabelMismatch { detail: String },

    #[error("unknown {kind} label: {label:?}")]
    UnknownLabel { kind: &'static str, label: String },

    #[error("top_N ({top_n}) exceeds the number of rows ({rows})")]
    TopNExceedsRowCount { top_n: usize, rows: usize },

    #[error("top_N and search_start are mutually exclusive")]
    TopNAndSearchStartBothSupplied,

    #[error("method=custom requires a callable scorer")]
    CustomKernelMissing,

    #[error("custom kernel result violates the scorer contract: {detail}")]
    CustomKernelContractViolation { detail: String },

    #[error("weights labels do not match score-vector labels: {detail}")]
    WeightsLabelMismatch { detail: String },

    #[error("weights vector is all-zero")]
    AllZeroWeights,

    #[error("requested {n_perm} distinct permutations but only {max_distinct} exist")]
    PermutationCountExceedsDistinct { n_perm: usize, max_distinct: String },

    #[error("could not draw {n_perm} pairwise-distinct permutations within the retry budget")]
    PermutationRetryBudgetExhausted { n_perm: usize },

    #[error("{failed}/{total} permutation workers failed, exceeding the {threshold:.0}% threshold")]
    PermutationFailureRateExceeded {
        failed: usize,
        total: usize,
        threshold: f64,
    },

    #[error("search was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SearchError>;
