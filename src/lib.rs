//! Meta-feature candidate search: identify the subset of binary features
//! whose logical OR is maximally associated with a continuous per-sample
//! response (SPEC_FULL.md §1).
//!
//! Components, leaves first: [`matrix`] and [`labeled_vector`] (A, input
//! data model), [`scores`] (B, the six pluggable score kernels), [`search`]
//! (C+D, meta-feature state and the forward/backward search engine),
//! [`topn`] (E, top-N seeding), [`permutation`] (F, the permutation null),
//! [`prefilter`] (G boundary, prevalence pre-filter), [`cancellation`] (the
//! cooperative cancellation token shared by E and F).

pub mod cancellation;
pub mod error;
pub mod labeled_vector;
pub mod matrix;
pub mod permutation;
pub mod prefilter;
pub mod scores;
pub mod search;
pub mod topn;

#[cfg(feature = "cli")]
pub mod cli;

pub use cancellation::CancellationToken;
pub use error::{Result, SearchError};
pub use labeled_vector::LabeledVector;
pub use matrix::{BinaryMatrix, BitRow};
pub use permutation::{run_permutation, PermutationOptions, PermutationResult};
pub use scores::{make_scorer, Method, ScoreOptions};
pub use search::{SearchMethod, SearchOptions};
pub use topn::{run_topn, SeedSelection, TopNResult};

/// Aligns an optional weights vector to the matrix's column order and
/// rejects a mismatched or all-zero result (SPEC_FULL.md §7).
fn prepare_score_opts(matrix: &BinaryMatrix, opts: &ScoreOptions) -> Result<ScoreOptions> {
    let weights = match &opts.weights {
        Some(w) => {
            let aligned = w.aligned_to(matrix.col_labels()).map_err(|e| match e {
                SearchError::LabelMismatch { detail } => SearchError::WeightsLabelMismatch { detail },
                other => other,
            })?;
            if aligned.values().iter().all(|&v| v == 0.0) {
                return Err(SearchError::AllZeroWeights);
            }
            Some(aligned)
        }
        None => None,
    };
    Ok(ScoreOptions {
        weights,
        ..opts.clone()
    })
}

/// Weighted KS in `pval` mode always reports the *unweighted* p-value
/// (SPEC_FULL.md §9 Open Question (i)); flag it so the caller can't miss
/// the caveat.
fn warn_on_weighted_ks_pvalue(method: Method, score_opts: &ScoreOptions) {
    if matches!(method, Method::KsPval) && score_opts.weights.is_some() {
        tracing::warn!(
            "method=ks_pval with weights set: the reported p-value is always the unweighted \
             Kolmogorov-Smirnov p-value; only stat mode reflects the weighting"
        );
    }
}

/// Top-level entry point: resolves `s` (and `weights`, if present) against
/// `matrix`'s column labels and runs the top-N driver (E), without a
/// permutation null. This is the library-level equivalent of the informal
/// `candidate_search` call of SPEC_FULL.md §6.
///
/// Not cancellable: uses a fresh, never-triggered token. Use
/// [`candidate_search_cancellable`] to pass a [`CancellationToken`] a caller
/// can flip from another thread.
pub fn candidate_search(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    method: Method,
    score_opts: &ScoreOptions,
    search_opts: &SearchOptions,
    selection: &SeedSelection,
    best_score_only: bool,
) -> Result<TopNResult> {
    candidate_search_cancellable(
        matrix,
        s,
        method,
        score_opts,
        search_opts,
        selection,
        best_score_only,
        &CancellationToken::new(),
    )
}

/// As [`candidate_search`], but checks `cancelled` between permutations and
/// forward/backward search steps (SPEC_FULL.md §5 "Cancellation"), erroring
/// with [`SearchError::Cancelled`] and discarding partial results if it was
/// ever flipped during the call.
#[allow(clippy::too_many_arguments)]
pub fn candidate_search_cancellable(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    method: Method,
    score_opts: &ScoreOptions,
    search_opts: &SearchOptions,
    selection: &SeedSelection,
    best_score_only: bool,
    cancelled: &CancellationToken,
) -> Result<TopNResult> {
    let s = s.aligned_to(matrix.col_labels())?;
    let score_opts = prepare_score_opts(matrix, score_opts)?;
    warn_on_weighted_ks_pvalue(method, &score_opts);
    let scorer = make_scorer(method);
    run_topn(
        matrix,
        &s,
        scorer.as_ref(),
        &score_opts,
        search_opts,
        selection,
        best_score_only,
        cancelled,
    )
}

/// As [`candidate_search`], but additionally runs the permutation driver
/// (F) for an empirical p-value. Not cancellable; see
/// [`candidate_search_with_permutation_cancellable`].
#[allow(clippy::too_many_arguments)]
pub fn candidate_search_with_permutation(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    method: Method,
    score_opts: &ScoreOptions,
    search_opts: &SearchOptions,
    selection: &SeedSelection,
    best_score_only: bool,
    perm_opts: &PermutationOptions,
) -> Result<PermutationResult> {
    candidate_search_with_permutation_cancellable(
        matrix,
        s,
        method,
        score_opts,
        search_opts,
        selection,
        best_score_only,
        perm_opts,
        &CancellationToken::new(),
    )
}

/// As [`candidate_search_with_permutation`], honoring `cancelled` the same
/// way [`candidate_search_cancellable`] does, including between individual
/// permutation workers.
#[allow(clippy::too_many_arguments)]
pub fn candidate_search_with_permutation_cancellable(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    method: Method,
    score_opts: &ScoreOptions,
    search_opts: &SearchOptions,
    selection: &SeedSelection,
    best_score_only: bool,
    perm_opts: &PermutationOptions,
    cancelled: &CancellationToken,
) -> Result<PermutationResult> {
    let s = s.aligned_to(matrix.col_labels())?;
    let score_opts = prepare_score_opts(matrix, score_opts)?;
    warn_on_weighted_ks_pvalue(method, &score_opts);
    let scorer = make_scorer(method);
    run_permutation(
        matrix,
        &s,
        scorer.as_ref(),
        &score_opts,
        search_opts,
        selection,
        best_score_only,
        perm_opts,
        cancelled,
    )
}
