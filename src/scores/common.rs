//! Shared contract for the score kernels (component B, SPEC_FULL.md §4.2).

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{Result, SearchError};
use crate::labeled_vector::LabeledVector;
use crate::matrix::{BinaryMatrix, BitRow};

/// Tail selection for KS, Wilcoxon and correlation kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", clap(rename_all = "snake_case"))]
pub enum Alternative {
    Less,
    Greater,
    TwoSided,
}

/// Whether KS/Wilcoxon report the raw statistic or `-log(p-value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatOrPval {
    Stat,
    Pval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", clap(rename_all = "snake_case"))]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

/// Options shared by all kernels. Fields unused by a given kernel are
/// simply ignored by it (e.g. `cmethod` is meaningless to the KS kernel).
#[derive(Clone)]
pub struct ScoreOptions {
    pub alternative: Alternative,
    pub cmethod: CorrelationMethod,
    pub knn_k: usize,
    pub weights: Option<LabeledVector>,
    pub custom: Option<Arc<dyn CustomScorer>>,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            alternative: Alternative::TwoSided,
            cmethod: CorrelationMethod::Pearson,
            knn_k: 3,
            weights: None,
            custom: None,
        }
    }
}

/// One kernel's verdict on a single candidate row.
#[derive(Debug, Clone)]
pub struct RankedScore {
    pub row_index: usize,
    pub label: Arc<str>,
    pub score: f64,
}

pub type RankedScores = Vec<RankedScore>;

/// User-supplied kernel (method = custom). Implements the same contract as
/// the built-in kernels: given the matrix, the score vector, the current
/// meta-feature rows (if any) and the options bag, return a labeled vector
/// of per-row scores sorted descending.
pub trait CustomScorer: Send + Sync {
    fn score(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        meta_feature_rows: &[usize],
        opts: &ScoreOptions,
    ) -> Result<RankedScores>;

    /// The symmetric "score of the meta-feature alone" used for the
    /// stopping check (SPEC_FULL.md §4.2); the union is not necessarily a
    /// named matrix row, so this can't be derived from [`Self::score`]
    /// alone and the custom kernel author must supply it directly.
    fn score_union(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        union: &BitRow,
        opts: &ScoreOptions,
    ) -> Result<f64>;
}

/// Uniform contract every kernel implements (SPEC_FULL.md §4.2 / §9).
pub trait Scorer: Send + Sync {
    /// Scores every row in `candidate_rows` (already excluding
    /// `meta_feature_rows`), OR-combining with the meta-feature union where
    /// the kernel's contract calls for it, dropping any candidate whose
    /// combination with the union is all-ones. Returns a vector sorted
    /// descending by score.
    fn score_candidates(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        meta_feature: Option<&BitRow>,
        meta_feature_rows: &[usize],
        candidate_rows: &[usize],
        opts: &ScoreOptions,
    ) -> Result<RankedScores>;

    /// The score of the meta-feature union alone, used for the forward /
    /// backward stopping check (no further candidate combined in).
    fn score_union(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        union: &BitRow,
        opts: &ScoreOptions,
    ) -> Result<f64>;
}

/// Descending ranks (1..=N, rank 1 = largest `s`), ties broken by stable
/// input order (matches the spec's "ranks 1..N assigned by descending s";
/// no tie-averaging since both KS and Wilcoxon here only ever look at
/// position membership, not the rank value of a specific tied pair).
pub fn desc_rank_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}

/// NaN/undefined replaced by the smallest positive representable real
/// before any logarithm (SPEC_FULL.md §4.2).
pub fn sanitize_before_log(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 {
        x
    } else {
        f64::MIN_POSITIVE
    }
}

pub fn neg_log_pvalue(p: f64) -> f64 {
    -sanitize_before_log(p).ln()
}

/// Candidate rows eligible for scoring: OR-combines each candidate with the
/// meta-feature union (if any) and drops the ones whose combination is
/// all-ones, per the generic contract of §4.2. Kernels that score the
/// combined row directly (KS, Wilcoxon, correlation, k-NN MI) use the
/// returned `BitRow`; REVEALER uses only the index list and re-derives the
/// raw (uncombined) candidate row, since its own contract conditions on the
/// union rather than OR-ing into it.
pub fn eligible_candidates(
    matrix: &BinaryMatrix,
    meta_feature: Option<&BitRow>,
    candidate_rows: &[usize],
) -> Vec<(usize, BitRow)> {
    candidate_rows
        .iter()
        .filter_map(|&i| {
            let combined = match meta_feature {
                Some(u) => matrix.row(i).or(u),
                None => matrix.row(i).clone(),
            };
            if combined.is_all_ones() {
                None
            } else {
                Some((i, combined))
            }
        })
        .collect()
}

pub fn sort_scores_desc(mut scores: RankedScores) -> RankedScores {
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });
    scores
}

/// Validates a custom kernel's return value against the contract: labels
/// must be a subset of `rownames(A)` excluding the current meta-feature
/// rows, and the vector must be sorted descending by score (invariant 7,
/// SPEC_FULL.md §8).
pub fn validate_custom_result(
    matrix: &BinaryMatrix,
    meta_feature_rows: &[usize],
    result: &RankedScores,
) -> Result<()> {
    let mut prev: Option<f64> = None;
    for entry in result {
        if entry.row_index >= matrix.nrows() {
            return Err(SearchError::CustomKernelContractViolation {
                detail: format!("row index {} out of bounds", entry.row_index),
            });
        }
        if matrix.row_label(entry.row_index) != &entry.label {
            return Err(SearchError::CustomKernelContractViolation {
                detail: format!(
                    "label {:?} does not match matrix row label {:?}",
                    entry.label,
                    matrix.row_label(entry.row_index)
                ),
            });
        }
        if meta_feature_rows.contains(&entry.row_index) {
            return Err(SearchError::CustomKernelContractViolation {
                detail: format!(
                    "label {:?} is a current meta-feature row and must be excluded",
                    entry.label
                ),
            });
        }
        if let Some(prev_score) = prev {
            if entry.score > prev_score {
                return Err(SearchError::CustomKernelContractViolation {
                    detail: "result is not sorted descending by score".to_string(),
                });
            }
        }
        prev = Some(entry.score);
    }
    Ok(())
}
