//! Permutation driver (F), SPEC_FULL.md §4.5: shuffles the labels of `s`
//! `n_perm` times, reruns the top-N driver (E) against each shuffle, and
//! reports an empirical p-value for the observed best score.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::cancellation::CancellationToken;
use crate::error::{Result, SearchError};
use crate::labeled_vector::LabeledVector;
use crate::matrix::BinaryMatrix;
use crate::scores::{ScoreOptions, Scorer};
use crate::search::SearchOptions;
use crate::topn::{run_topn, SeedSelection, TopNResult};

/// Fraction of permutation workers allowed to fail before the whole run is
/// escalated to a fatal error (SPEC_FULL.md §5 "Backpressure and failure").
const DEFAULT_FAILURE_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct PermutationOptions {
    pub n_perm: usize,
    pub seed: u64,
    pub failure_threshold: f64,
}

impl Default for PermutationOptions {
    fn default() -> Self {
        Self {
            n_perm: 0,
            seed: 0,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PermutationResult {
    pub observed: TopNResult,
    pub observed_best: f64,
    pub p_value: f64,
    /// Ascending-sorted null distribution, length `n_perm`.
    pub null: Vec<f64>,
}

/// Maximum distinct permutations of `n` columns, or `None` when `n` is large
/// enough that the limit can never bind in practice.
fn max_distinct_permutations(n: usize) -> Option<u128> {
    if n > 34 {
        return None;
    }
    let mut factorial: u128 = 1;
    for k in 2..=n as u128 {
        factorial = factorial.saturating_mul(k);
    }
    Some(factorial)
}

const RETRY_BUDGET_FACTOR: usize = 20;

/// Draws `n_perm` pairwise-distinct permutations of `0..n`, deterministically
/// from `master_seed` (sub-seeds split off sequentially so the result never
/// depends on `ncores`, SPEC_FULL.md §9 "RNG discipline").
fn draw_distinct_permutations(n: usize, n_perm: usize, master_seed: u64) -> Result<Vec<Vec<usize>>> {
    if let Some(max_distinct) = max_distinct_permutations(n) {
        if (n_perm as u128) > max_distinct {
            return Err(SearchError::PermutationCountExceedsDistinct {
                n_perm,
                max_distinct: max_distinct.to_string(),
            });
        }
    }

    let mut master = ChaCha8Rng::seed_from_u64(master_seed);
    let mut seen: HashSet<Vec<usize>> = HashSet::with_capacity(n_perm);
    let mut out = Vec::with_capacity(n_perm);
    let retry_budget = n_perm.saturating_mul(RETRY_BUDGET_FACTOR).max(1000);

    let mut attempts = 0usize;
    while out.len() < n_perm {
        if attempts >= retry_budget {
            return Err(SearchError::PermutationRetryBudgetExhausted { n_perm });
        }
        attempts += 1;
        let sub_seed = master.next_u64();
        let mut rng = ChaCha8Rng::seed_from_u64(sub_seed);
        let mut order: Vec<usize> = (0..n).collect();
        use rand::seq::SliceRandom;
        order.shuffle(&mut rng);
        if seen.insert(order.clone()) {
            out.push(order);
        }
    }
    Ok(out)
}

/// Runs the permutation driver end to end.
pub fn run_permutation(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    scorer: &dyn Scorer,
    score_opts: &ScoreOptions,
    search_opts: &SearchOptions,
    selection: &SeedSelection,
    best_score_only: bool,
    perm_opts: &PermutationOptions,
    cancelled: &CancellationToken,
) -> Result<PermutationResult> {
    let observed = run_topn(
        matrix,
        s,
        scorer,
        score_opts,
        search_opts,
        selection,
        best_score_only,
        cancelled,
    )?;
    let observed_best = observed.max_best_score();

    if perm_opts.n_perm == 0 {
        return Ok(PermutationResult {
            observed,
            observed_best,
            p_value: 1.0,
            null: Vec::new(),
        });
    }

    let orders = draw_distinct_permutations(s.len(), perm_opts.n_perm, perm_opts.seed)?;

    info!(n_perm = perm_opts.n_perm, "starting permutation driver");
    let failures = AtomicUsize::new(0);

    let null: Vec<f64> = orders
        .into_par_iter()
        .map(|order| {
            if cancelled.is_cancelled() {
                return f64::NAN; // sentinel, checked for below
            }
            let shuffled_values: Vec<f64> = order.iter().map(|&j| s.values()[j]).collect();
            let shuffled = s.with_values(shuffled_values);
            match run_topn(
                matrix,
                &shuffled,
                scorer,
                score_opts,
                search_opts,
                selection,
                best_score_only,
                cancelled,
            ) {
                Ok(result) => result.max_best_score(),
                Err(e) => {
                    warn!(error = %e, "permutation worker failed, recording -inf");
                    failures.fetch_add(1, Ordering::Relaxed);
                    f64::NEG_INFINITY
                }
            }
        })
        .collect();

    if cancelled.is_cancelled() {
        return Err(SearchError::Cancelled);
    }

    let total = perm_opts.n_perm;
    let failed = failures.load(Ordering::Relaxed);
    let failure_rate = failed as f64 / total as f64;
    if failure_rate > perm_opts.failure_threshold {
        error!(failed, total, "permutation failure rate exceeded threshold");
        return Err(SearchError::PermutationFailureRateExceeded {
            failed,
            total,
            threshold: perm_opts.failure_threshold * 100.0,
        });
    }

    let mut null = null;
    null.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let ge_count = null.iter().filter(|&&v| v >= observed_best).count();
    let p_value = (1.0 + ge_count as f64) / (1.0 + total as f64);

    Ok(PermutationResult {
        observed,
        observed_best,
        p_value,
        null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_permutations_are_pairwise_distinct() {
        let orders = draw_distinct_permutations(5, 10, 42).unwrap();
        let unique: HashSet<_> = orders.iter().cloned().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn rejects_more_permutations_than_exist() {
        // 3 columns => only 3! = 6 distinct permutations.
        let err = draw_distinct_permutations(3, 7, 1).unwrap_err();
        assert!(matches!(err, SearchError::PermutationCountExceedsDistinct { .. }));
    }
}
