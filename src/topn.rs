//! Top-N driver (E), SPEC_FULL.md §4.4: ranks every row, seeds the search
//! engine (D) from the top-N rows or an explicit label list, and runs the
//! seeds in parallel over the shared `rayon` pool.

use rayon::prelude::*;

use crate::cancellation::CancellationToken;
use crate::error::{Result, SearchError};
use crate::labeled_vector::LabeledVector;
use crate::matrix::BinaryMatrix;
use crate::scores::{RankedScores, ScoreOptions, Scorer};
use crate::search::{run_search, SearchOptions, SearchRecord};

/// How seeds are chosen for the top-N driver.
#[derive(Debug, Clone)]
pub enum SeedSelection {
    TopN(usize),
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TopNResult {
    pub records: Vec<SearchRecord>,
    /// Index into `records` of the seed with the maximal `best_score`,
    /// populated when `best_score_only` is requested.
    pub best: Option<usize>,
}

impl TopNResult {
    pub fn max_best_score(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.best_score)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Ranks every row in `matrix` against `s` with no meta-feature selected
/// (the ranking used both to pick top-N seeds and as a standalone report).
pub fn rank_all_rows(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    scorer: &dyn Scorer,
    score_opts: &ScoreOptions,
) -> Result<RankedScores> {
    let all_rows: Vec<usize> = (0..matrix.nrows()).collect();
    scorer.score_candidates(matrix, s, None, &[], &all_rows, score_opts)
}

fn resolve_seeds(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    scorer: &dyn Scorer,
    score_opts: &ScoreOptions,
    selection: &SeedSelection,
) -> Result<Vec<usize>> {
    match selection {
        SeedSelection::TopN(n) => {
            if *n > matrix.nrows() {
                return Err(SearchError::TopNExceedsRowCount {
                    top_n: *n,
                    rows: matrix.nrows(),
                });
            }
            let ranked = rank_all_rows(matrix, s, scorer, score_opts)?;
            Ok(ranked.into_iter().take(*n).map(|r| r.row_index).collect())
        }
        SeedSelection::Explicit(labels) => labels
            .iter()
            .map(|label| {
                matrix
                    .row_index_of(label)
                    .ok_or_else(|| SearchError::UnknownLabel {
                        kind: "search_start",
                        label: label.clone(),
                    })
            })
            .collect(),
    }
}

/// Runs the top-N driver end to end: resolve seeds, run D for each
/// independently (in parallel), and optionally select the best.
pub fn run_topn(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    scorer: &dyn Scorer,
    score_opts: &ScoreOptions,
    search_opts: &SearchOptions,
    selection: &SeedSelection,
    best_score_only: bool,
    cancelled: &CancellationToken,
) -> Result<TopNResult> {
    if cancelled.is_cancelled() {
        return Err(SearchError::Cancelled);
    }
    let seeds = resolve_seeds(matrix, s, scorer, score_opts, selection)?;

    let records: Vec<SearchRecord> = seeds
        .into_par_iter()
        .map(|seed| {
            run_search(
                matrix,
                s,
                seed,
                scorer,
                score_opts,
                search_opts,
                &|| cancelled.is_cancelled(),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    // A seed's search loop breaks cleanly on cancellation mid-walk rather
    // than erroring (SPEC_FULL.md §5: checked "between forward-backward
    // steps", not mid-step); the partial records collected here are
    // discarded in favor of a dedicated error, per "on cancellation,
    // partial results are discarded".
    if cancelled.is_cancelled() {
        return Err(SearchError::Cancelled);
    }

    let best = if best_score_only {
        records
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.best_score
                    .partial_cmp(&b.best_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    } else {
        None
    };

    Ok(TopNResult { records, best })
}
