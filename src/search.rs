//! Meta-feature state (C) and the forward/backward search engine (D),
//! SPEC_FULL.md §4.3.

use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::matrix::{BinaryMatrix, BitRow};
use crate::labeled_vector::LabeledVector;
use crate::scores::{RankedScores, ScoreOptions, Scorer};

/// `search_method` configuration option (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", clap(rename_all = "snake_case"))]
pub enum SearchMethod {
    Forward,
    Both,
}

/// Search-engine configuration independent of the scoring kernel.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub search_method: SearchMethod,
    pub max_size: usize,
}

/// A single accepted step of the trajectory (SPEC_FULL.md §3 "history").
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrajectoryStep {
    pub step_index: usize,
    pub added: bool,
    pub row_label: Arc<str>,
    pub marginal_score: f64,
    pub cumulative_score: f64,
}

/// Meta-feature state (C): the current union, its member rows, and the
/// trajectory recorded so far.
#[derive(Debug, Clone)]
pub struct MetaFeatureState {
    pub selected_indices: Vec<usize>,
    pub union_vector: BitRow,
    pub best_score: f64,
    pub trajectory: Vec<TrajectoryStep>,
}

impl MetaFeatureState {
    fn seeded(matrix: &BinaryMatrix, seed_row: usize, seed_score: f64) -> Self {
        Self {
            selected_indices: vec![seed_row],
            union_vector: matrix.row(seed_row).clone(),
            best_score: seed_score,
            trajectory: Vec::new(),
        }
    }
}

/// The frozen result of running D to completion from one seed (the "score
/// record" of SPEC_FULL.md §3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchRecord {
    pub seed_label: Arc<str>,
    pub feature_set: Vec<usize>,
    pub best_features: Vec<Arc<str>>,
    pub best_score: f64,
    pub marginal_scores: Vec<f64>,
    pub cumulative_scores: Vec<f64>,
    pub trajectory: Vec<TrajectoryStep>,
    /// Sample indices where the final union vector is 1 (the persisted
    /// union bit vector, SPEC_FULL.md §6 "Persisted artifacts").
    pub union_ones: Vec<usize>,
}

/// Runs the full forward/backward search from a single seed row to
/// completion (SPEC_FULL.md §4.3 "Main loop").
pub fn run_search(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    seed_row: usize,
    scorer: &dyn Scorer,
    score_opts: &ScoreOptions,
    search_opts: &SearchOptions,
    cancel: &dyn Fn() -> bool,
) -> Result<SearchRecord> {
    let seed_score = scorer.score_union(matrix, s, matrix.row(seed_row), score_opts)?;
    let mut state = MetaFeatureState::seeded(matrix, seed_row, seed_score);

    loop {
        if cancel() {
            break;
        }
        let mut progressed = false;

        if state.selected_indices.len() < search_opts.max_size {
            if let Some(outcome) = forward_step(matrix, s, scorer, score_opts, &state)? {
                apply_forward(matrix, &mut state, outcome);
                progressed = true;
            }
        }

        if !progressed
            && search_opts.search_method == SearchMethod::Both
            && state.selected_indices.len() >= 3
        {
            if let Some(outcome) = backward_step(matrix, s, scorer, score_opts, &state)? {
                apply_backward(matrix, &mut state, outcome);
                progressed = true;
            }
        }

        if !progressed {
            break;
        }
    }

    let best_features = state
        .selected_indices
        .iter()
        .map(|&i| matrix.row_label(i).clone())
        .collect();
    let marginal_scores = state.trajectory.iter().map(|t| t.marginal_score).collect();
    let cumulative_scores = state.trajectory.iter().map(|t| t.cumulative_score).collect();
    let union_ones = state.union_vector.iter_ones().collect();

    Ok(SearchRecord {
        seed_label: matrix.row_label(seed_row).clone(),
        feature_set: state.selected_indices.clone(),
        best_features,
        best_score: state.best_score,
        marginal_scores,
        cumulative_scores,
        trajectory: state.trajectory,
        union_ones,
    })
}

struct ForwardOutcome {
    row_index: usize,
    label: Arc<str>,
    score: f64,
}

fn forward_step(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    scorer: &dyn Scorer,
    score_opts: &ScoreOptions,
    state: &MetaFeatureState,
) -> Result<Option<ForwardOutcome>> {
    let candidate_rows: Vec<usize> = (0..matrix.nrows())
        .filter(|i| !state.selected_indices.contains(i))
        .collect();
    if candidate_rows.is_empty() {
        return Ok(None);
    }

    let scores = scorer.score_candidates(
        matrix,
        s,
        Some(&state.union_vector),
        &state.selected_indices,
        &candidate_rows,
        score_opts,
    )?;

    if scores.is_empty() {
        warn!("every candidate row became all-ones after OR with the meta-feature; search terminates");
        return Ok(None);
    }

    let winner = pick_tie_broken(&scores, matrix, &state.union_vector);
    if winner.score <= state.best_score {
        return Ok(None);
    }
    Ok(Some(ForwardOutcome {
        row_index: winner.row_index,
        label: winner.label.clone(),
        score: winner.score,
    }))
}

fn apply_forward(matrix: &BinaryMatrix, state: &mut MetaFeatureState, outcome: ForwardOutcome) {
    // Marginal = the gain this step contributed over the running best score
    // (SPEC_FULL.md §4.3 "Marginal vs cumulative scores"); cumulative is the
    // absolute score after the step. Captured before `best_score` is
    // overwritten below so the two trajectories don't collapse into copies
    // of each other.
    let marginal_score = outcome.score - state.best_score;
    state.union_vector.or_assign(matrix.row(outcome.row_index));
    state.selected_indices.push(outcome.row_index);
    state.best_score = outcome.score;
    state.trajectory.push(TrajectoryStep {
        step_index: state.trajectory.len(),
        added: true,
        row_label: outcome.label,
        marginal_score,
        cumulative_score: outcome.score,
    });
}

struct BackwardOutcome {
    removed_index: usize,
    removed_label: Arc<str>,
    score: f64,
}

fn backward_step(
    matrix: &BinaryMatrix,
    s: &LabeledVector,
    scorer: &dyn Scorer,
    score_opts: &ScoreOptions,
    state: &MetaFeatureState,
) -> Result<Option<BackwardOutcome>> {
    let mut best: Option<BackwardOutcome> = None;
    for &j in &state.selected_indices {
        let remaining: Vec<usize> = state
            .selected_indices
            .iter()
            .copied()
            .filter(|&i| i != j)
            .collect();
        let union_minus_j = matrix.or_union(&remaining);
        let score = scorer.score_union(matrix, s, &union_minus_j, score_opts)?;
        let popcount = union_minus_j.count_ones();
        let label = matrix.row_label(j);

        let replace = match &best {
            None => true,
            Some(b) => {
                if score > b.score {
                    true
                } else if score == b.score {
                    let b_popcount = matrix
                        .or_union(
                            &state
                                .selected_indices
                                .iter()
                                .copied()
                                .filter(|&i| i != b.removed_index)
                                .collect::<Vec<_>>(),
                        )
                        .count_ones();
                    popcount < b_popcount || (popcount == b_popcount && label < &b.removed_label)
                } else {
                    false
                }
            }
        };
        if replace {
            best = Some(BackwardOutcome {
                removed_index: j,
                removed_label: label.clone(),
                score,
            });
        }
    }

    match best {
        Some(outcome) if outcome.score > state.best_score => Ok(Some(outcome)),
        _ => Ok(None),
    }
}

fn apply_backward(matrix: &BinaryMatrix, state: &mut MetaFeatureState, outcome: BackwardOutcome) {
    let marginal_score = outcome.score - state.best_score;
    state.selected_indices.retain(|&i| i != outcome.removed_index);
    state.union_vector = matrix.or_union(&state.selected_indices);
    state.best_score = outcome.score;
    state.trajectory.push(TrajectoryStep {
        step_index: state.trajectory.len(),
        added: false,
        row_label: outcome.removed_label,
        marginal_score,
        cumulative_score: outcome.score,
    });
}

/// Among the rows tied for the top score, picks the one whose resulting
/// union has the smallest popcount, then the lexicographically smallest
/// label (SPEC_FULL.md §9 Open Question (ii)).
fn pick_tie_broken<'a>(
    scores: &'a RankedScores,
    matrix: &BinaryMatrix,
    union: &BitRow,
) -> &'a crate::scores::RankedScore {
    let top_score = scores[0].score;
    scores
        .iter()
        .take_while(|r| r.score == top_score)
        .min_by(|a, b| {
            let pa = matrix.row(a.row_index).or(union).count_ones();
            let pb = matrix.row(b.row_index).or(union).count_ones();
            pa.cmp(&pb).then_with(|| a.label.cmp(&b.label))
        })
        .expect("scores is non-empty")
}
