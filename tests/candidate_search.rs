//! Integration tests encoding the seeded concrete scenarios and boundary
//! behaviors of SPEC_FULL.md §8.

use std::sync::Arc;

use cadra_search::scores::{Alternative, CorrelationMethod, Method, ScoreOptions};
use cadra_search::search::{SearchMethod, SearchOptions};
use cadra_search::{
    candidate_search, candidate_search_cancellable, candidate_search_with_permutation,
    BinaryMatrix, CancellationToken, LabeledVector, SearchError, SeedSelection,
};

fn labels(names: &[&str]) -> Vec<Arc<str>> {
    names.iter().map(|s| Arc::from(*s)).collect()
}

fn sample_labels(n: usize) -> Vec<Arc<str>> {
    (0..n).map(|i| Arc::from(format!("s{i}").as_str())).collect()
}

/// Scenario 1/2's toy 3x10 matrix: TP_1, TP_2, TP_3 as in SPEC_FULL.md §8.
fn toy_matrix() -> BinaryMatrix {
    BinaryMatrix::from_dense(
        labels(&["TP_1", "TP_2", "TP_3"]),
        sample_labels(10),
        vec![
            vec![1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
        ],
    )
    .unwrap()
}

/// A fixed-seed substitute for `rnorm(10)`.
fn toy_scores() -> LabeledVector {
    LabeledVector::new(
        sample_labels(10),
        vec![
            1.37, -0.56, 0.36, 0.63, 0.40, -0.11, 1.51, -0.09, -0.94, -1.98,
        ],
    )
    .unwrap()
}

fn default_search_opts(search_method: SearchMethod, max_size: usize) -> SearchOptions {
    SearchOptions {
        search_method,
        max_size,
    }
}

#[test]
fn scenario_1_ks_pvalue_is_deterministic() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let score_opts = ScoreOptions {
        alternative: Alternative::Less,
        ..Default::default()
    };
    let search_opts = default_search_opts(SearchMethod::Forward, 3);

    let run = |s: &LabeledVector| {
        candidate_search(
            &matrix,
            s,
            Method::KsPval,
            &score_opts,
            &search_opts,
            &SeedSelection::TopN(1),
            false,
        )
        .unwrap()
    };

    let a = run(&s);
    let b = run(&s);
    assert_eq!(a.records[0].feature_set, b.records[0].feature_set);
    assert_eq!(a.records[0].best_score, b.records[0].best_score);
}

#[test]
fn scenario_2_wilcoxon_pvalue_seeds_from_rank_sum() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let score_opts = ScoreOptions {
        alternative: Alternative::Less,
        ..Default::default()
    };
    let search_opts = default_search_opts(SearchMethod::Forward, 3);

    let result = candidate_search(
        &matrix,
        &s,
        Method::WilcoxPval,
        &score_opts,
        &search_opts,
        &SeedSelection::TopN(1),
        false,
    )
    .unwrap();
    assert_eq!(result.records.len(), 1);
    assert!(!result.records[0].feature_set.is_empty());
}

#[test]
fn scenario_3_spearman_correlation_ranks_every_row() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let score_opts = ScoreOptions {
        cmethod: CorrelationMethod::Spearman,
        ..Default::default()
    };
    let search_opts = default_search_opts(SearchMethod::Forward, 3);

    let ranked = cadra_search::topn::rank_all_rows(
        &matrix,
        &s,
        cadra_search::make_scorer(Method::Correlation).as_ref(),
        &score_opts,
    )
    .unwrap();
    let mut row_labels: Vec<_> = ranked.iter().map(|r| r.label.clone()).collect();
    row_labels.sort();
    let mut expected = matrix.row_labels().to_vec();
    expected.sort();
    assert_eq!(row_labels, expected);

    // search itself still runs end to end under the same config.
    let _ = candidate_search(
        &matrix,
        &s,
        Method::Correlation,
        &score_opts,
        &search_opts,
        &SeedSelection::TopN(1),
        false,
    )
    .unwrap();
}

struct KsMirror;

impl cadra_search::scores::CustomScorer for KsMirror {
    fn score(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        meta_feature_rows: &[usize],
        opts: &ScoreOptions,
    ) -> cadra_search::Result<cadra_search::scores::RankedScores> {
        let ks = cadra_search::make_scorer(Method::KsPval);
        let candidate_rows: Vec<usize> = (0..matrix.nrows())
            .filter(|i| !meta_feature_rows.contains(i))
            .collect();
        let union = if meta_feature_rows.is_empty() {
            None
        } else {
            Some(matrix.or_union(meta_feature_rows))
        };
        ks.score_candidates(matrix, s, union.as_ref(), meta_feature_rows, &candidate_rows, opts)
    }

    fn score_union(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        union: &cadra_search::BitRow,
        opts: &ScoreOptions,
    ) -> cadra_search::Result<f64> {
        cadra_search::make_scorer(Method::KsPval).score_union(matrix, s, union, opts)
    }
}

#[test]
fn scenario_4_custom_kernel_matches_ks() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let base_opts = ScoreOptions {
        alternative: Alternative::Less,
        ..Default::default()
    };
    let search_opts = default_search_opts(SearchMethod::Forward, 3);

    let ks_result = candidate_search(
        &matrix,
        &s,
        Method::KsPval,
        &base_opts,
        &search_opts,
        &SeedSelection::TopN(1),
        false,
    )
    .unwrap();

    let custom_opts = ScoreOptions {
        custom: Some(Arc::new(KsMirror) as Arc<dyn cadra_search::scores::CustomScorer>),
        ..base_opts.clone()
    };
    let custom_result = candidate_search(
        &matrix,
        &s,
        Method::Custom,
        &custom_opts,
        &search_opts,
        &SeedSelection::TopN(1),
        false,
    )
    .unwrap();

    assert_eq!(
        ks_result.records[0].feature_set,
        custom_result.records[0].feature_set
    );
    assert_eq!(
        ks_result.records[0].best_score,
        custom_result.records[0].best_score
    );
}

#[test]
fn scenario_5_permutation_smoothing() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let score_opts = ScoreOptions {
        alternative: Alternative::Less,
        ..Default::default()
    };
    let search_opts = default_search_opts(SearchMethod::Forward, 3);
    let perm_opts = cadra_search::PermutationOptions {
        n_perm: 1000,
        seed: 7,
        failure_threshold: 0.25,
    };

    let run = || {
        candidate_search_with_permutation(
            &matrix,
            &s,
            Method::KsPval,
            &score_opts,
            &search_opts,
            &SeedSelection::TopN(1),
            false,
            &perm_opts,
        )
        .unwrap()
    };

    let a = run();
    assert_eq!(a.null.len(), 1000);
    assert!(a.null.iter().all(|v| v.is_finite()));
    assert!(a.p_value >= 1.0 / 1001.0 && a.p_value <= 1.0);

    let b = run();
    assert_eq!(a.p_value, b.p_value);
    assert_eq!(a.null, b.null);
}

/// A deterministic stand-in scorer (method=custom) that maps every
/// reachable union pattern to a scripted score, so the forward/backward
/// walk this drives is pinned exactly rather than inferred from a real
/// kernel's numerics.
struct ScriptedScorer {
    scores: std::collections::HashMap<Vec<usize>, f64>,
}

impl ScriptedScorer {
    fn score_for(&self, ones: &[usize]) -> f64 {
        let mut key = ones.to_vec();
        key.sort_unstable();
        *self.scores.get(&key).unwrap_or(&f64::NEG_INFINITY)
    }
}

impl cadra_search::scores::CustomScorer for ScriptedScorer {
    fn score(
        &self,
        matrix: &BinaryMatrix,
        _s: &LabeledVector,
        meta_feature_rows: &[usize],
        _opts: &ScoreOptions,
    ) -> cadra_search::Result<cadra_search::scores::RankedScores> {
        let union = if meta_feature_rows.is_empty() {
            None
        } else {
            Some(matrix.or_union(meta_feature_rows))
        };
        let mut out: cadra_search::scores::RankedScores = (0..matrix.nrows())
            .filter(|i| !meta_feature_rows.contains(i))
            .map(|i| {
                let combined = match &union {
                    Some(u) => matrix.row(i).or(u),
                    None => matrix.row(i).clone(),
                };
                let score = self.score_for(&combined.iter_ones().collect::<Vec<_>>());
                cadra_search::scores::RankedScore {
                    row_index: i,
                    label: matrix.row_label(i).clone(),
                    score,
                }
            })
            .collect();
        out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        Ok(out)
    }

    fn score_union(
        &self,
        _matrix: &BinaryMatrix,
        _s: &LabeledVector,
        union: &cadra_search::BitRow,
        _opts: &ScoreOptions,
    ) -> cadra_search::Result<f64> {
        Ok(self.score_for(&union.iter_ones().collect::<Vec<_>>()))
    }
}

#[test]
fn scenario_6_backward_step_triggers() {
    // Four single-feature rows (seed, A, B, C); a scripted scorer drives the
    // walk so forward adds A, then B, then C (reaching max_size=4), after
    // which removing A strictly beats the full union — forcing exactly one
    // backward step — and the resulting trimmed state is stable.
    let matrix = BinaryMatrix::from_dense(
        labels(&["seed", "A", "B", "C"]),
        sample_labels(6),
        vec![
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        ],
    )
    .unwrap();
    let s = LabeledVector::new(sample_labels(6), vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0]).unwrap();

    let scores: std::collections::HashMap<Vec<usize>, f64> = [
        (vec![0], 1.0),             // seed alone (seed score)
        (vec![0, 1], 2.0),          // seed+A
        (vec![0, 2], 0.5),          // seed+B
        (vec![0, 3], 0.5),          // seed+C
        (vec![0, 1, 2], 3.0),       // seed+A+B
        (vec![0, 1, 3], 0.5),       // seed+A+C
        (vec![0, 1, 2, 3], 4.0),    // seed+A+B+C (full union)
        (vec![1, 2, 3], 0.1),       // A+B+C (seed removed)
        (vec![0, 2, 3], 5.0),       // seed+B+C (A removed) -- the backward win
        (vec![2, 3], 0.1),          // B+C (seed removed, 2nd backward attempt)
    ]
    .into_iter()
    .collect();

    let score_opts = ScoreOptions {
        custom: Some(std::sync::Arc::new(ScriptedScorer { scores })),
        ..Default::default()
    };
    let search_opts = default_search_opts(SearchMethod::Both, 4);

    let result = candidate_search(
        &matrix,
        &s,
        Method::Custom,
        &score_opts,
        &search_opts,
        &SeedSelection::Explicit(vec!["seed".to_string()]),
        false,
    )
    .unwrap();
    let record = &result.records[0];

    let removed_steps: Vec<_> = record.trajectory.iter().filter(|t| !t.added).collect();
    assert_eq!(removed_steps.len(), 1, "backward branch must trigger exactly once");
    assert_eq!(removed_steps[0].row_label.as_ref(), "A");

    let added_labels: Vec<&str> = record
        .trajectory
        .iter()
        .filter(|t| t.added)
        .map(|t| t.row_label.as_ref())
        .collect();
    assert_eq!(added_labels, vec!["A", "B", "C"]);

    assert_eq!(record.best_score, 5.0);
    let mut final_features = record.best_features.iter().map(|l| l.as_ref()).collect::<Vec<_>>();
    final_features.sort();
    assert_eq!(final_features, vec!["B", "C", "seed"]);

    // Cumulative must track best_score exactly at each step; marginal is the
    // per-step gain over the running best score, so it differs from
    // cumulative as soon as the trajectory has more than one step.
    assert_eq!(record.cumulative_scores, vec![2.0, 3.0, 4.0, 5.0]);
    assert_eq!(record.marginal_scores, vec![1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn boundary_n2_smallest_nondegenerate_input() {
    let matrix = BinaryMatrix::from_dense(
        labels(&["f1", "f2"]),
        sample_labels(2),
        vec![vec![1.0, 0.0], vec![0.0, 1.0]],
    )
    .unwrap();
    let s = LabeledVector::new(sample_labels(2), vec![1.0, 2.0]).unwrap();
    let result = candidate_search(
        &matrix,
        &s,
        Method::KsStat,
        &ScoreOptions::default(),
        &default_search_opts(SearchMethod::Forward, 2),
        &SeedSelection::TopN(1),
        false,
    )
    .unwrap();
    assert_eq!(result.records.len(), 1);
}

#[test]
fn boundary_max_size_one_stops_at_seed() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let result = candidate_search(
        &matrix,
        &s,
        Method::KsStat,
        &ScoreOptions::default(),
        &default_search_opts(SearchMethod::Forward, 1),
        &SeedSelection::TopN(1),
        false,
    )
    .unwrap();
    assert_eq!(result.records[0].feature_set.len(), 1);
    assert!(result.records[0].trajectory.is_empty());
}

#[test]
fn boundary_all_zero_weights_rejected() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let weights = LabeledVector::new(sample_labels(10), vec![0.0; 10]).unwrap();
    let score_opts = ScoreOptions {
        weights: Some(weights),
        ..Default::default()
    };
    let err = candidate_search(
        &matrix,
        &s,
        Method::KsStat,
        &score_opts,
        &default_search_opts(SearchMethod::Forward, 3),
        &SeedSelection::TopN(1),
        false,
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::AllZeroWeights));
}

#[test]
fn cancellation_token_aborts_with_dedicated_error() {
    let matrix = toy_matrix();
    let s = toy_scores();
    let token = CancellationToken::new();
    token.cancel();

    let err = candidate_search_cancellable(
        &matrix,
        &s,
        Method::KsStat,
        &ScoreOptions::default(),
        &default_search_opts(SearchMethod::Forward, 3),
        &SeedSelection::TopN(1),
        false,
        &token,
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::Cancelled));
}

#[test]
fn boundary_identical_rows_tie_break_deterministically() {
    let matrix = BinaryMatrix::from_dense(
        labels(&["twin_a", "twin_b", "other"]),
        sample_labels(6),
        vec![
            vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 1.0, 1.0, 0.0],
        ],
    )
    .unwrap();
    let s = LabeledVector::new(sample_labels(6), vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0]).unwrap();

    let ranked = cadra_search::topn::rank_all_rows(
        &matrix,
        &s,
        cadra_search::make_scorer(Method::KsStat).as_ref(),
        &ScoreOptions {
            alternative: Alternative::Greater,
            ..Default::default()
        },
    )
    .unwrap();
    // twin_a and twin_b score identically; lexicographic order breaks the
    // tie so the ranking (and hence seeding) is deterministic.
    assert_eq!(ranked[0].score, ranked[1].score);
    assert!(ranked[0].label < ranked[1].label);
}
