//! k-nearest-neighbor mutual information kernel (SPEC_FULL.md §4.2 "k-NN MI
//! kernel"), the Ross (2014) mixed discrete/continuous estimator: `s` is
//! treated as the continuous variable and the (possibly OR-combined)
//! candidate row as the discrete label.

use statrs::function::gamma::digamma;

use crate::error::Result;
use crate::labeled_vector::LabeledVector;
use crate::matrix::{BinaryMatrix, BitRow};

use super::common::{eligible_candidates, sort_scores_desc, RankedScore, RankedScores, ScoreOptions, Scorer};

pub struct KnnMiScorer;

impl Scorer for KnnMiScorer {
    fn score_candidates(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        meta_feature: Option<&BitRow>,
        _meta_feature_rows: &[usize],
        candidate_rows: &[usize],
        opts: &ScoreOptions,
    ) -> Result<RankedScores> {
        let scores = eligible_candidates(matrix, meta_feature, candidate_rows)
            .into_iter()
            .map(|(i, combined)| {
                let score = knn_mi(s.values(), &combined, opts.knn_k);
                RankedScore {
                    row_index: i,
                    label: matrix.row_label(i).clone(),
                    score,
                }
            })
            .collect();
        Ok(sort_scores_desc(scores))
    }

    fn score_union(&self, _matrix: &BinaryMatrix, s: &LabeledVector, union: &BitRow, opts: &ScoreOptions) -> Result<f64> {
        Ok(knn_mi(s.values(), union, opts.knn_k))
    }
}

/// `I(X;Y) = psi(N) - <psi(N_y)> + psi(k) - <psi(m + 1)>`, Ross (2014),
/// for continuous `X = s` and discrete label `Y = r`.
fn knn_mi(s: &[f64], r: &BitRow, k: usize) -> f64 {
    let n = s.len();
    if n < 2 || k == 0 {
        return 0.0;
    }
    let labels: Vec<bool> = (0..r.len()).map(|j| r.get(j)).collect();
    let n_true = labels.iter().filter(|&&b| b).count();
    let n_false = n - n_true;

    let mut sum_psi_ny = 0.0;
    let mut sum_psi_m = 0.0;

    for i in 0..n {
        let same_label_idx: Vec<usize> = (0..n).filter(|&j| j != i && labels[j] == labels[i]).collect();
        let n_y = if labels[i] { n_true } else { n_false };
        sum_psi_ny += digamma(n_y as f64);

        let kk = k.min(same_label_idx.len());
        let eps = if kk == 0 {
            // No same-label neighbor at all: fall back to the full-sample
            // scale so `m` below degenerates to "everyone within range".
            f64::INFINITY
        } else {
            let mut dists: Vec<f64> = same_label_idx.iter().map(|&j| (s[i] - s[j]).abs()).collect();
            dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
            dists[kk - 1]
        };

        let m = if eps.is_infinite() {
            n - 1
        } else {
            (0..n)
                .filter(|&j| j != i && (s[i] - s[j]).abs() < eps)
                .count()
        };
        sum_psi_m += digamma((m + 1) as f64);
    }

    let nf = n as f64;
    let mi = digamma(nf) - sum_psi_ny / nf + digamma(k as f64) - sum_psi_m / nf;
    mi.max(0.0)
}
