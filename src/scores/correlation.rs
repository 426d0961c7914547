//! Pearson / Spearman correlation kernel (SPEC_FULL.md §4.2 "Correlation
//! kernel").

use crate::error::Result;
use crate::labeled_vector::LabeledVector;
use crate::matrix::{BinaryMatrix, BitRow};

use super::common::{
    eligible_candidates, sort_scores_desc, Alternative, CorrelationMethod, RankedScore,
    RankedScores, ScoreOptions, Scorer,
};

pub struct CorrelationScorer;

impl Scorer for CorrelationScorer {
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
                let score = score_row(s.values(), &combined, opts.cmethod, opts.alternative);
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
        Ok(score_row(s.values(), union, opts.cmethod, opts.alternative))
    }
}

fn score_row(
    s: &[f64],
    row: &BitRow,
    cmethod: CorrelationMethod,
    alternative: Alternative,
) -> f64 {
    let r: Vec<f64> = (0..row.len()).map(|j| if row.get(j) { 1.0 } else { 0.0 }).collect();
    let corr = match cmethod {
        CorrelationMethod::Pearson => pearson(s, &r),
        CorrelationMethod::Spearman => pearson(&rank_average_ties(s), &rank_average_ties(&r)),
    };
    match alternative {
        Alternative::TwoSided => corr.abs(),
        Alternative::Greater => corr,
        Alternative::Less => -corr,
    }
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    // "near-zero variance in correlation returns 0" (SPEC_FULL.md §7).
    if var_x <= 1e-12 || var_y <= 1e-12 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Average-rank transform (ties get the mean of the ranks they'd occupy).
fn rank_average_ties(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_positive_correlation() {
        let s = vec![1.0, 2.0, 3.0, 4.0];
        let mut row = BitRow::zeros(4);
        row.set(2);
        row.set(3);
        let score = score_row(&s, &row, CorrelationMethod::Pearson, Alternative::Greater);
        assert!(score > 0.7);
    }

    #[test]
    fn near_zero_variance_returns_zero() {
        let s = vec![1.0, 1.0, 1.0, 1.0];
        let mut row = BitRow::zeros(4);
        row.set(0);
        let score = score_row(&s, &row, CorrelationMethod::Pearson, Alternative::TwoSided);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn rank_average_ties_handles_duplicates() {
        let ranks = rank_average_ties(&[1.0, 2.0, 2.0, 3.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }
}
