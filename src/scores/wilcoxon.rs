//! Rank-sum (Wilcoxon / Mann-Whitney) kernel (SPEC_FULL.md §4.2 "Wilcoxon
//! kernel").

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::Result;
use crate::labeled_vector::LabeledVector;
use crate::matrix::{BinaryMatrix, BitRow};

use super::common::{
    desc_rank_order, eligible_candidates, neg_log_pvalue, sort_scores_desc, Alternative,
    RankedScore, RankedScores, ScoreOptions, Scorer, StatOrPval,
};

/// Below this sample size (per group) and with no ties, the exact null
/// distribution is used instead of the normal approximation (SPEC_FULL.md
/// §9 "Exact vs approximate distributions").
const EXACT_THRESHOLD: usize = 50;

pub struct WilcoxonScorer {
    pub mode: StatOrPval,
}

impl Scorer for WilcoxonScorer {
    fn score_candidates(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        meta_feature: Option<&BitRow>,
        _meta_feature_rows: &[usize],
        candidate_rows: &[usize],
        opts: &ScoreOptions,
    ) -> Result<RankedScores> {
        let order = desc_rank_order(s.values());
        let has_ties = has_tied_values(s.values());
        let scores = eligible_candidates(matrix, meta_feature, candidate_rows)
            .into_iter()
            .map(|(i, combined)| {
                let score = score_row(&order, &combined, has_ties, opts.alternative, self.mode);
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
        let order = desc_rank_order(s.values());
        let has_ties = has_tied_values(s.values());
        Ok(score_row(&order, union, has_ties, opts.alternative, self.mode))
    }
}

fn has_tied_values(values: &[f64]) -> bool {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    sorted.windows(2).any(|w| w[0] == w[1])
}

/// W = (sum of ranks where r=1) - n1(n1+1)/2, ranks assigned 1..N by
/// descending s (rank 1 = largest s), matching the KS kernel's ranking so
/// both kernels agree on rank direction.
fn rank_sum_w(order: &[usize], row: &BitRow) -> (f64, usize, usize) {
    let n1 = row.count_ones() as usize;
    let n0 = order.len() - n1;
    let mut sum_ranks = 0.0;
    for (pos, &j) in order.iter().enumerate() {
        if row.get(j) {
            sum_ranks += (pos + 1) as f64;
        }
    }
    let w = sum_ranks - (n1 * (n1 + 1)) as f64 / 2.0;
    (w, n1, n0)
}

fn score_row(
    order: &[usize],
    row: &BitRow,
    has_ties: bool,
    alternative: Alternative,
    mode: StatOrPval,
) -> f64 {
    let (w, n1, n0) = rank_sum_w(order, row);
    match mode {
        StatOrPval::Stat => match alternative {
            Alternative::Greater => w,
            Alternative::Less => -w,
            Alternative::TwoSided => w.abs(),
        },
        StatOrPval::Pval => {
            let use_exact = n1 < EXACT_THRESHOLD && n0 < EXACT_THRESHOLD && !has_ties;
            let p = if use_exact {
                exact_pvalue(w, n1, n0, alternative)
            } else {
                normal_approx_pvalue(w, n1, n0, alternative)
            };
            neg_log_pvalue(p)
        }
    }
}

fn normal_approx_pvalue(w: f64, n1: usize, n0: usize, alternative: Alternative) -> f64 {
    if n1 == 0 || n0 == 0 {
        return 1.0;
    }
    let n1f = n1 as f64;
    let n0f = n0 as f64;
    let mu = n1f * n0f / 2.0;
    let sigma = (n1f * n0f * (n1f + n0f + 1.0) / 12.0).sqrt();
    if sigma <= 0.0 {
        return 1.0;
    }
    let normal = Normal::new(0.0, 1.0).unwrap();
    match alternative {
        Alternative::Greater => {
            let z = (w - mu - 0.5) / sigma;
            1.0 - normal.cdf(z)
        }
        Alternative::Less => {
            let z = (w - mu + 0.5) / sigma;
            normal.cdf(z)
        }
        Alternative::TwoSided => {
            let z = ((w - mu).abs() - 0.5).max(0.0) / sigma;
            2.0 * (1.0 - normal.cdf(z))
        }
    }
    .clamp(0.0, 1.0)
}

fn exact_pvalue(w: f64, n1: usize, n0: usize, alternative: Alternative) -> f64 {
    if n1 == 0 || n0 == 0 {
        return 1.0;
    }
    let counts = exact_counts(n1, n0);
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 1.0;
    }
    let u = w.round().clamp(0.0, (n1 * n0) as f64) as usize;
    let p_le: f64 = counts[..=u].iter().sum::<f64>() / total;
    let p_ge: f64 = counts[u..].iter().sum::<f64>() / total;
    match alternative {
        Alternative::Less => p_le.clamp(0.0, 1.0),
        Alternative::Greater => p_ge.clamp(0.0, 1.0),
        Alternative::TwoSided => (2.0 * p_le.min(p_ge)).clamp(0.0, 1.0),
    }
}

/// Exact distribution of the Mann-Whitney U statistic for sample sizes
/// `(n1, n0)`, via the standard recurrence
/// `f(m,n,k) = f(m-1,n,k-n) + f(m,n-1,k)` with `f(0,n,0) = f(m,0,0) = 1`.
/// Returns `counts[k]` for `k` in `0..=n1*n0`.
fn exact_counts(n1: usize, n0: usize) -> Vec<f64> {
    let max_u = n1 * n0;
    let width = max_u + 1;

    // prev_m_row[n] holds f(m-1, n, *); starts at m=0.
    let mut prev_m_row: Vec<Vec<f64>> = (0..=n0)
        .map(|_| {
            let mut row = vec![0.0; width];
            row[0] = 1.0; // f(0, n, 0) = 1
            row
        })
        .collect();

    for _m in 1..=n1 {
        let mut cur_m_row: Vec<Vec<f64>> = Vec::with_capacity(n0 + 1);
        let mut n0_row = vec![0.0; width];
        n0_row[0] = 1.0; // f(m, 0, 0) = 1
        cur_m_row.push(n0_row);
        for n in 1..=n0 {
            let mut row = vec![0.0; width];
            for k in 0..width {
                let mut v = 0.0;
                if k >= n {
                    v += prev_m_row[n][k - n];
                }
                v += cur_m_row[n - 1][k];
                row[k] = v;
            }
            cur_m_row.push(row);
        }
        prev_m_row = cur_m_row;
    }

    prev_m_row[n0].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn exact_counts_sum_to_binomial_coefficient() {
        let counts = exact_counts(3, 4);
        let total: f64 = counts.iter().sum();
        // C(7,3) = 35
        assert!((total - 35.0).abs() < 1e-6);
    }

    #[test]
    fn rank_sum_matches_hand_computation() {
        let s = LabeledVector::new(
            (0..5).map(|i| Arc::from(format!("c{i}").as_str())).collect(),
            vec![5.0, 4.0, 3.0, 2.0, 1.0],
        )
        .unwrap();
        let order = desc_rank_order(s.values());
        let mut row = BitRow::zeros(5);
        row.set(0);
        row.set(1);
        let (w, n1, n0) = rank_sum_w(&order, &row);
        // ranks of columns 0,1 are 1 and 2 -> sum=3, n1=2 -> W = 3 - 3 = 0
        assert_eq!(n1, 2);
        assert_eq!(n0, 3);
        assert_eq!(w, 0.0);
    }
}
