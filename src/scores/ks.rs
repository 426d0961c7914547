//! Weighted one-sided/two-sided Kolmogorov-Smirnov kernel (SPEC_FULL.md
//! §4.2 "KS kernel").

use crate::error::Result;
use crate::labeled_vector::LabeledVector;
use crate::matrix::{BinaryMatrix, BitRow};

use super::common::{
    desc_rank_order, eligible_candidates, neg_log_pvalue, sort_scores_desc, Alternative,
    RankedScore, RankedScores, ScoreOptions, Scorer, StatOrPval,
};

pub struct KsScorer {
    pub mode: StatOrPval,
}

impl Scorer for KsScorer {
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
        let weights = opts.weights.as_ref().map(|w| w.values());
        let scores = eligible_candidates(matrix, meta_feature, candidate_rows)
            .into_iter()
            .map(|(i, combined)| {
                let score = score_row(&order, &combined, weights, opts.alternative, self.mode);
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
        let weights = opts.weights.as_ref().map(|w| w.values());
        Ok(score_row(
            &order,
            union,
            weights,
            opts.alternative,
            self.mode,
        ))
    }
}

/// Returns (signed statistic per `alternative`, unweighted two-sample D).
fn ks_statistics(
    order: &[usize],
    row: &BitRow,
    weights: Option<&[f64]>,
) -> (f64, f64, f64, usize, usize) {
    let n1_total: f64 = match weights {
        Some(w) => order.iter().filter(|&&j| row.get(j)).map(|&j| w[j]).sum(),
        None => row.count_ones() as f64,
    };
    let n1 = row.count_ones() as usize;
    let n0 = order.len() - n1;

    let mut cum1 = 0.0;
    let mut cum0 = 0.0;
    let mut d_plus: f64 = f64::MIN; // max(F1 - F0)
    let mut d_minus: f64 = f64::MIN; // max(F0 - F1)
    let mut d_abs: f64 = 0.0;

    for &j in order {
        if row.get(j) {
            cum1 += match weights {
                Some(w) => w[j],
                None => 1.0,
            };
        } else {
            cum0 += 1.0;
        }
        let f1 = if n1_total > 0.0 { cum1 / n1_total } else { 0.0 };
        let f0 = if n0 > 0 { cum0 / n0 as f64 } else { 0.0 };
        let diff = f1 - f0;
        if diff > d_plus {
            d_plus = diff;
        }
        if -diff > d_minus {
            d_minus = -diff;
        }
        if diff.abs() > d_abs {
            d_abs = diff.abs();
        }
    }

    (d_plus.max(0.0), d_minus.max(0.0), d_abs, n1, n0)
}

fn score_row(
    order: &[usize],
    row: &BitRow,
    weights: Option<&[f64]>,
    alternative: Alternative,
    mode: StatOrPval,
) -> f64 {
    let (d_plus, d_minus, d_abs, n1, n0) = ks_statistics(order, row, weights);
    let signed_stat = match alternative {
        Alternative::Greater => d_plus,
        Alternative::Less => d_minus,
        Alternative::TwoSided => d_abs,
    };

    match mode {
        StatOrPval::Stat => signed_stat,
        StatOrPval::Pval => {
            // "for weighted data the statistic mode is authoritative and
            // p-value mode must still emit the unweighted p" (SPEC_FULL.md
            // §4.2, §9 Open Question (i)). Recompute D on the unweighted
            // data for the p-value, regardless of `weights`.
            let (u_plus, u_minus, u_abs, _, _) = if weights.is_some() {
                ks_statistics(order, row, None)
            } else {
                (d_plus, d_minus, d_abs, n1, n0)
            };
            let d = match alternative {
                Alternative::Greater => u_plus,
                Alternative::Less => u_minus,
                Alternative::TwoSided => u_abs,
            };
            let p = kolmogorov_pvalue(d, n1, n0, alternative);
            neg_log_pvalue(p)
        }
    }
}

/// Asymptotic two-sample Kolmogorov-Smirnov p-value.
fn kolmogorov_pvalue(d: f64, n1: usize, n0: usize, alternative: Alternative) -> f64 {
    if n1 == 0 || n0 == 0 || d <= 0.0 {
        return 1.0;
    }
    let en = (n1 as f64 * n0 as f64) / (n1 + n0) as f64;
    match alternative {
        Alternative::TwoSided => {
            let lambda = (en.sqrt() + 0.12 + 0.11 / en.sqrt()) * d;
            kolmogorov_survival(lambda)
        }
        Alternative::Less | Alternative::Greater => (-2.0 * en * d * d).exp().clamp(0.0, 1.0),
    }
}

/// P(K >= lambda) for the Kolmogorov distribution, via the standard
/// alternating series.
fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let mut total = 0.0;
    for k in 1..=100 {
        let term = (-2.0 * (k * k) as f64 * lambda * lambda).exp();
        total += if k % 2 == 1 { term } else { -term };
        if term < 1e-12 {
            break;
        }
    }
    (2.0 * total).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn separated_groups_have_large_statistic() {
        // s descending already; row is 1 exactly for the top half.
        let s = LabeledVector::new(
            (0..8).map(|i| Arc::from(format!("c{i}").as_str())).collect(),
            vec![8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0],
        )
        .unwrap();
        let mut row = BitRow::zeros(8);
        for j in 0..4 {
            row.set(j);
        }
        let order = desc_rank_order(s.values());
        let (d_plus, _, _, _, _) = ks_statistics(&order, &row, None);
        assert!(d_plus > 0.9);
    }

    #[test]
    fn pvalue_is_in_unit_interval() {
        let p = kolmogorov_pvalue(0.5, 10, 10, Alternative::TwoSided);
        assert!((0.0..=1.0).contains(&p));
    }
}
