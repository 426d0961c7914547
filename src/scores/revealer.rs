//! Conditional mutual information kernel (SPEC_FULL.md §4.2 "REVEALER
//! kernel").
//!
//! `I(S;R|U) = H(S,U) + H(R,U) - H(U) - H(S,R,U)` is computed via the
//! equivalent conditional-entropy decomposition
//! `I(S;R|U) = sum_u P(U=u) * (H(S|U=u) - sum_r P(R=r|U=u) H(S|U=u,R=r))`,
//! which only ever needs the differential entropy of `S` restricted to a
//! (discrete) stratum — avoiding a literal joint density estimate over a
//! mixed continuous/discrete triple. Each `H(S|...)` is a 1-D Gaussian-KDE
//! plug-in entropy estimate (Silverman bandwidth, resubstitution).
//!
//! Contract note: unlike the other kernels, the candidate row `r` here is
//! the *raw* feature row, not OR-combined with the meta-feature union —
//! REVEALER conditions on `u` rather than absorbing it (SPEC_FULL.md §4.2).

use crate::error::Result;
use crate::labeled_vector::LabeledVector;
use crate::matrix::{BinaryMatrix, BitRow};

use super::common::{eligible_candidates, sort_scores_desc, RankedScore, RankedScores, ScoreOptions, Scorer};

pub struct RevealerScorer;

impl Scorer for RevealerScorer {
    fn score_candidates(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        meta_feature: Option<&BitRow>,
        _meta_feature_rows: &[usize],
        candidate_rows: &[usize],
        _opts: &ScoreOptions,
    ) -> Result<RankedScores> {
        // Eligibility (all-ones after OR with the union) is shared across
        // kernels; REVEALER then re-derives the raw row for the actual
        // conditional-MI computation.
        let eligible = eligible_candidates(matrix, meta_feature, candidate_rows);
        let scores = eligible
            .into_iter()
            .map(|(i, _combined)| {
                let raw = matrix.row(i);
                let score = conditional_mi(s.values(), raw, meta_feature);
                RankedScore {
                    row_index: i,
                    label: matrix.row_label(i).clone(),
                    score,
                }
            })
            .collect();
        Ok(sort_scores_desc(scores))
    }

    fn score_union(&self, _matrix: &BinaryMatrix, s: &LabeledVector, union: &BitRow, _opts: &ScoreOptions) -> Result<f64> {
        // "Symmetric" stopping-check score: unconditional I(S;U), there is
        // nothing left to condition on once the candidate itself is the
        // whole meta-feature.
        Ok(conditional_mi(s.values(), union, None))
    }
}

fn conditional_mi(s: &[f64], r: &BitRow, u: Option<&BitRow>) -> f64 {
    match u {
        None => mutual_information(s, &bits_of(r, 0..r.len())),
        Some(u) => {
            let n = s.len() as f64;
            let mut acc = 0.0;
            for u_val in [false, true] {
                let idx: Vec<usize> = (0..r.len()).filter(|&j| u.get(j) == u_val).collect();
                if idx.len() < 2 {
                    continue;
                }
                let s_u: Vec<f64> = idx.iter().map(|&j| s[j]).collect();
                let r_u: Vec<bool> = idx.iter().map(|&j| r.get(j)).collect();
                let weight = idx.len() as f64 / n;
                acc += weight * mutual_information(&s_u, &r_u);
            }
            acc
        }
    }
}

fn bits_of(row: &BitRow, range: std::ops::Range<usize>) -> Vec<bool> {
    range.map(|j| row.get(j)).collect()
}

/// I(S;R) = H(S) - sum_r P(R=r) H(S|R=r), each H via KDE entropy.
fn mutual_information(s: &[f64], r: &[bool]) -> f64 {
    if s.len() < 2 {
        return 0.0;
    }
    let h_s = kde_entropy(s);
    let n = s.len() as f64;
    let s0: Vec<f64> = s.iter().zip(r).filter(|(_, &b)| !b).map(|(&v, _)| v).collect();
    let s1: Vec<f64> = s.iter().zip(r).filter(|(_, &b)| b).map(|(&v, _)| v).collect();
    let h_cond = (s0.len() as f64 / n) * kde_entropy(&s0) + (s1.len() as f64 / n) * kde_entropy(&s1);
    (h_s - h_cond).max(0.0)
}

/// Gaussian-kernel plug-in (resubstitution) differential entropy estimate
/// with Silverman's rule-of-thumb bandwidth.
fn kde_entropy(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = xs.iter().sum::<f64>() / nf;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (nf - 1.0).max(1.0);
    let std = var.sqrt();
    if std <= 1e-12 {
        return 0.0;
    }
    let bw = (1.06 * std * nf.powf(-0.2)).max(1e-6);
    let norm = nf * bw * (std::f64::consts::TAU).sqrt();

    let mut h = 0.0;
    for &xi in xs {
        let density: f64 = xs
            .iter()
            .map(|&xj| {
                let z = (xi - xj) / bw;
                (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            / norm;
        h -= density.max(f64::MIN_POSITIVE).ln();
    }
    h / nf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongly_associated_row_has_positive_mi() {
        let s: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let r: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        let mi = mutual_information(&s, &r);
        assert!(mi > 0.0);
    }

    #[test]
    fn alternating_row_has_weaker_mi_than_block_split() {
        let s: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let block: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        let alternating: Vec<bool> = (0..40).map(|i| i % 2 == 0).collect();
        assert!(mutual_information(&s, &block) > mutual_information(&s, &alternating));
    }
}
