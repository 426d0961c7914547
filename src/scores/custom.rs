//! Adapter from the user-supplied [`CustomScorer`] callable to the uniform
//! [`Scorer`] contract (SPEC_FULL.md §4.2 "Custom kernel").

use crate::error::{Result, SearchError};
use crate::labeled_vector::LabeledVector;
use crate::matrix::{BinaryMatrix, BitRow};

use super::common::{validate_custom_result, RankedScores, ScoreOptions, Scorer};

pub struct CustomKernel;

impl Scorer for CustomKernel {
    fn score_candidates(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        _meta_feature: Option<&BitRow>,
        meta_feature_rows: &[usize],
        _candidate_rows: &[usize],
        opts: &ScoreOptions,
    ) -> Result<RankedScores> {
        let callable = opts.custom.as_ref().ok_or(SearchError::CustomKernelMissing)?;
        let result = callable.score(matrix, s, meta_feature_rows, opts)?;
        validate_custom_result(matrix, meta_feature_rows, &result)?;
        Ok(result)
    }

    fn score_union(
        &self,
        matrix: &BinaryMatrix,
        s: &LabeledVector,
        union: &BitRow,
        opts: &ScoreOptions,
    ) -> Result<f64> {
        let callable = opts.custom.as_ref().ok_or(SearchError::CustomKernelMissing)?;
        callable.score_union(matrix, s, union, opts)
    }
}
