//! CLI / driver surface (component G, informative, SPEC_FULL.md §6 + §10
//! "Configuration"). Mirrors the teacher's `Cli` / `AlgorithmArgs` /
//! `HeuristicArgs` flatten pattern: one `#[derive(Parser)]` struct per
//! concern, composed with `#[clap(flatten)]`, each also `Serialize` +
//! `Deserialize` so the same options round-trip through a config file.
//!
//! Gated behind the `cli` feature: the library core (`lib.rs`) has no
//! dependency on `clap`.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::scores::{Alternative, CorrelationMethod, Method};
use crate::search::SearchMethod;
use crate::topn::SeedSelection;

#[derive(Parser, Serialize, Deserialize, Debug)]
#[clap(author, about, version)]
pub struct Cli {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub algorithm: AlgorithmArgs,

    #[clap(flatten)]
    pub seeding: SeedingArgs,

    #[clap(flatten)]
    pub permutation: PermutationArgs,

    /// Write the result record as JSON to this path instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Matrix / score-vector / pre-filter input (§6 "Binary matrix container",
/// "Pre-filter contract").
#[derive(Parser, Serialize, Deserialize, Debug)]
#[clap(next_help_heading = "Input")]
pub struct InputArgs {
    /// Path to the binary feature matrix (rows = features, columns =
    /// samples; row/column labels in the first column/header row).
    #[arg(long)]
    pub matrix: PathBuf,

    /// Path to the length-N input-score vector, labeled like the matrix
    /// columns.
    #[arg(long)]
    pub scores: PathBuf,

    /// Path to an optional per-sample weights vector (KS kernel only).
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Drop rows whose fraction of ones falls below this cutoff before the
    /// search begins.
    #[arg(long)]
    pub min_cutoff: Option<f64>,

    /// Drop rows whose fraction of ones exceeds this cutoff before the
    /// search begins.
    #[arg(long)]
    pub max_cutoff: Option<f64>,
}

/// Scoring-kernel selection and its parameters (§6 "Configuration options").
#[derive(Parser, Serialize, Deserialize, Debug, Clone)]
#[clap(next_help_heading = "Algorithm")]
pub struct AlgorithmArgs {
    /// Scoring kernel.
    #[arg(long, value_enum, default_value_t = Method::KsPval)]
    pub method: Method,

    /// Tail selection for `ks`, `wilcox` and `correlation`.
    #[arg(long, value_enum, default_value_t = Alternative::TwoSided)]
    pub method_alternative: Alternative,

    /// Correlation variant, used only when `method = correlation`.
    #[arg(long, value_enum, default_value_t = CorrelationMethod::Pearson)]
    pub cmethod: CorrelationMethod,

    /// Neighbor count for the k-NN MI kernel.
    #[arg(long, default_value_t = 3)]
    pub knn_k: usize,

    /// forward-only or bidirectional search.
    #[arg(long, value_enum, default_value_t = SearchMethod::Forward)]
    pub search_method: SearchMethod,

    /// Maximum number of features in the meta-feature.
    #[arg(long, default_value_t = 5)]
    pub max_size: usize,
}

/// Seeding of the top-N driver (§6: `top_N` and `search_start` are mutually
/// exclusive). `clap`'s `ArgGroup` can't express "default to a value when
/// neither is given", so the mutual-exclusion and the top_N=1 default are
/// both enforced in [`SeedingArgs::resolve`].
#[derive(Parser, Serialize, Deserialize, Debug, Clone)]
#[clap(next_help_heading = "Seeding")]
pub struct SeedingArgs {
    /// Seed the search from the N best-scoring single features.
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Seed the search from these specific feature labels instead of
    /// `top_n`.
    #[arg(long)]
    pub search_start: Vec<String>,

    /// Report only the single best-scoring seed's result.
    #[arg(long)]
    pub best_score_only: bool,
}

impl SeedingArgs {
    pub fn resolve(&self) -> Result<SeedSelection> {
        match (self.top_n, self.search_start.is_empty()) {
            (Some(_), false) => Err(SearchError::TopNAndSearchStartBothSupplied),
            (Some(n), true) => Ok(SeedSelection::TopN(n)),
            (None, false) => Ok(SeedSelection::Explicit(self.search_start.clone())),
            (None, true) => Ok(SeedSelection::TopN(1)),
        }
    }
}

/// Permutation driver configuration (§6, §9 "RNG discipline").
#[derive(Parser, Serialize, Deserialize, Debug, Clone)]
#[clap(next_help_heading = "Permutation")]
pub struct PermutationArgs {
    /// Number of label permutations to run; 0 disables the permutation
    /// driver.
    #[arg(long, default_value_t = 0)]
    pub n_perm: usize,

    /// Master RNG seed for the permutation driver.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Worker thread count for the top-N and permutation drivers' shared
    /// pool (defaults to hardware concurrency).
    #[arg(long)]
    pub ncores: Option<usize>,

    /// Fraction of failed permutation workers tolerated before aborting.
    #[arg(long, default_value_t = 0.25)]
    pub failure_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_test() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn top_n_and_search_start_are_mutually_exclusive() {
        let args = SeedingArgs {
            top_n: Some(3),
            search_start: vec!["f1".to_string()],
            best_score_only: false,
        };
        assert!(matches!(
            args.resolve(),
            Err(SearchError::TopNAndSearchStartBothSupplied)
        ));
    }

    #[test]
    fn defaults_to_top_n_one() {
        let args = SeedingArgs {
            top_n: None,
            search_start: Vec::new(),
            best_score_only: false,
        };
        assert!(matches!(args.resolve(), Ok(SeedSelection::TopN(1))));
    }
}
