//! Score kernels (component B, SPEC_FULL.md §4.2): six scoring functions
//! sharing one contract, dispatched from the `method` configuration option.

mod common;
mod correlation;
mod custom;
mod knn_mi;
mod ks;
mod revealer;
mod wilcoxon;

pub use common::{
    Alternative, CorrelationMethod, CustomScorer, RankedScore, RankedScores, ScoreOptions, Scorer,
    StatOrPval,
};
pub use correlation::CorrelationScorer;
pub use custom::CustomKernel;
pub use knn_mi::KnnMiScorer;
pub use ks::KsScorer;
pub use revealer::RevealerScorer;
pub use wilcoxon::WilcoxonScorer;

/// The `method` configuration option (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", clap(rename_all = "snake_case"))]
pub enum Method {
    KsStat,
    KsPval,
    WilcoxStat,
    WilcoxPval,
    Revealer,
    Knnmi,
    Correlation,
    Custom,
}

/// Builds the `Scorer` implementation for a given `method`.
pub fn make_scorer(method: Method) -> Box<dyn Scorer> {
    match method {
        Method::KsStat => Box::new(KsScorer { mode: StatOrPval::Stat }),
        Method::KsPval => Box::new(KsScorer { mode: StatOrPval::Pval }),
        Method::WilcoxStat => Box::new(WilcoxonScorer { mode: StatOrPval::Stat }),
        Method::WilcoxPval => Box::new(WilcoxonScorer { mode: StatOrPval::Pval }),
        Method::Revealer => Box::new(RevealerScorer),
        Method::Knnmi => Box::new(KnnMiScorer),
        Method::Correlation => Box::new(CorrelationScorer),
        Method::Custom => Box::new(CustomKernel),
    }
}
