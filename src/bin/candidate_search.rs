//! Thin CLI binary wrapping the `cadra_search` library (mirrors the
//! teacher's `pa-bin/src/main.rs`: parse args, load inputs, run the core,
//! print/save the result).

use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cadra_search::cli::Cli;
use cadra_search::scores::ScoreOptions;
use cadra_search::search::SearchOptions;
use cadra_search::{
    candidate_search, candidate_search_with_permutation, BinaryMatrix, LabeledVector,
};

/// Whitespace/tab-separated matrix file: header row of column labels
/// (first cell ignored), then one row per feature: label followed by N
/// 0/1 cells. Tabular I/O is an external collaborator per SPEC_FULL.md §1;
/// this is the minimal reader the CLI driver needs, not part of the core.
fn load_matrix(path: &Path) -> anyhow::Result<BinaryMatrix> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();
    let header = lines.next().ok_or_else(|| anyhow::anyhow!("empty matrix file"))?;
    let col_labels: Vec<Arc<str>> = header.split_whitespace().skip(1).map(Arc::from).collect();

    let mut row_labels = Vec::new();
    let mut cells = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let label = fields.next().ok_or_else(|| anyhow::anyhow!("missing row label"))?;
        row_labels.push(Arc::from(label));
        let row: anyhow::Result<Vec<f64>> = fields.map(|f| Ok(f.parse::<f64>()?)).collect();
        cells.push(row?);
    }

    Ok(BinaryMatrix::from_dense(row_labels, col_labels, cells)?)
}

/// Whitespace-separated `label value` pairs, one per line, no header.
fn load_labeled_vector(path: &Path) -> anyhow::Result<LabeledVector> {
    let text = fs::read_to_string(path)?;
    let mut labels = Vec::new();
    let mut values = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let label = fields.next().ok_or_else(|| anyhow::anyhow!("missing label"))?;
        let value: f64 = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing value for {label:?}"))?
            .parse()?;
        labels.push(Arc::from(label));
        values.push(value);
    }
    Ok(LabeledVector::new(labels, values)?)
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut matrix = load_matrix(&cli.input.matrix)?;
    let s = load_labeled_vector(&cli.input.scores)?;
    let weights = cli
        .input
        .weights
        .as_deref()
        .map(load_labeled_vector)
        .transpose()?;

    if let (Some(min), Some(max)) = (cli.input.min_cutoff, cli.input.max_cutoff) {
        matrix = cadra_search::prefilter::prefilter_by_prevalence(&matrix, min, max);
    }

    let score_opts = ScoreOptions {
        alternative: cli.algorithm.method_alternative,
        cmethod: cli.algorithm.cmethod,
        knn_k: cli.algorithm.knn_k,
        weights,
        custom: None,
    };
    let search_opts = SearchOptions {
        search_method: cli.algorithm.search_method,
        max_size: cli.algorithm.max_size,
    };
    let selection = cli.seeding.resolve()?;

    let pool = match cli.permutation.ncores {
        Some(n) => rayon::ThreadPoolBuilder::new().num_threads(n).build()?,
        None => rayon::ThreadPoolBuilder::new().build()?,
    };

    let output = pool.install(|| -> anyhow::Result<String> {
        if cli.permutation.n_perm > 0 {
            let perm_opts = cadra_search::PermutationOptions {
                n_perm: cli.permutation.n_perm,
                seed: cli.permutation.seed,
                failure_threshold: cli.permutation.failure_threshold,
            };
            let result = candidate_search_with_permutation(
                &matrix,
                &s,
                cli.algorithm.method,
                &score_opts,
                &search_opts,
                &selection,
                cli.seeding.best_score_only,
                &perm_opts,
            )?;
            Ok(serde_json::to_string_pretty(&result)?)
        } else {
            let result = candidate_search(
                &matrix,
                &s,
                cli.algorithm.method,
                &score_opts,
                &search_opts,
                &selection,
                cli.seeding.best_score_only,
            )?;
            Ok(serde_json::to_string_pretty(&result)?)
        }
    })?;

    match cli.output {
        Some(path) => fs::write(path, output)?,
        None => println!("{output}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
