use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use extratrees_core::{ForestBuilder, Matrix};
use extratrees_io::{EvaluationSummary, ExperimentName, LabeledCsvReader, ResultWriter};

#[derive(Parser)]
#[command(name = "extratrees")]
#[command(about = "Extremely randomized trees for factor classification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for batch prediction (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Forest hyperparameters shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the ensemble
    #[arg(long, default_value_t = 100)]
    trees: usize,

    /// Subsets smaller than this become leaves
    #[arg(long, default_value_t = 2)]
    nmin: usize,

    /// Non-constant features examined per split search
    #[arg(long, default_value_t = 5)]
    k: usize,

    /// Random thresholds drawn per examined feature
    #[arg(long, default_value_t = 1)]
    cuts: usize,

    /// Draw each threshold from its own equal-width sub-interval
    #[arg(long, default_value_t = false)]
    even_cuts: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Train and score a forest on a synthetic three-class dataset
    Bench {
        /// Number of synthetic samples
        #[arg(long, default_value_t = 1000)]
        rows: usize,

        /// Number of synthetic features (at least 4)
        #[arg(long, default_value_t = 20)]
        features: usize,

        #[command(flatten)]
        forest: ForestArgs,
    },

    /// Train on a labeled CSV, predict its rows, and write JSON results
    Evaluate {
        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Name of the integer label column
        #[arg(long, default_value = "label")]
        label_column: String,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        forest: ForestArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct BenchOutput {
    rows: usize,
    features: usize,
    trees: usize,
    nmin: usize,
    k: usize,
    cuts: usize,
    even_cuts: bool,
    seed: u64,
    total_nodes: usize,
    build_seconds: f64,
    predict_seconds: f64,
    error_rate: f64,
}

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    n_samples: usize,
    n_features: usize,
    n_factors: usize,
    n_trees: usize,
    error_rate: f64,
    predictions_path: PathBuf,
    evaluation_path: PathBuf,
}

/// Uniform `[0, 1)` features with column 2 pinned to 0.5 and label
/// `floor(x1 + 2 * x3)`.
fn synthetic_dataset(rows: usize, features: usize, seed: u64) -> Result<(Matrix, Vec<i64>)> {
    anyhow::ensure!(features >= 4, "bench needs at least 4 features, got {features}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data: Vec<f64> = (0..rows * features).map(|_| rng.r#gen()).collect();
    let mut matrix = Matrix::new(data, rows, features)?;
    let labels = (0..rows)
        .map(|row| {
            matrix.set(row, 2, 0.5);
            (matrix.get(row, 1) + 2.0 * matrix.get(row, 3)).floor() as i64
        })
        .collect();
    Ok((matrix, labels))
}

fn confusion_matrix(predictions: &[usize], labels: &[usize], n_factors: usize) -> Vec<Vec<usize>> {
    let mut cm = vec![vec![0; n_factors]; n_factors];
    for (&p, &l) in predictions.iter().zip(labels) {
        cm[l][p] += 1;
    }
    cm
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Bench {
            rows,
            features,
            forest,
        } => {
            let (matrix, labels) = synthetic_dataset(rows, features, cli.seed)?;
            info!(rows, features, "synthetic dataset generated");

            let mut builder = ForestBuilder::new(matrix, &labels)?
                .with_num_random_cuts(forest.cuts)
                .with_even_cuts(forest.even_cuts)
                .with_seed(cli.seed);

            let start = Instant::now();
            builder
                .learn(forest.nmin, forest.k, forest.trees)
                .context("forest training failed")?;
            let build_seconds = start.elapsed().as_secs_f64();

            let trained = builder.forest().context("forest missing after training")?;

            // Timed pass predicts every training row.
            let start = Instant::now();
            let rate = trained
                .error_rate(builder.matrix(), builder.labels())
                .context("prediction failed")?;
            let predict_seconds = start.elapsed().as_secs_f64();

            let total_nodes: usize = trained.trees().iter().map(|t| t.n_nodes()).sum();

            let output = BenchOutput {
                rows,
                features,
                trees: forest.trees,
                nmin: forest.nmin,
                k: forest.k,
                cuts: forest.cuts,
                even_cuts: forest.even_cuts,
                seed: cli.seed,
                total_nodes,
                build_seconds,
                predict_seconds,
                error_rate: rate,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            data,
            label_column,
            experiment,
            output_dir,
            forest,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            // 1. Read labeled table
            let dataset = LabeledCsvReader::new(&data)
                .with_label_column(label_column)
                .read()
                .context("failed to read input CSV")?;
            let (row_ids, _, features, labels) = dataset.into_parts();

            // 2. Train
            let mut builder = ForestBuilder::new(features, &labels)
                .context("invalid training data")?
                .with_num_random_cuts(forest.cuts)
                .with_even_cuts(forest.even_cuts)
                .with_seed(cli.seed);

            let start = Instant::now();
            builder
                .learn(forest.nmin, forest.k, forest.trees)
                .context("forest training failed")?;
            let build_seconds = start.elapsed().as_secs_f64();

            // 3. Predict the training rows
            let start = Instant::now();
            let predictions = builder
                .classify_batch(builder.matrix())
                .context("prediction failed")?;
            let predict_seconds = start.elapsed().as_secs_f64();

            let rate = builder
                .forest()
                .context("forest missing after training")?
                .error_rate(builder.matrix(), builder.labels())
                .context("scoring failed")?;
            info!(error_rate = rate, "training rows classified");

            // 4. Write JSON artifacts
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let predictions_path =
                writer.write_predictions(&row_ids, &predictions, Some(labels.as_slice()))?;

            let summary = EvaluationSummary {
                n_samples: row_ids.len(),
                n_features: builder.matrix().ncols(),
                n_factors: builder.n_factors(),
                n_trees: forest.trees,
                nmin: forest.nmin,
                k: forest.k,
                num_random_cuts: forest.cuts,
                even_cuts: forest.even_cuts,
                seed: cli.seed,
                build_seconds,
                predict_seconds,
                error_rate: rate,
                confusion_matrix: confusion_matrix(
                    &predictions,
                    builder.labels(),
                    builder.n_factors(),
                ),
            };
            let evaluation_path = writer.write_evaluation(&summary)?;

            // 5. Print summary
            let output = EvaluateOutput {
                experiment,
                n_samples: summary.n_samples,
                n_features: summary.n_features,
                n_factors: summary.n_factors,
                n_trees: summary.n_trees,
                error_rate: rate,
                predictions_path,
                evaluation_path,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
