//! JSON result writer for predictions and evaluation summaries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Training and scoring summary for one evaluation run.
///
/// Plain data so the writer stays independent of the forest types; the
/// caller fills it from the builder it trained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub n_samples: usize,
    pub n_features: usize,
    pub n_factors: usize,
    pub n_trees: usize,
    pub nmin: usize,
    pub k: usize,
    pub num_random_cuts: usize,
    pub even_cuts: bool,
    pub seed: u64,
    pub build_seconds: f64,
    pub predict_seconds: f64,
    pub error_rate: f64,
    /// `confusion_matrix[actual][predicted]`, sized `n_factors × n_factors`.
    pub confusion_matrix: Vec<Vec<usize>>,
}

/// Writes prediction and evaluation results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_predictions.json` and
/// `{experiment}_evaluate.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write per-row predictions to `{experiment}_predictions.json`.
    ///
    /// `labels`, when given, adds the true label and a `correct` flag to
    /// each entry. Entries are emitted in input order.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n = predictions.len()))]
    pub fn write_predictions(
        &self,
        row_ids: &[String],
        predictions: &[usize],
        labels: Option<&[i64]>,
    ) -> Result<PathBuf, IoError> {
        debug_assert_eq!(row_ids.len(), predictions.len());
        let path = self.file_path("predictions");

        let entries: Vec<PredictionEntry> = row_ids
            .iter()
            .zip(predictions)
            .enumerate()
            .map(|(i, (row_id, &predicted))| {
                let label = labels.and_then(|l| l.get(i).copied());
                PredictionEntry {
                    row_id: row_id.as_str(),
                    predicted,
                    label,
                    correct: label.map(|l| l == predicted as i64),
                }
            })
            .collect();

        let artifact = PredictionsArtifact {
            experiment: self.experiment.as_str(),
            n_samples: entries.len(),
            predictions: entries,
        };
        write_json(&path, &artifact)?;

        info!(path = %path.display(), "predictions written");
        Ok(path)
    }

    /// Write an evaluation summary to `{experiment}_evaluate.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_evaluation(&self, summary: &EvaluationSummary) -> Result<PathBuf, IoError> {
        let path = self.file_path("evaluate");
        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            summary,
        };
        write_json(&path, &artifact)?;

        info!(path = %path.display(), error_rate = summary.error_rate, "evaluation written");
        Ok(path)
    }

    fn file_path(&self, kind: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{kind}.json", self.experiment.as_str()))
    }
}

fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    fs::write(path, json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct PredictionsArtifact<'a> {
    experiment: &'a str,
    n_samples: usize,
    predictions: Vec<PredictionEntry<'a>>,
}

#[derive(Serialize)]
struct PredictionEntry<'a> {
    row_id: &'a str,
    predicted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correct: Option<bool>,
}

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    #[serde(flatten)]
    summary: &'a EvaluationSummary,
}
