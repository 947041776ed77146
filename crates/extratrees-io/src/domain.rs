//! Domain types for extratrees-io.

use extratrees_core::Matrix;

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A labeled feature table for classification.
///
/// Produced by [`LabeledCsvReader`](crate::LabeledCsvReader). Row `i` of
/// `features` has id `row_ids[i]` and label `labels[i]`. Labels are kept
/// signed so that negative values reach the forest builder's validation.
#[derive(Debug)]
pub struct LabeledDataset {
    row_ids: Vec<String>,
    feature_names: Vec<String>,
    features: Matrix,
    labels: Vec<i64>,
}

impl LabeledDataset {
    /// Create a new labeled dataset.
    pub(crate) fn new(
        row_ids: Vec<String>,
        feature_names: Vec<String>,
        features: Matrix,
        labels: Vec<i64>,
    ) -> Self {
        debug_assert_eq!(row_ids.len(), features.nrows());
        debug_assert_eq!(labels.len(), features.nrows());
        Self {
            row_ids,
            feature_names,
            features,
            labels,
        }
    }

    /// Return the row ids in file order.
    #[must_use]
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Return the feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the feature matrix.
    #[must_use]
    pub fn features(&self) -> &Matrix {
        &self.features
    }

    /// Return the labels in file order.
    #[must_use]
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Split into owned parts: `(row_ids, feature_names, features, labels)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<String>, Matrix, Vec<i64>) {
        (self.row_ids, self.feature_names, self.features, self.labels)
    }

    /// Return the number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}
