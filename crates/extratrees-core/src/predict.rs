//! Majority-vote prediction for the Extra-Trees ensemble.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::ForestError;
use crate::forest::Forest;
use crate::impurity::majority_class;
use crate::matrix::Matrix;
use crate::tree::DecisionTree;

/// Majority vote of `trees` for one sample, ties toward the lowest class.
///
/// Usable on any slice of trees, independent of a [`Forest`].
///
/// # Errors
///
/// | Variant                                    | When                                      |
/// |--------------------------------------------|-------------------------------------------|
/// | [`ForestError::InvalidFactorCount`]        | a tree was trained on more than `n_factors` classes |
/// | [`ForestError::PredictionFeatureMismatch`] | `sample` does not match a tree's width    |
pub fn vote(trees: &[DecisionTree], sample: &[f64], n_factors: usize) -> Result<usize, ForestError> {
    let required = trees.iter().map(DecisionTree::n_factors).max().unwrap_or(0);
    if n_factors < required {
        return Err(ForestError::InvalidFactorCount { n_factors, required });
    }
    let mut counts = vec![0usize; n_factors];
    for tree in trees {
        counts[tree.predict(sample)?] += 1;
    }
    Ok(majority_class(&counts))
}

impl Forest {
    /// Predict the class label for a single sample by majority vote.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, ForestError> {
        Ok(majority_class(&self.votes(sample)?))
    }

    /// Return the per-class vote counts for a single sample.
    ///
    /// The returned `Vec` has length `n_factors` and sums to `n_trees`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn votes(&self, sample: &[f64]) -> Result<Vec<usize>, ForestError> {
        self.check_width(sample.len())?;
        let mut counts = vec![0usize; self.n_factors];
        for tree in &self.trees {
            counts[tree.predict(sample)?] += 1;
        }
        Ok(counts)
    }

    /// Majority vote over depth-limited tree predictions.
    ///
    /// See [`DecisionTree::predict_to_depth`].
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_to_depth(&self, sample: &[f64], max_depth: usize) -> Result<usize, ForestError> {
        self.check_width(sample.len())?;
        let mut counts = vec![0usize; self.n_factors];
        for tree in &self.trees {
            counts[tree.predict_to_depth(sample, max_depth)?] += 1;
        }
        Ok(majority_class(&counts))
    }

    /// Predict class labels for every row of `input` in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] if `input.ncols() != n_features`.
    pub fn predict_batch(&self, input: &Matrix) -> Result<Vec<usize>, ForestError> {
        self.check_width(input.ncols())?;
        (0..input.nrows())
            .into_par_iter()
            .map(|row| self.predict(input.row(row)))
            .collect()
    }

    /// Return the raw `nrows x n_trees` matrix of per-tree predictions.
    ///
    /// Entry `(row, t)` is tree `t`'s class for row `row`, as `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] if `input.ncols() != n_features`.
    pub fn tree_outputs(&self, input: &Matrix) -> Result<Matrix, ForestError> {
        self.check_width(input.ncols())?;
        let mut outputs = Matrix::zeros(input.nrows(), self.trees.len());
        for (row, sample) in input.rows().enumerate() {
            for (t, tree) in self.trees.iter().enumerate() {
                outputs.set(row, t, tree.predict(sample)? as f64);
            }
        }
        Ok(outputs)
    }

    /// Fraction of rows of `input` whose predicted class differs from `labels`.
    ///
    /// # Errors
    ///
    /// | Variant                                    | When                              |
    /// |--------------------------------------------|-----------------------------------|
    /// | [`ForestError::LengthMismatch`]            | `labels.len() != input.nrows()`   |
    /// | [`ForestError::EmptyDataset`]              | `input` has zero rows             |
    /// | [`ForestError::PredictionFeatureMismatch`] | `input.ncols() != n_features`     |
    pub fn error_rate(&self, input: &Matrix, labels: &[usize]) -> Result<f64, ForestError> {
        if labels.len() != input.nrows() {
            return Err(ForestError::LengthMismatch {
                n_rows: input.nrows(),
                n_labels: labels.len(),
            });
        }
        if labels.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        let predictions = self.predict_batch(input)?;
        let errors = predictions
            .iter()
            .zip(labels)
            .filter(|&(p, l)| p != l)
            .count();
        Ok(errors as f64 / labels.len() as f64)
    }

    /// Return the trees in storage order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn check_width(&self, got: usize) -> Result<(), ForestError> {
        if got != self.n_features {
            return Err(ForestError::PredictionFeatureMismatch {
                expected: self.n_features,
                got,
            });
        }
        Ok(())
    }
}
