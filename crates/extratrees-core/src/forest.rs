//! Extra-Trees ensemble training.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::matrix::Matrix;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// A fitted Extra-Trees ensemble.
///
/// Trees are independent and immutable; prediction is a majority vote.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Forest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_factors: usize,
}

/// Owns the training data and hyperparameters, and drives tree construction.
///
/// Every tree is grown from the full sample set (no bootstrap); variance
/// reduction comes from the randomized split search alone.
///
/// # Defaults
///
/// | Parameter         | Default               |
/// |-------------------|-----------------------|
/// | `n_factors`       | `max(label) + 1`      |
/// | `num_random_cuts` | 1                     |
/// | `even_cuts`       | `false`               |
/// | `seed`            | 42                    |
#[derive(Debug, Clone)]
pub struct ForestBuilder {
    matrix: Matrix,
    labels: Vec<usize>,
    n_factors: usize,
    num_random_cuts: usize,
    even_cuts: bool,
    seed: u64,
    rng: ChaCha8Rng,
    forest: Option<Forest>,
}

impl ForestBuilder {
    /// Take ownership of the training matrix and validate the labels.
    ///
    /// # Errors
    ///
    /// | Variant                          | When                                   |
    /// |----------------------------------|----------------------------------------|
    /// | [`ForestError::LengthMismatch`]  | `labels.len() != matrix.nrows()`       |
    /// | [`ForestError::EmptyDataset`]    | `matrix` has zero rows                 |
    /// | [`ForestError::ZeroFeatures`]    | `matrix` has zero columns              |
    /// | [`ForestError::NonFiniteValue`]  | any cell is NaN or infinite            |
    /// | [`ForestError::NegativeLabel`]   | any label is negative                  |
    pub fn new(matrix: Matrix, labels: &[i64]) -> Result<Self, ForestError> {
        if labels.len() != matrix.nrows() {
            return Err(ForestError::LengthMismatch {
                n_rows: matrix.nrows(),
                n_labels: labels.len(),
            });
        }
        if matrix.nrows() == 0 {
            return Err(ForestError::EmptyDataset);
        }
        if matrix.ncols() == 0 {
            return Err(ForestError::ZeroFeatures);
        }
        if let Some((row, col)) = matrix.first_non_finite() {
            return Err(ForestError::NonFiniteValue { row, col });
        }

        let mut factors = Vec::with_capacity(labels.len());
        for (sample_index, &label) in labels.iter().enumerate() {
            let factor = usize::try_from(label)
                .map_err(|_| ForestError::NegativeLabel { sample_index, label })?;
            factors.push(factor);
        }
        let n_factors = factors.iter().max().copied().unwrap_or(0) + 1;

        let seed = 42;
        Ok(Self {
            matrix,
            labels: factors,
            n_factors,
            num_random_cuts: 1,
            even_cuts: false,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            forest: None,
        })
    }

    /// Override the number of classes.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidFactorCount`] if `n_factors` is smaller
    /// than `max(label) + 1`.
    pub fn with_n_factors(mut self, n_factors: usize) -> Result<Self, ForestError> {
        let required = self.labels.iter().max().copied().unwrap_or(0) + 1;
        if n_factors < required {
            return Err(ForestError::InvalidFactorCount { n_factors, required });
        }
        self.n_factors = n_factors;
        Ok(self)
    }

    /// Set the number of random thresholds drawn per examined feature.
    #[must_use]
    pub fn with_num_random_cuts(mut self, num_random_cuts: usize) -> Self {
        self.num_random_cuts = num_random_cuts;
        self
    }

    /// Sample thresholds from equal sub-intervals (`true`) or the full range.
    #[must_use]
    pub fn with_even_cuts(mut self, even_cuts: bool) -> Self {
        self.even_cuts = even_cuts;
        self
    }

    /// Reseed the master random stream.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Build and store `n_trees` trees over every training sample.
    ///
    /// Replaces any previously stored forest, but only once all trees are
    /// built. Successive calls continue the master random stream.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                       |
    /// |---------------------------------------|----------------------------|
    /// | [`ForestError::InvalidTreeCount`]     | `n_trees` is zero          |
    /// | [`ForestError::InvalidFeatureBudget`] | `k` is zero                |
    /// | [`ForestError::InvalidCutCount`]      | `num_random_cuts` is zero  |
    pub fn learn(&mut self, nmin: usize, k: usize, n_trees: usize) -> Result<(), ForestError> {
        let ids: Vec<usize> = (0..self.matrix.nrows()).collect();
        self.learn_subset(nmin, k, n_trees, &ids)
    }

    /// Build and store `n_trees` trees, each grown from the rows in `ids`.
    ///
    /// # Errors
    ///
    /// Same as [`ForestBuilder::learn`], plus
    /// [`ForestError::EmptySampleSet`] and
    /// [`ForestError::SampleIndexOutOfBounds`] for a bad `ids`.
    #[instrument(skip(self, ids), fields(n_samples = ids.len()))]
    pub fn learn_subset(
        &mut self,
        nmin: usize,
        k: usize,
        n_trees: usize,
        ids: &[usize],
    ) -> Result<(), ForestError> {
        if n_trees == 0 {
            return Err(ForestError::InvalidTreeCount { n_trees });
        }
        let config = self.tree_config(nmin, k);
        config.validate()?;
        self.check_ids(ids)?;

        info!(
            n_trees,
            n_samples = ids.len(),
            n_features = self.matrix.ncols(),
            n_factors = self.n_factors,
            nmin,
            k,
            num_random_cuts = self.num_random_cuts,
            even_cuts = self.even_cuts,
            "training extra-trees forest"
        );

        // Independent stream per tree, seeded from the master stream.
        let tree_seeds: Vec<u64> = (0..n_trees).map(|_| self.rng.r#gen()).collect();

        let trees: Vec<DecisionTree> = tree_seeds
            .into_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                config.grow(&self.matrix, &self.labels, self.n_factors, ids, &mut rng)
            })
            .collect();

        let total_nodes: usize = trees.iter().map(DecisionTree::n_nodes).sum();
        debug!(n_trees_trained = trees.len(), total_nodes, "tree training complete");

        self.forest = Some(Forest {
            trees,
            n_features: self.matrix.ncols(),
            n_factors: self.n_factors,
        });

        info!(total_nodes, "extra-trees training complete");
        Ok(())
    }

    /// Build a single tree from the rows in `ids` using the caller's generator.
    ///
    /// Does not touch the stored forest or the master random stream.
    ///
    /// # Errors
    ///
    /// | Variant                                 | When                        |
    /// |-----------------------------------------|-----------------------------|
    /// | [`ForestError::InvalidFeatureBudget`]   | `k` is zero                 |
    /// | [`ForestError::InvalidCutCount`]        | `num_random_cuts` is zero   |
    /// | [`ForestError::EmptySampleSet`]         | `ids` is empty              |
    /// | [`ForestError::SampleIndexOutOfBounds`] | an id is `>= nrows`         |
    pub fn build_tree<R: Rng>(
        &self,
        nmin: usize,
        k: usize,
        ids: &[usize],
        rng: &mut R,
    ) -> Result<DecisionTree, ForestError> {
        let config = self.tree_config(nmin, k);
        config.validate()?;
        self.check_ids(ids)?;
        Ok(config.grow(&self.matrix, &self.labels, self.n_factors, ids, rng))
    }

    fn tree_config(&self, nmin: usize, k: usize) -> DecisionTreeConfig {
        DecisionTreeConfig::new()
            .with_nmin(nmin)
            .with_k(k)
            .with_num_random_cuts(self.num_random_cuts)
            .with_even_cuts(self.even_cuts)
    }

    fn check_ids(&self, ids: &[usize]) -> Result<(), ForestError> {
        if ids.is_empty() {
            return Err(ForestError::EmptySampleSet);
        }
        let n_rows = self.matrix.nrows();
        if let Some(&index) = ids.iter().find(|&&i| i >= n_rows) {
            return Err(ForestError::SampleIndexOutOfBounds { index, n_rows });
        }
        Ok(())
    }

    // --- Prediction entry points ---

    /// Predict the class of one sample with the stored forest.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotTrained`] before the first successful `learn`,
    /// or [`ForestError::PredictionFeatureMismatch`] for a sample of the wrong width.
    pub fn classify(&self, sample: &[f64]) -> Result<usize, ForestError> {
        self.trained()?.predict(sample)
    }

    /// Predict the class of every row of `input` with the stored forest.
    ///
    /// # Errors
    ///
    /// Same as [`ForestBuilder::classify`].
    pub fn classify_batch(&self, input: &Matrix) -> Result<Vec<usize>, ForestError> {
        self.trained()?.predict_batch(input)
    }

    /// Return the raw `nrows x n_trees` matrix of per-tree predictions.
    ///
    /// # Errors
    ///
    /// Same as [`ForestBuilder::classify`].
    pub fn all_tree_outputs(&self, input: &Matrix) -> Result<Matrix, ForestError> {
        self.trained()?.tree_outputs(input)
    }

    fn trained(&self) -> Result<&Forest, ForestError> {
        self.forest.as_ref().ok_or(ForestError::NotTrained)
    }

    // --- Getters ---

    /// Borrow the stored forest, if one has been learned.
    #[must_use]
    pub fn forest(&self) -> Option<&Forest> {
        self.forest.as_ref()
    }

    /// Consume the builder and return the stored forest, if any.
    #[must_use]
    pub fn into_forest(self) -> Option<Forest> {
        self.forest
    }

    /// Borrow the training matrix.
    #[must_use]
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Return the validated training labels.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Return the number of random thresholds per feature.
    #[must_use]
    pub fn num_random_cuts(&self) -> usize {
        self.num_random_cuts
    }

    /// Return whether thresholds are drawn from even sub-intervals.
    #[must_use]
    pub fn even_cuts(&self) -> bool {
        self.even_cuts
    }

    /// Return the master seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
