use rand::Rng;
use tracing::{debug, trace};

use crate::{
    ForestError, Matrix,
    impurity::majority_class,
    node::{Node, NodeIndex},
    split::{find_random_split, partition},
};

/// Per-node hyperparameters of an Extra-Trees decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter         | Default |
/// |-------------------|---------|
/// | `nmin`            | 2       |
/// | `k`               | 5       |
/// | `num_random_cuts` | 1       |
/// | `even_cuts`       | `false` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTreeConfig {
    pub(crate) nmin: usize,
    pub(crate) k: usize,
    pub(crate) num_random_cuts: usize,
    pub(crate) even_cuts: bool,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nmin: 2,
            k: 5,
            num_random_cuts: 1,
            even_cuts: false,
        }
    }

    /// Set the minimum subset size required to attempt a split.
    ///
    /// Subsets smaller than `nmin` always become leaves.
    #[must_use]
    pub fn with_nmin(mut self, nmin: usize) -> Self {
        self.nmin = nmin;
        self
    }

    /// Set the number of non-constant features examined per split search.
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the number of random thresholds drawn per examined feature.
    #[must_use]
    pub fn with_num_random_cuts(mut self, num_random_cuts: usize) -> Self {
        self.num_random_cuts = num_random_cuts;
        self
    }

    /// Draw thresholds from equal sub-intervals of the feature range (`true`)
    /// or uniformly over the whole range (`false`).
    #[must_use]
    pub fn with_even_cuts(mut self, even_cuts: bool) -> Self {
        self.even_cuts = even_cuts;
        self
    }

    // --- Getters ---

    /// Return the minimum subset size required to attempt a split.
    #[must_use]
    pub fn nmin(&self) -> usize {
        self.nmin
    }

    /// Return the number of features examined per split search.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
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

    /// Check the parameters that would make split search meaningless.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                   |
    /// |---------------------------------------|------------------------|
    /// | [`ForestError::InvalidFeatureBudget`] | `k` is zero            |
    /// | [`ForestError::InvalidCutCount`]      | `num_random_cuts` is zero |
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.k == 0 {
            return Err(ForestError::InvalidFeatureBudget { k: self.k });
        }
        if self.num_random_cuts == 0 {
            return Err(ForestError::InvalidCutCount {
                num_random_cuts: self.num_random_cuts,
            });
        }
        Ok(())
    }

    /// Grow one tree over `sample_indices`.
    ///
    /// Inputs must already be validated: labels in `[0, n_factors)`,
    /// indices in bounds and non-empty.
    pub(crate) fn grow<R: Rng>(
        &self,
        matrix: &Matrix,
        labels: &[usize],
        n_factors: usize,
        sample_indices: &[usize],
        rng: &mut R,
    ) -> DecisionTree {
        let mut builder = TreeBuilder {
            matrix,
            labels,
            n_factors,
            config: self,
            feature_order: (0..matrix.ncols()).collect(),
            rng,
            arena: Vec::new(),
        };
        let root = builder.build(sample_indices);
        let tree = DecisionTree {
            nodes: builder.arena,
            n_features: matrix.ncols(),
            n_factors,
        };

        debug!(
            root_index = root.index(),
            n_nodes = tree.n_nodes(),
            n_leaves = tree.n_leaves(),
            depth = tree.depth(),
            "decision tree built"
        );
        tree
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Transient state of one tree build.
///
/// The feature order buffer belongs to this build alone; it is reshuffled
/// before every split search.
struct TreeBuilder<'a, R> {
    matrix: &'a Matrix,
    labels: &'a [usize],
    n_factors: usize,
    config: &'a DecisionTreeConfig,
    feature_order: Vec<usize>,
    rng: &'a mut R,
    arena: Vec<Node>,
}

impl<R: Rng> TreeBuilder<'_, R> {
    /// Recursively build the subtree for `sample_indices`.
    ///
    /// Returns the [`NodeIndex`] of the node just created in the arena.
    fn build(&mut self, sample_indices: &[usize]) -> NodeIndex {
        if sample_indices.len() < self.config.nmin {
            return self.make_leaf(sample_indices);
        }

        let split = match find_random_split(
            self.matrix,
            self.labels,
            sample_indices,
            self.n_factors,
            self.config,
            &mut self.feature_order,
            &mut *self.rng,
        ) {
            Some(s) => s,
            None => return self.make_leaf(sample_indices),
        };

        trace!(
            feature = split.feature.index(),
            threshold = split.threshold,
            score = split.score,
            n_left = split.n_left,
            n_right = split.n_right,
            "split chosen"
        );

        let n_samples = sample_indices.len();
        let majority = self.majority(sample_indices);
        let (left_ids, right_ids) = partition(self.matrix, sample_indices, &split);

        // Arena pattern: reserve index, recurse, then overwrite with the split.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            prediction: majority,
            n_samples,
        });

        let left = if split.left_pure {
            self.make_leaf(&left_ids)
        } else {
            self.build(&left_ids)
        };
        let right = if split.right_pure {
            self.make_leaf(&right_ids)
        } else {
            self.build(&right_ids)
        };

        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            majority,
        };

        NodeIndex::new(node_idx)
    }

    fn make_leaf(&mut self, sample_indices: &[usize]) -> NodeIndex {
        let prediction = self.majority(sample_indices);
        let idx = self.arena.len();
        self.arena.push(Node::Leaf {
            prediction,
            n_samples: sample_indices.len(),
        });
        NodeIndex::new(idx)
    }

    fn majority(&self, sample_indices: &[usize]) -> usize {
        let mut counts = vec![0usize; self.n_factors];
        for &si in sample_indices {
            counts[self.labels[si]] += 1;
        }
        majority_class(&counts)
    }
}

/// A fitted Extra-Trees decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references; the root is
/// at index 0. Immutable once built.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_factors: usize,
}

impl DecisionTree {
    /// Predict the class label for a single sample.
    ///
    /// Traverses from the root: at each `Split`, goes left when
    /// `sample[feature] < threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, ForestError> {
        let leaf = self.leaf_for(sample)?;
        Ok(self.nodes[leaf.index()].majority())
    }

    /// Predict as if descent stopped after at most `max_depth` edges.
    ///
    /// When descent stops on a `Split`, returns the majority class recorded
    /// for that node. `max_depth = 0` yields the root's majority; a depth at
    /// least [`DecisionTree::depth`] is equivalent to [`DecisionTree::predict`].
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_to_depth(&self, sample: &[f64], max_depth: usize) -> Result<usize, ForestError> {
        self.check_width(sample)?;
        let mut idx = 0usize;
        for _ in 0..max_depth {
            match self.next(idx, sample) {
                Some(child) => idx = child,
                None => break,
            }
        }
        Ok(self.nodes[idx].majority())
    }

    /// Return the arena index of the leaf that `sample` descends to.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn leaf_for(&self, sample: &[f64]) -> Result<NodeIndex, ForestError> {
        self.check_width(sample)?;
        let mut idx = 0usize;
        while let Some(child) = self.next(idx, sample) {
            idx = child;
        }
        Ok(NodeIndex::new(idx))
    }

    /// Return the root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Return the node at `index`, if it exists.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.index())
    }

    /// Return all nodes in arena order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes this tree can predict.
    #[must_use]
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        // BFS: (node_index, current_depth)
        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    fn check_width(&self, sample: &[f64]) -> Result<(), ForestError> {
        if sample.len() != self.n_features {
            return Err(ForestError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    /// Child of node `idx` that `sample` routes to, or `None` at a leaf.
    fn next(&self, idx: usize, sample: &[f64]) -> Option<usize> {
        match &self.nodes[idx] {
            Node::Leaf { .. } => None,
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[feature.index()] < *threshold {
                    Some(left.index())
                } else {
                    Some(right.index())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn grow(rows: &[Vec<f64>], labels: &[usize], config: &DecisionTreeConfig, seed: u64) -> DecisionTree {
        let matrix = Matrix::from_rows(rows).unwrap();
        let n_factors = labels.iter().max().copied().unwrap_or(0) + 1;
        let ids: Vec<usize> = (0..rows.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        config.grow(&matrix, labels, n_factors, &ids, &mut rng)
    }

    /// 60 samples, 3 features, labels depend on the first two.
    fn noisy_dataset() -> (Vec<Vec<f64>>, Vec<usize>) {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let x = (i * 37 % 60) as f64 / 60.0;
                let y = (i * 11 % 60) as f64 / 60.0;
                vec![x, y, (i % 5) as f64]
            })
            .collect();
        let labels = rows
            .iter()
            .map(|r| ((r[0] + r[1]) * 1.5).floor() as usize)
            .collect();
        (rows, labels)
    }

    /// Recursively check size conservation; returns the subtree's leaf total.
    fn leaf_total(tree: &DecisionTree, idx: usize) -> usize {
        match &tree.nodes[idx] {
            Node::Leaf { n_samples, .. } => *n_samples,
            Node::Split {
                left,
                right,
                n_samples,
                ..
            } => {
                let l = tree.nodes[left.index()].n_samples();
                let r = tree.nodes[right.index()].n_samples();
                assert_eq!(l + r, *n_samples, "node {idx}");
                assert_eq!(leaf_total(tree, left.index()) + leaf_total(tree, right.index()), *n_samples);
                *n_samples
            }
        }
    }

    #[test]
    fn four_rows_single_feature_classified_correctly() {
        let rows = vec![vec![0.1], vec![0.3], vec![0.7], vec![0.9]];
        let labels = vec![0, 0, 1, 1];
        let config = DecisionTreeConfig::new()
            .with_nmin(1)
            .with_k(1)
            .with_num_random_cuts(1);
        for seed in 0..10 {
            let tree = grow(&rows, &labels, &config, seed);
            for (row, &label) in rows.iter().zip(&labels) {
                assert_eq!(tree.predict(row).unwrap(), label, "seed {seed}");
            }
        }
    }

    #[test]
    fn constant_columns_give_majority_leaf() {
        let rows = vec![vec![1.0, 2.0]; 5];
        let labels = vec![1, 0, 1, 2, 1];
        let config = DecisionTreeConfig::new().with_nmin(1);
        let tree = grow(&rows, &labels, &config, 42);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.root(), &Node::Leaf { prediction: 1, n_samples: 5 });
    }

    #[test]
    fn pure_sides_become_leaves_without_further_search() {
        // Both sides of the cut on feature 0 are pure but still hold
        // non-constant values in feature 1.
        let rows = vec![
            vec![0.0, 1.0],
            vec![0.1, 2.0],
            vec![0.2, 3.0],
            vec![5.0, 1.0],
            vec![5.1, 2.0],
        ];
        let labels = vec![0, 0, 0, 1, 1];
        let config = DecisionTreeConfig::new()
            .with_nmin(1)
            .with_k(2)
            .with_num_random_cuts(50);
        for seed in 0..5 {
            let tree = grow(&rows, &labels, &config, seed);
            assert_eq!(tree.n_nodes(), 3, "seed {seed}");
            let Node::Split { left, right, .. } = tree.root() else {
                panic!("root should split, seed {seed}");
            };
            assert_eq!(
                tree.node(*left),
                Some(&Node::Leaf { prediction: 0, n_samples: 3 })
            );
            assert_eq!(
                tree.node(*right),
                Some(&Node::Leaf { prediction: 1, n_samples: 2 })
            );
        }
    }

    #[test]
    fn small_subset_becomes_leaf() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0]];
        let labels = vec![2, 0, 0];
        let config = DecisionTreeConfig::new().with_nmin(4);
        let tree = grow(&rows, &labels, &config, 42);
        assert_eq!(tree.root(), &Node::Leaf { prediction: 0, n_samples: 3 });
    }

    #[test]
    fn majority_ties_go_to_lowest_class() {
        let rows = vec![vec![0.0]; 4];
        let labels = vec![2, 1, 2, 1];
        let tree = grow(&rows, &labels, &DecisionTreeConfig::new(), 42);
        assert_eq!(tree.predict(&[0.0]).unwrap(), 1);
    }

    #[test]
    fn sample_counts_are_conserved() {
        let (rows, labels) = noisy_dataset();
        let config = DecisionTreeConfig::new().with_nmin(2).with_k(2);
        let tree = grow(&rows, &labels, &config, 5);
        assert_eq!(leaf_total(&tree, 0), rows.len());
        assert_eq!(tree.root().n_samples(), rows.len());
    }

    #[test]
    fn every_sample_reaches_exactly_one_leaf() {
        let (rows, labels) = noisy_dataset();
        let config = DecisionTreeConfig::new().with_nmin(3).with_num_random_cuts(2);
        let tree = grow(&rows, &labels, &config, 11);

        let mut hits = vec![0usize; tree.n_nodes()];
        for row in &rows {
            let leaf = tree.leaf_for(row).unwrap();
            assert!(tree.node(leaf).unwrap().is_leaf());
            hits[leaf.index()] += 1;
        }
        for (idx, node) in tree.nodes().iter().enumerate() {
            if node.is_leaf() {
                assert_eq!(hits[idx], node.n_samples(), "leaf {idx}");
            }
        }
    }

    #[test]
    fn leaf_prediction_is_present_in_its_samples() {
        let (rows, labels) = noisy_dataset();
        let config = DecisionTreeConfig::new().with_nmin(6);
        let tree = grow(&rows, &labels, &config, 3);

        let mut seen: Vec<HashSet<usize>> = vec![HashSet::new(); tree.n_nodes()];
        for (row, &label) in rows.iter().zip(&labels) {
            seen[tree.leaf_for(row).unwrap().index()].insert(label);
        }
        for (idx, node) in tree.nodes().iter().enumerate() {
            if let Node::Leaf { prediction, .. } = node {
                assert!(seen[idx].contains(prediction), "leaf {idx}");
            }
        }
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (rows, labels) = noisy_dataset();
        let config = DecisionTreeConfig::new().with_k(2).with_num_random_cuts(3);
        let tree1 = grow(&rows, &labels, &config, 123);
        let tree2 = grow(&rows, &labels, &config, 123);
        assert_eq!(tree1, tree2);
    }

    #[test]
    fn nmin_one_memorizes_training_data() {
        let (rows, labels) = noisy_dataset();
        let config = DecisionTreeConfig::new().with_nmin(1).with_k(3);
        let tree = grow(&rows, &labels, &config, 8);
        for (row, &label) in rows.iter().zip(&labels) {
            assert_eq!(tree.predict(row).unwrap(), label);
        }
    }

    #[test]
    fn depth_limited_prediction() {
        let (rows, labels) = noisy_dataset();
        let config = DecisionTreeConfig::new().with_nmin(1);
        let tree = grow(&rows, &labels, &config, 21);
        let depth = tree.depth();
        assert!(depth >= 2);

        for row in &rows {
            assert_eq!(tree.predict_to_depth(row, 0).unwrap(), tree.root().majority());
            assert_eq!(
                tree.predict_to_depth(row, depth).unwrap(),
                tree.predict(row).unwrap()
            );
            assert_eq!(
                tree.predict_to_depth(row, depth + 5).unwrap(),
                tree.predict(row).unwrap()
            );
        }
    }

    #[test]
    fn prediction_feature_mismatch() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let labels = vec![0, 1];
        let tree = grow(&rows, &labels, &DecisionTreeConfig::new(), 42);
        let err = tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            ForestError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
        assert!(tree.predict_to_depth(&[1.0, 2.0, 3.0], 1).is_err());
    }

    #[test]
    fn validate_rejects_zero_budgets() {
        assert!(matches!(
            DecisionTreeConfig::new().with_k(0).validate(),
            Err(ForestError::InvalidFeatureBudget { k: 0 })
        ));
        assert!(matches!(
            DecisionTreeConfig::new().with_num_random_cuts(0).validate(),
            Err(ForestError::InvalidCutCount { num_random_cuts: 0 })
        ));
        assert!(DecisionTreeConfig::default().validate().is_ok());
    }
}
