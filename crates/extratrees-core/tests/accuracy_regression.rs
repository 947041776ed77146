//! Accuracy regression tests for extratrees-core.
//!
//! These tests verify that algorithmic changes do not degrade Extra-Trees
//! classification accuracy on deterministic synthetic datasets.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use extratrees_core::{ForestBuilder, Matrix, Node};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic classification dataset
// ---------------------------------------------------------------------------

/// Generate `n_samples` rows of `n_features` uniform values in [0, 1).
///
/// Column 2 is pinned to 0.5 (a constant feature the split search must skip)
/// and the label is `floor(x1 + 2 * x3)`, so classes are 0, 1 and 2.
fn make_classification(n_samples: usize, n_features: usize, seed: u64) -> (Matrix, Vec<i64>) {
    assert!(n_features >= 4);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n_samples * n_features);
    for _ in 0..n_samples * n_features {
        data.push(rng.r#gen::<f64>());
    }
    let mut matrix = Matrix::new(data, n_samples, n_features).unwrap();
    let mut labels = Vec::with_capacity(n_samples);
    for row in 0..n_samples {
        matrix.set(row, 2, 0.5);
        labels.push((matrix.get(row, 1) + 2.0 * matrix.get(row, 3)).floor() as i64);
    }
    (matrix, labels)
}

fn error_rate(predictions: &[usize], labels: &[i64]) -> f64 {
    let errors = predictions
        .iter()
        .zip(labels)
        .filter(|&(&p, &l)| p as i64 != l)
        .count();
    errors as f64 / labels.len() as f64
}

// ---------------------------------------------------------------------------
// a) training_error_below_bound
// ---------------------------------------------------------------------------

/// Training error of a 50-tree forest must stay below 15%.
#[test]
fn training_error_below_bound() {
    let (matrix, labels) = make_classification(300, 8, 42);
    let mut builder = ForestBuilder::new(matrix.clone(), &labels).unwrap();
    builder.learn(2, 5, 50).unwrap();

    let predictions = builder.classify_batch(&matrix).unwrap();
    let rate = error_rate(&predictions, &labels);
    assert!(rate < 0.15, "training error rate {rate} >= 0.15");
}

// ---------------------------------------------------------------------------
// b) holdout_error_below_bound
// ---------------------------------------------------------------------------

/// Held-out error on fresh data from the same distribution must stay below 30%.
#[test]
fn holdout_error_below_bound() {
    let (train, train_labels) = make_classification(400, 6, 1);
    let (test, test_labels) = make_classification(200, 6, 2);
    let mut builder = ForestBuilder::new(train, &train_labels)
        .unwrap()
        .with_num_random_cuts(2);
    builder.learn(2, 5, 50).unwrap();

    let predictions = builder.classify_batch(&test).unwrap();
    let rate = error_rate(&predictions, &test_labels);
    assert!(rate < 0.30, "holdout error rate {rate} >= 0.30");
}

// ---------------------------------------------------------------------------
// c) single_separating_feature
// ---------------------------------------------------------------------------

/// Four rows split perfectly by one feature are all classified correctly
/// even with one feature and one cut per search.
#[test]
fn single_separating_feature() {
    let matrix = Matrix::from_rows(&[vec![0.2], vec![0.4], vec![1.6], vec![1.8]]).unwrap();
    let labels = [1, 1, 0, 0];
    let mut builder = ForestBuilder::new(matrix.clone(), &labels)
        .unwrap()
        .with_num_random_cuts(1);
    builder.learn(1, 1, 5).unwrap();

    for tree in builder.forest().unwrap().trees() {
        for (sample, &label) in matrix.rows().zip(&labels) {
            assert_eq!(tree.predict(sample).unwrap() as i64, label);
        }
    }
}

// ---------------------------------------------------------------------------
// d) constant_matrix_gives_majority_leaf
// ---------------------------------------------------------------------------

/// With every column constant, each tree is a single leaf voting the majority.
#[test]
fn constant_matrix_gives_majority_leaf() {
    let matrix = Matrix::new(vec![3.0; 7 * 3], 7, 3).unwrap();
    let labels = [0, 2, 2, 1, 2, 0, 1];
    let mut builder = ForestBuilder::new(matrix.clone(), &labels).unwrap();
    builder.learn(1, 3, 4).unwrap();

    for tree in builder.forest().unwrap().trees() {
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(
            tree.root(),
            &Node::Leaf {
                prediction: 2,
                n_samples: 7
            }
        );
    }
    assert_eq!(builder.classify_batch(&matrix).unwrap(), vec![2; 7]);
}

// ---------------------------------------------------------------------------
// e) deterministic_predictions
// ---------------------------------------------------------------------------

/// Same seed must produce identical forests across two independent runs.
#[test]
fn deterministic_predictions() {
    let (matrix, labels) = make_classification(200, 6, 7);

    let mut first = ForestBuilder::new(matrix.clone(), &labels)
        .unwrap()
        .with_seed(5)
        .with_even_cuts(true)
        .with_num_random_cuts(3);
    let mut second = first.clone();
    first.learn(3, 2, 20).unwrap();
    second.learn(3, 2, 20).unwrap();

    assert_eq!(first.forest(), second.forest());
    assert_eq!(
        first.classify_batch(&matrix).unwrap(),
        second.classify_batch(&matrix).unwrap()
    );
}

// ---------------------------------------------------------------------------
// f) larger_leaves_still_generalize
// ---------------------------------------------------------------------------

/// A coarser nmin trades training fit for smaller trees but must not collapse.
#[test]
fn larger_leaves_still_generalize() {
    let (matrix, labels) = make_classification(300, 6, 9);
    let mut fine = ForestBuilder::new(matrix.clone(), &labels).unwrap();
    let mut coarse = fine.clone();
    fine.learn(2, 5, 30).unwrap();
    coarse.learn(20, 5, 30).unwrap();

    let nodes = |b: &ForestBuilder| -> usize {
        b.forest().unwrap().trees().iter().map(|t| t.n_nodes()).sum()
    };
    assert!(nodes(&coarse) < nodes(&fine));

    let rate = error_rate(&coarse.classify_batch(&matrix).unwrap(), &labels);
    assert!(rate < 0.3, "coarse training error rate {rate} >= 0.3");
}
