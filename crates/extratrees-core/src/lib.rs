//! Extra-Trees classification: randomized tree ensembles over numeric data.
//!
//! Provides an extremely randomized trees classifier: every tree is grown
//! from the full training set (no bootstrap), split thresholds are drawn at
//! random within each feature's range and scored by size-weighted Gini
//! impurity, and predictions are a majority vote across the ensemble.
//! Randomness comes from a seeded ChaCha stream, one per tree.

mod error;
mod forest;
mod impurity;
mod matrix;
mod node;
mod predict;
mod split;
mod tree;

pub use error::ForestError;
pub use forest::{Forest, ForestBuilder};
pub use impurity::{Impurity, gini_index, majority_class};
pub use matrix::Matrix;
pub use node::{FeatureIndex, Node, NodeIndex};
pub use predict::vote;
pub use tree::{DecisionTree, DecisionTreeConfig};
