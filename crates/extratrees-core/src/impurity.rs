//! Gini impurity and majority selection over class-count histograms.

use std::fmt;

/// Gini impurity value in `[0, 1)`. Zero means a pure node.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Impurity(f64);

impl Impurity {
    /// Create a new impurity value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Compute the Gini index `1 - Σ(count_i²) / total²` of a class histogram.
///
/// Returns `Impurity(0.0)` for an empty histogram.
#[must_use]
pub fn gini_index(counts: &[usize]) -> Impurity {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return Impurity::new(0.0);
    }
    let sum_sq: f64 = counts.iter().map(|&c| (c as f64) * (c as f64)).sum();
    let total = total as f64;
    Impurity::new(1.0 - sum_sq / (total * total))
}

/// Return the index of the highest count, preferring the lowest index on ties.
///
/// Returns 0 for an empty slice.
#[must_use]
pub fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0usize;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}
