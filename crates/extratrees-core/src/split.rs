use rand::Rng;
use rand::seq::SliceRandom;

use crate::impurity::gini_index;
use crate::matrix::Matrix;
use crate::node::FeatureIndex;
use crate::tree::DecisionTreeConfig;

/// Columns whose range over a subset is below this are treated as constant.
pub(crate) const CONSTANT_RANGE: f64 = 1e-6;

/// A side whose Gini index is below this is pure and becomes a leaf directly.
pub(crate) const PURE_GINI: f64 = CONSTANT_RANGE * CONSTANT_RANGE;

/// Winning candidate of a randomized split search.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value: samples with feature < threshold go left.
    pub(crate) threshold: f64,
    /// Size-weighted impurity `gini_left * n_left + gini_right * n_right`.
    pub(crate) score: f64,
    /// Number of samples routed left.
    pub(crate) n_left: usize,
    /// Number of samples routed right.
    pub(crate) n_right: usize,
    /// Left side is already pure; no further split needed.
    pub(crate) left_pure: bool,
    /// Right side is already pure; no further split needed.
    pub(crate) right_pure: bool,
}

/// Draw one threshold candidate in `[min, min + range)`.
///
/// With `even_cuts`, candidate `cut` of `n_cuts` is drawn from its own
/// equal-width sub-interval; otherwise from the full range.
fn draw_threshold<R: Rng>(
    min: f64,
    range: f64,
    cut: usize,
    n_cuts: usize,
    even_cuts: bool,
    rng: &mut R,
) -> f64 {
    let u: f64 = rng.r#gen();
    if even_cuts {
        let width = range / n_cuts as f64;
        let start = min + cut as f64 * width;
        start + u * width
    } else {
        min + u * range
    }
}

/// Find the best randomized split of `sample_indices`.
///
/// Shuffles `feature_order` in place, then walks it, skipping constant
/// columns, until `k` non-constant features have been evaluated. Each
/// evaluated feature contributes `num_random_cuts` random thresholds; every
/// threshold is scored by the size-weighted Gini sum of the two sides and the
/// lowest score wins (first one on ties).
///
/// Returns `None` when every feature is constant over the subset, or no
/// candidate produced two non-empty sides.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_random_split<R: Rng>(
    matrix: &Matrix,
    labels: &[usize],
    sample_indices: &[usize],
    n_factors: usize,
    config: &DecisionTreeConfig,
    feature_order: &mut [usize],
    rng: &mut R,
) -> Option<SplitResult> {
    feature_order.shuffle(rng);

    let mut left_counts = vec![0usize; n_factors];
    let mut right_counts = vec![0usize; n_factors];
    let mut best_score = f64::INFINITY;
    let mut best: Option<SplitResult> = None;
    let mut evaluated = 0usize;

    for &feat_idx in feature_order.iter() {
        if evaluated >= config.k {
            break;
        }

        let (min, max) = sample_indices.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), &si| {
                let v = matrix.get(si, feat_idx);
                (lo.min(v), hi.max(v))
            },
        );
        if max - min < CONSTANT_RANGE {
            continue;
        }
        let range = max - min;

        for cut in 0..config.num_random_cuts {
            let threshold = draw_threshold(
                min,
                range,
                cut,
                config.num_random_cuts,
                config.even_cuts,
                rng,
            );

            left_counts.fill(0);
            right_counts.fill(0);
            let mut n_left = 0usize;
            for &si in sample_indices {
                if matrix.get(si, feat_idx) < threshold {
                    left_counts[labels[si]] += 1;
                    n_left += 1;
                } else {
                    right_counts[labels[si]] += 1;
                }
            }
            let n_right = sample_indices.len() - n_left;
            if n_left == 0 || n_right == 0 {
                continue;
            }

            let gini_left = gini_index(&left_counts).value();
            let gini_right = gini_index(&right_counts).value();
            let score = gini_left * n_left as f64 + gini_right * n_right as f64;

            if score < best_score {
                best_score = score;
                best = Some(SplitResult {
                    feature: FeatureIndex::new(feat_idx),
                    threshold,
                    score,
                    n_left,
                    n_right,
                    left_pure: gini_left < PURE_GINI,
                    right_pure: gini_right < PURE_GINI,
                });
            }
        }

        evaluated += 1;
    }

    best
}

/// Partition `sample_indices` by `feature < threshold`, preserving order.
pub(crate) fn partition(
    matrix: &Matrix,
    sample_indices: &[usize],
    split: &SplitResult,
) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::with_capacity(split.n_left);
    let mut right = Vec::with_capacity(split.n_right);
    for &si in sample_indices {
        if matrix.get(si, split.feature.index()) < split.threshold {
            left.push(si);
        } else {
            right.push(si);
        }
    }
    (left, right)
}
