/// Errors from matrix construction, forest training and prediction.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when the training matrix has zero rows.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training matrix has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when the label vector length differs from the matrix row count.
    #[error("input has {n_rows} rows but {n_labels} labels were given")]
    LengthMismatch {
        /// Number of rows in the feature matrix.
        n_rows: usize,
        /// Number of labels supplied.
        n_labels: usize,
    },

    /// Returned when a label is negative. Labels are factor indices and must be >= 0.
    #[error("negative factor label {label} at sample {sample_index}")]
    NegativeLabel {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The negative label value.
        label: i64,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at row {row}, column {col}")]
    NonFiniteValue {
        /// Zero-based row of the offending cell.
        row: usize,
        /// Zero-based column of the offending cell.
        col: usize,
    },

    /// Returned when flat matrix storage does not hold `nrows * ncols` values.
    #[error("matrix data has {len} values, expected {nrows} x {ncols}")]
    InvalidShape {
        /// Length of the supplied data.
        len: usize,
        /// Requested row count.
        nrows: usize,
        /// Requested column count.
        ncols: usize,
    },

    /// Returned when rows passed to [`crate::Matrix::from_rows`] differ in length.
    #[error("row {row_index} has {got} columns, expected {expected}")]
    RaggedRows {
        /// The zero-based index of the offending row.
        row_index: usize,
        /// Column count of the first row.
        expected: usize,
        /// Column count of the offending row.
        got: usize,
    },

    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when the per-split feature budget `k` is zero.
    #[error("k (features examined per split) must be at least 1, got {k}")]
    InvalidFeatureBudget {
        /// The invalid k value provided.
        k: usize,
    },

    /// Returned when num_random_cuts is zero.
    #[error("num_random_cuts must be at least 1, got {num_random_cuts}")]
    InvalidCutCount {
        /// The invalid num_random_cuts value provided.
        num_random_cuts: usize,
    },

    /// Returned when an explicit factor count cannot hold every label or
    /// every class a tree can predict.
    #[error("n_factors is {n_factors}, but labels require at least {required}")]
    InvalidFactorCount {
        /// The factor count requested.
        n_factors: usize,
        /// `max(label) + 1`.
        required: usize,
    },

    /// Returned when a tree is requested over an empty sample subset.
    #[error("sample subset is empty")]
    EmptySampleSet,

    /// Returned when a sample subset references a row outside the matrix.
    #[error("sample index {index} out of bounds for {n_rows} rows")]
    SampleIndexOutOfBounds {
        /// The offending sample index.
        index: usize,
        /// Number of rows in the training matrix.
        n_rows: usize,
    },

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when prediction is requested before any forest was learned.
    #[error("no forest has been learned yet")]
    NotTrained,
}
