//! CSV loading, validation, and JSON result output for extratrees.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{ExperimentName, LabeledDataset};
pub use error::IoError;
pub use reader::LabeledCsvReader;
pub use writer::{EvaluationSummary, ResultWriter};
