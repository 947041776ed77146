//! CSV reader for labeled feature tables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use extratrees_core::Matrix;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::LabeledDataset;

/// Reads a labeled feature table from a CSV file.
///
/// Expected CSV format:
/// - Header row required; the first column is a row id
/// - One column (default `label`) holds integer class labels
/// - Every other column is a numeric feature
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingLabelColumn`] | Header has no label column |
/// | [`IoError::NoFeatureColumns`] | Only id and label columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Feature cell is NaN, Inf, or unparseable |
/// | [`IoError::InvalidLabel`] | Label cell is not an integer |
/// | [`IoError::DuplicateRowId`] | Same row id appears twice |
pub struct LabeledCsvReader {
    path: PathBuf,
    label_column: String,
}

impl LabeledCsvReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            label_column: "label".to_string(),
        }
    }

    /// Set the name of the label column.
    #[must_use]
    pub fn with_label_column(mut self, label_column: impl Into<String>) -> Self {
        self.label_column = label_column.into();
        self
    }

    /// Read and validate the CSV file, returning a [`LabeledDataset`].
    #[instrument(skip(self), fields(path = %self.path.display(), label = %self.label_column))]
    pub fn read(&self) -> Result<LabeledDataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so that our own InconsistentRowLength check fires
        // instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.parse_error(e))?.clone();
        let expected_cols = header.len();

        let label_idx = header
            .iter()
            .skip(1)
            .position(|name| name == self.label_column)
            .map(|p| p + 1)
            .ok_or_else(|| IoError::MissingLabelColumn {
                path: self.path.clone(),
                column: self.label_column.clone(),
            })?;

        let feature_cols: Vec<usize> = (1..expected_cols).filter(|&c| c != label_idx).collect();
        if feature_cols.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let feature_names: Vec<String> = feature_cols
            .iter()
            .map(|&c| header[c].to_string())
            .collect();
        debug!(expected_cols, label_idx, n_features = feature_cols.len(), "read CSV header");

        let mut row_ids = Vec::new();
        let mut labels = Vec::new();
        let mut values = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.parse_error(e))?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    row_id: record.get(0).unwrap_or("").to_string(),
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let row_id = record[0].to_string();
            if let Some(&first_row) = seen.get(&row_id) {
                return Err(IoError::DuplicateRowId {
                    path: self.path.clone(),
                    row_id,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(row_id.clone(), row_index);

            let raw_label = record[label_idx].trim();
            let label: i64 = raw_label.parse().map_err(|_| IoError::InvalidLabel {
                path: self.path.clone(),
                row_index,
                raw: raw_label.to_string(),
            })?;

            for (col_index, &c) in feature_cols.iter().enumerate() {
                let raw = record[c].trim();
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        col_index,
                        raw: raw.to_string(),
                    })?;
                values.push(value);
            }

            row_ids.push(row_id);
            labels.push(label);
        }

        if row_ids.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let features = Matrix::new(values, row_ids.len(), feature_cols.len()).map_err(|e| {
            IoError::Matrix {
                path: self.path.clone(),
                source: e,
            }
        })?;

        info!(
            n_samples = row_ids.len(),
            n_features = feature_names.len(),
            "labeled dataset loaded"
        );

        Ok(LabeledDataset::new(row_ids, feature_names, features, labels))
    }

    fn parse_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_valid_table() {
        let csv = "id,x1,label,x2\nr1,0.5,1,2.0\nr2,1.5,0,3.0\nr3,2.5,2,4.0\n";
        let f = write_csv(csv);
        let ds = LabeledCsvReader::new(f.path()).read().unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.feature_names(), &["x1", "x2"]);
        assert_eq!(ds.row_ids()[1], "r2");
        assert_eq!(ds.labels(), &[1, 0, 2]);
        assert_eq!(ds.features().row(2), &[2.5, 4.0]);
    }

    #[test]
    fn custom_label_column() {
        let csv = "id,class,a\nr1,3,1.0\nr2,-1,2.0\n";
        let f = write_csv(csv);
        let ds = LabeledCsvReader::new(f.path())
            .with_label_column("class")
            .read()
            .unwrap();
        assert_eq!(ds.labels(), &[3, -1]);
        assert_eq!(ds.feature_names(), &["a"]);
    }

    #[test]
    fn missing_label_column_error() {
        let csv = "id,a,b\nr1,1.0,2.0\n";
        let f = write_csv(csv);
        let err = LabeledCsvReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::MissingLabelColumn { .. }));
    }

    #[test]
    fn no_feature_columns_error() {
        let csv = "id,label\nr1,0\n";
        let f = write_csv(csv);
        let err = LabeledCsvReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::NoFeatureColumns { .. }));
    }

    #[test]
    fn empty_dataset_error() {
        let csv = "id,a,label\n";
        let f = write_csv(csv);
        let err = LabeledCsvReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn inconsistent_row_length_error() {
        let csv = "id,a,label\nr1,1.0,0\nr2,2.0\n";
        let f = write_csv(csv);
        let err = LabeledCsvReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength { row_index: 1, expected: 3, got: 2, .. }
        ));
    }

    #[test]
    fn non_finite_value_error() {
        let csv = "id,a,b,label\nr1,1.0,NaN,0\n";
        let f = write_csv(csv);
        let err = LabeledCsvReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::NonFiniteValue { row_index: 0, col_index: 1, .. }
        ));
    }

    #[test]
    fn invalid_label_error() {
        let csv = "id,a,label\nr1,1.0,1.5\n";
        let f = write_csv(csv);
        let err = LabeledCsvReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::InvalidLabel { row_index: 0, .. }));
    }

    #[test]
    fn duplicate_row_id_error() {
        let csv = "id,a,label\nr1,1.0,0\nr1,2.0,1\n";
        let f = write_csv(csv);
        let err = LabeledCsvReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::DuplicateRowId { first_row: 0, second_row: 1, .. }
        ));
    }

    #[test]
    fn missing_file_error() {
        let err = LabeledCsvReader::new(Path::new("/nonexistent/table.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
