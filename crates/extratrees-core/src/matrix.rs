//! Dense row-major matrix of `f64` feature values.

use std::ops::{Index, IndexMut};

use crate::error::ForestError;

/// Dense row-major matrix. Rows are samples, columns are features.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Matrix {
    data: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl Matrix {
    /// Create a matrix from flat row-major storage.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidShape`] if `data.len() != nrows * ncols`.
    pub fn new(data: Vec<f64>, nrows: usize, ncols: usize) -> Result<Self, ForestError> {
        if data.len() != nrows * ncols {
            return Err(ForestError::InvalidShape {
                len: data.len(),
                nrows,
                ncols,
            });
        }
        Ok(Self { data, nrows, ncols })
    }

    /// Create an `nrows x ncols` matrix filled with zeros.
    #[must_use]
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: vec![0.0; nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Create a matrix from a slice of equally sized rows.
    ///
    /// An empty slice yields a `0 x 0` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::RaggedRows`] if the rows differ in length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ForestError> {
        let ncols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * ncols);
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(ForestError::RaggedRows {
                    row_index,
                    expected: ncols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            nrows: rows.len(),
            ncols,
        })
    }

    /// Return the number of rows (samples).
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Return the number of columns (features).
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Return the value at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= nrows` or `col >= ncols`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self[(row, col)]
    }

    /// Overwrite the value at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= nrows` or `col >= ncols`.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self[(row, col)] = value;
    }

    /// Borrow row `row` as a slice of length `ncols`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= nrows`.
    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        assert!(row < self.nrows, "row index {row} out of bounds for {} rows", self.nrows);
        &self.data[row * self.ncols..(row + 1) * self.ncols]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        (0..self.nrows).map(move |r| self.row(r))
    }

    /// Return the position of the first NaN or infinite value, if any.
    #[must_use]
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        self.data
            .iter()
            .position(|v| !v.is_finite())
            .map(|i| (i / self.ncols, i % self.ncols))
    }

    /// Return `true` if any value is NaN or infinite.
    #[must_use]
    pub fn has_non_finite(&self) -> bool {
        self.first_non_finite().is_some()
    }

    /// Return the flat row-major storage.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        assert!(row < self.nrows, "row index {row} out of bounds for {} rows", self.nrows);
        assert!(col < self.ncols, "column index {col} out of bounds for {} columns", self.ncols);
        &self.data[row * self.ncols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        assert!(row < self.nrows, "row index {row} out of bounds for {} rows", self.nrows);
        assert!(col < self.ncols, "column index {col} out of bounds for {} columns", self.ncols);
        &mut self.data[row * self.ncols + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_matrix() -> Matrix {
        // 3 x 2
        Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2).unwrap()
    }

    #[test]
    fn row_major_access() {
        let m = make_matrix();
        assert_eq!(m.get(0, 1), 2.0);
        assert_eq!(m.get(2, 0), 5.0);
        assert_eq!(m[(1, 1)], 4.0);
    }

    #[test]
    fn set_overwrites_single_cell() {
        let mut m = make_matrix();
        m.set(1, 0, 9.5);
        assert_eq!(m.get(1, 0), 9.5);
        assert_eq!(m.get(1, 1), 4.0);
    }

    #[test]
    fn invalid_shape_error() {
        let err = Matrix::new(vec![1.0, 2.0, 3.0], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            ForestError::InvalidShape { len: 3, nrows: 2, ncols: 2 }
        ));
    }

    #[test]
    fn from_rows_matches_new() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        assert_eq!(Matrix::from_rows(&rows).unwrap(), make_matrix());
    }

    #[test]
    fn from_rows_ragged_error() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        let err = Matrix::from_rows(&rows).unwrap_err();
        assert!(matches!(
            err,
            ForestError::RaggedRows { row_index: 1, expected: 2, got: 1 }
        ));
    }

    #[test]
    fn rows_iterate_in_order() {
        let m = make_matrix();
        let rows: Vec<&[f64]> = m.rows().collect();
        assert_eq!(rows, vec![&[1.0, 2.0][..], &[3.0, 4.0][..], &[5.0, 6.0][..]]);
    }

    #[test]
    fn non_finite_detection() {
        let mut m = make_matrix();
        assert!(!m.has_non_finite());
        m.set(2, 1, f64::INFINITY);
        assert_eq!(m.first_non_finite(), Some((2, 1)));
        m.set(0, 1, f64::NAN);
        assert_eq!(m.first_non_finite(), Some((0, 1)));
    }

    #[test]
    fn zeros_shape() {
        let m = Matrix::zeros(4, 3);
        assert_eq!(m.nrows(), 4);
        assert_eq!(m.ncols(), 3);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic(expected = "column index 2 out of bounds")]
    fn out_of_bounds_column_panics() {
        let _ = make_matrix().get(0, 2);
    }
}
