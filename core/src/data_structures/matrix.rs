//! Dense row-major observation matrix
//!
//! Every batch handed to the detector is normalised into a [`Matrix`]: an
//! ordered collection of points sharing one dimensionality `d`. The matrix is
//! immutable after construction, so trees, scorers and explainers can share it
//! across worker threads without synchronisation.
//!
//! # Invariants
//! - `data.len() == n_rows * n_cols`
//! - every value is finite
//! - a flat scalar sequence is reshaped into `d = 1` points
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Raw point payload as received from a client
///
/// Either one row per point, or a flat list interpreted as one feature per
/// point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPoints {
    Rows(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

impl RawPoints {
    /// Number of points in the payload
    pub fn len(&self) -> usize {
        match self {
            RawPoints::Rows(rows) => rows.len(),
            RawPoints::Flat(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the payload into a validated matrix
    pub fn into_matrix(self) -> Result<Matrix, DetectionError> {
        match self {
            RawPoints::Rows(rows) => Matrix::from_rows(rows),
            RawPoints::Flat(values) => Matrix::from_column(values),
        }
    }
}

impl Default for RawPoints {
    fn default() -> Self {
        RawPoints::Rows(Vec::new())
    }
}

impl From<Vec<Vec<f64>>> for RawPoints {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        RawPoints::Rows(rows)
    }
}

impl From<Vec<f64>> for RawPoints {
    fn from(values: Vec<f64>) -> Self {
        RawPoints::Flat(values)
    }
}

/// Immutable matrix of observations, one row per point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    /// Row-major storage
    data: Vec<f64>,

    /// Number of points
    n_rows: usize,

    /// Dimensionality shared by every point
    n_cols: usize,
}

impl Matrix {
    /// Builds a matrix from explicit rows
    ///
    /// Rows of differing length or containing non-finite values are rejected
    /// with [`DetectionError::InvalidInput`]. An empty row list yields a
    /// zero-row matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DetectionError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);

        if n_rows > 0 && n_cols == 0 {
            return Err(DetectionError::InvalidInput(
                "points must have at least one feature".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(DetectionError::InvalidInput(format!(
                    "point {} has {} features, expected {}",
                    index,
                    row.len(),
                    n_cols
                )));
            }
            data.extend(row);
        }

        Self::from_vec(n_rows, n_cols, data)
    }

    /// Reshapes a flat sequence of scalars into one-feature points
    pub fn from_column(values: Vec<f64>) -> Result<Self, DetectionError> {
        let n_rows = values.len();
        let n_cols = if n_rows == 0 { 0 } else { 1 };
        Self::from_vec(n_rows, n_cols, values)
    }

    /// Builds a matrix from row-major storage
    pub fn from_vec(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Result<Self, DetectionError> {
        if data.len() != n_rows * n_cols {
            return Err(DetectionError::InvalidInput(format!(
                "storage holds {} values, expected {} x {}",
                data.len(),
                n_rows,
                n_cols
            )));
        }

        if let Some(position) = data.iter().position(|v| !v.is_finite()) {
            let (row, col) = (position / n_cols.max(1), position % n_cols.max(1));
            return Err(DetectionError::InvalidInput(format!(
                "non-finite value at point {}, feature {}",
                row, col
            )));
        }

        Ok(Self { data, n_rows, n_cols })
    }

    /// Returns `(n_rows, n_cols)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Borrows the `index`-th point
    ///
    /// # Panics
    ///
    /// Panics if `index >= n_rows`.
    #[inline]
    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.n_cols;
        &self.data[start..start + self.n_cols]
    }

    /// Reads a single value
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    /// Iterates over points in order
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        // chunks_exact(0) panics; a zero-column matrix has no rows anyway
        self.data.chunks_exact(self.n_cols.max(1)).take(self.n_rows)
    }

    /// Copies the selected rows, in the given order, into a new matrix
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &index in indices {
            data.extend_from_slice(self.row(index));
        }
        Matrix {
            data,
            n_rows: indices.len(),
            n_cols: self.n_cols,
        }
    }

    /// Returns the `(min, max)` of a feature over the given rows
    pub fn column_range(&self, col: usize, indices: &[usize]) -> Option<(f64, f64)> {
        indices.iter().map(|&row| self.get(row, col)).fold(None, |acc, value| match acc {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
    }

    /// Copies the matrix into explicit rows
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }
}
