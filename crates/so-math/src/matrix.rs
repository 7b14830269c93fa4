//! `Matrix`: a two-dimensional matrix of reals.
//!
//! Constraint blocks (`Ce`, `Ci`) and the stacked active-set matrix are
//! `Matrix`es. This is a thin newtype around `nalgebra::DMatrix<f64>` with
//! row-oriented helpers used by the constraint and LP code.

use crate::array::Array;
use nalgebra::DMatrix;
use so_core::Real;
use std::ops::{Index, IndexMut, Mul};

/// A dynamically-sized 2D matrix of `Real` values (row-major access).
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<Real>);

impl Matrix {
    /// Create a zero-filled `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::zeros(rows, cols))
    }

    /// Create from a row-major data slice.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[Real]) -> Self {
        Self(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Borrow the inner `DMatrix`.
    pub fn inner(&self) -> &DMatrix<Real> {
        &self.0
    }

    /// Extract a row as an `Array`.
    pub fn row(&self, i: usize) -> Array {
        let data: Vec<Real> = self.0.row(i).iter().copied().collect();
        Array::from_vec(data)
    }

    /// Dot product of row `i` with `v`, without materialising the row.
    pub fn row_dot(&self, i: usize, v: &Array) -> Real {
        self.0.row(i).iter().zip(v.iter()).map(|(a, b)| a * b).sum()
    }

    /// Matrix-vector product `M * v`.
    pub fn mul_vec(&self, v: &Array) -> Array {
        Array::from((&self.0 * v.inner()).clone_owned())
    }

    /// New matrix made of the listed rows, in the listed order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self(self.0.select_rows(indices.iter()))
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<Matrix> for DMatrix<Real> {
    fn from(m: Matrix) -> Self {
        m.0
    }
}

// ── Indexing ──────────────────────────────────────────────────────────────────

impl Index<(usize, usize)> for Matrix {
    type Output = Real;
    fn index(&self, (i, j): (usize, usize)) -> &Real {
        &self.0[(i, j)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Real {
        &mut self.0[(i, j)]
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

impl Mul<&Array> for &Matrix {
    type Output = Array;
    fn mul(self, rhs: &Array) -> Array {
        self.mul_vec(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_and_index_mut() {
        let mut m = Matrix::zeros(2, 3);
        m[(1, 2)] = 4.0;
        assert_eq!((m.rows(), m.cols()), (2, 3));
        assert_eq!(m.row(1).to_vec(), vec![0.0, 0.0, 4.0]);
    }

    #[test]
    fn matrix_vector_mul() {
        let m = Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let v = Array::from_slice(&[1.0, 1.0, 1.0]);
        let result = &m * &v;
        assert_eq!(result.size(), 2);
        assert!((result[0] - 6.0).abs() < 1e-12);
        assert!((result[1] - 15.0).abs() < 1e-12);
        assert!((m.row_dot(1, &v) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn select_rows_keeps_order() {
        let m = Matrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let s = m.select_rows(&[2, 0]);
        assert_eq!(s.rows(), 2);
        assert_eq!(s[(0, 0)], 5.0);
        assert_eq!(s[(1, 1)], 2.0);
    }
}
