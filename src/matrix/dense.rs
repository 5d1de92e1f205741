//! Dense row-major matrix.

use crate::error::{Result, SolverError};
use crate::tags::{Diag, Transpose, Uplo};

use super::{check_apply_dims, LinearOperator};

/// Dense matrix stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Create a zero matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    /// Create the `n x n` identity.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Build from a list of rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(nrows * ncols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(SolverError::wrong_dim(
                    "DenseMatrix::from_rows",
                    format!("row {} has length {}, expected {}", i, row.len(), ncols),
                ));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { nrows, ncols, data })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Set every entry to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.ncols + col]
    }

    /// Set matrix element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.ncols + col] = value;
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.ncols + col] += value;
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// Swap rows `a` and `b`.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.ncols {
            self.data.swap(a * self.ncols + j, b * self.ncols + j);
        }
    }

    /// Raw row-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Compute `A x`.
    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut y = vec![0.0; self.nrows];
        self.apply(Transpose::NoTrans, x, &mut y)?;
        Ok(y)
    }
}

impl LinearOperator for DenseMatrix {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn apply(&self, trans: Transpose, x: &[f64], y: &mut [f64]) -> Result<()> {
        check_apply_dims(self, trans, x, y, "DenseMatrix::apply")?;
        if trans.is_transposed() {
            y.fill(0.0);
            for i in 0..self.nrows {
                let xi = x[i];
                for (yj, aij) in y.iter_mut().zip(self.row(i)) {
                    *yj += aij * xi;
                }
            }
        } else {
            for (i, yi) in y.iter_mut().enumerate() {
                *yi = super::dot(self.row(i), x);
            }
        }
        Ok(())
    }
}

/// Solve `op(T) x = b` in place, where `T` is the `uplo` triangle of the
/// square matrix `a`.
///
/// With `Diag::Unit` the diagonal of `a` is not referenced. A zero on a
/// referenced diagonal is reported as [`SolverError::Singular`].
pub fn triangular_solve(
    a: &DenseMatrix,
    uplo: Uplo,
    diag: Diag,
    trans: Transpose,
    x: &mut [f64],
) -> Result<()> {
    let n = a.nrows;
    if a.ncols != n || x.len() != n {
        return Err(SolverError::wrong_dim(
            "triangular_solve",
            format!("matrix is {}x{}, rhs has length {}", a.nrows, a.ncols, x.len()),
        ));
    }

    let entry = |i: usize, j: usize| if trans.is_transposed() { a.get(j, i) } else { a.get(i, j) };
    let lower = match (uplo, trans.is_transposed()) {
        (Uplo::Lower, false) | (Uplo::Upper, true) => true,
        (Uplo::Upper, false) | (Uplo::Lower, true) => false,
    };

    let divide = |i: usize, x: &mut [f64]| -> Result<()> {
        if diag == Diag::NonUnit {
            let d = entry(i, i);
            if d == 0.0 {
                return Err(SolverError::singular(i, "triangular_solve"));
            }
            x[i] /= d;
        }
        Ok(())
    };

    if lower {
        // Forward substitution
        for i in 0..n {
            for j in 0..i {
                x[i] -= entry(i, j) * x[j];
            }
            divide(i, x)?;
        }
    } else {
        // Back substitution
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= entry(i, j) * x[j];
            }
            divide(i, x)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_get_set_add() {
        let mut m = DenseMatrix::zeros(2, 3);
        m.set(1, 2, 4.0);
        m.add(1, 2, 1.5);
        assert_eq!(m.get(1, 2), 5.5);
        assert_eq!(m.row(1), &[0.0, 0.0, 5.5]);
    }

    #[test]
    fn test_dense_apply_transpose() {
        let m = DenseMatrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let y = m.mul_vec(&[1.0, 0.0, -1.0]).unwrap();
        assert_eq!(y, vec![-2.0, -2.0]);
        let mut z = vec![0.0; 3];
        m.apply(Transpose::Trans, &[1.0, 1.0], &mut z).unwrap();
        assert_eq!(z, vec![5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_triangular_solve_both_orientations() {
        // L = [[2, 0], [1, 4]]
        let l = DenseMatrix::from_rows(&[vec![2.0, 0.0], vec![1.0, 4.0]]).unwrap();
        let mut x = vec![2.0, 9.0];
        triangular_solve(&l, Uplo::Lower, Diag::NonUnit, Transpose::NoTrans, &mut x).unwrap();
        assert_eq!(x, vec![1.0, 2.0]);

        // L^T x = b with L^T = [[2, 1], [0, 4]]
        let mut y = vec![4.0, 8.0];
        triangular_solve(&l, Uplo::Lower, Diag::NonUnit, Transpose::Trans, &mut y).unwrap();
        assert_eq!(y, vec![1.0, 2.0]);
    }

    #[test]
    fn test_triangular_solve_zero_diagonal() {
        let u = DenseMatrix::from_rows(&[vec![1.0, 1.0], vec![0.0, 0.0]]).unwrap();
        let mut x = vec![1.0, 1.0];
        let err = triangular_solve(&u, Uplo::Upper, Diag::NonUnit, Transpose::NoTrans, &mut x)
            .unwrap_err();
        assert_eq!(err.info(), Some(2));
    }
}
