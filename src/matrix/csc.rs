//! Compressed sparse column matrix.

use crate::error::{Result, SolverError};
use crate::tags::Transpose;

use super::{check_apply_dims, CsrMatrix, LinearOperator, SparseVector};

/// Sparse matrix in compressed column storage.
///
/// Stored as the CSR form of its transpose, so every conversion is a single
/// counting-sort transpose.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    transposed: CsrMatrix,
}

impl CscMatrix {
    /// Create from raw CSC arrays (`col_ptr` of length `ncols + 1`).
    pub fn new(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let transposed = CsrMatrix::new(ncols, nrows, col_ptr, row_idx, values).map_err(|e| {
            match e {
                // Rows and columns swap roles in the transposed storage
                SolverError::WrongCol { comment, .. } => {
                    SolverError::wrong_row("CscMatrix::new", comment)
                }
                other => other,
            }
        })?;
        Ok(Self { transposed })
    }

    /// Build from coordinate triples in any order; duplicates are summed.
    pub fn from_coordinates(
        nrows: usize,
        ncols: usize,
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
    ) -> Result<Self> {
        Ok(Self::from(CsrMatrix::from_coordinates(
            nrows, ncols, rows, cols, values,
        )?))
    }

    pub fn nrows(&self) -> usize {
        self.transposed.ncols()
    }

    pub fn ncols(&self) -> usize {
        self.transposed.nrows()
    }

    pub fn nnz(&self) -> usize {
        self.transposed.nnz()
    }

    pub fn col_ptr(&self) -> &[usize] {
        self.transposed.row_ptr()
    }

    pub fn row_indices(&self) -> &[usize] {
        self.transposed.col_indices()
    }

    pub fn values(&self) -> &[f64] {
        self.transposed.values()
    }

    /// Entry `(i, j)`; zero when not stored.
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is outside the matrix.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.transposed.get(j, i)
    }

    /// Column `j` as a dense vector.
    pub fn get_col(&self, j: usize) -> Result<Vec<f64>> {
        Ok(self.get_col_sparse(j)?.to_dense())
    }

    /// Column `j` as a sparse vector.
    pub fn get_col_sparse(&self, j: usize) -> Result<SparseVector> {
        if j >= self.ncols() {
            return Err(SolverError::wrong_col(
                "CscMatrix::get_col",
                format!("column {} with {} columns", j, self.ncols()),
            ));
        }
        self.transposed.get_row_sparse(j)
    }

    /// Row `i` as a sparse vector.
    pub fn get_row_sparse(&self, i: usize) -> Result<SparseVector> {
        if i >= self.nrows() {
            return Err(SolverError::wrong_row(
                "CscMatrix::get_row",
                format!("row {} with {} rows", i, self.nrows()),
            ));
        }
        self.transposed.get_col_sparse(i)
    }

    /// Compressed row copy.
    pub fn to_csr(&self) -> CsrMatrix {
        self.transposed.transpose()
    }
}

impl From<CsrMatrix> for CscMatrix {
    fn from(csr: CsrMatrix) -> Self {
        Self {
            transposed: csr.transpose(),
        }
    }
}

impl From<CscMatrix> for CsrMatrix {
    fn from(csc: CscMatrix) -> Self {
        csc.to_csr()
    }
}

impl LinearOperator for CscMatrix {
    fn nrows(&self) -> usize {
        self.transposed.ncols()
    }

    fn ncols(&self) -> usize {
        self.transposed.nrows()
    }

    fn apply(&self, trans: Transpose, x: &[f64], y: &mut [f64]) -> Result<()> {
        check_apply_dims(self, trans, x, y, "CscMatrix::apply")?;
        self.transposed.apply(trans.reversed(), x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csc_layout_and_conversion() {
        // [[1, 0], [2, 3]]
        let csc = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(csc.get(1, 0), 2.0);
        assert_eq!(csc.get(0, 1), 0.0);
        assert_eq!(csc.get_col(0).unwrap(), vec![1.0, 2.0]);

        let csr = CsrMatrix::from(csc.clone());
        assert_eq!(csr.get(1, 1), 3.0);
        assert_eq!(CscMatrix::from(csr), csc);
    }

    #[test]
    fn test_csc_apply_matches_csr() {
        let csr =
            CsrMatrix::from_coordinates(2, 3, &[0, 1, 1], &[2, 0, 1], &[1.0, 2.0, 3.0]).unwrap();
        let csc = CscMatrix::from(csr.clone());
        let x = [1.0, -1.0, 2.0];
        assert_eq!(csr.mul_vec(&x).unwrap(), {
            let mut y = vec![0.0; 2];
            csc.apply(Transpose::NoTrans, &x, &mut y).unwrap();
            y
        });
    }
}
