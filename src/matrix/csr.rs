//! Compressed sparse row matrix.

use std::collections::HashSet;

use rand::Rng;

use crate::error::{Result, SolverError};
use crate::tags::Transpose;

use super::{check_apply_dims, DenseMatrix, LinearOperator, SparseVector};

/// Sparse matrix in compressed row storage.
///
/// Column indices are strictly increasing inside each row. The `symmetric`
/// flag is a declared property of the matrix (used by the incomplete
/// factorization to pick its symmetric variant); storage is always general.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    symmetric: bool,
}

impl CsrMatrix {
    /// Create a matrix from raw CSR arrays, validating their structure.
    pub fn new(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        const FUNCTION: &str = "CsrMatrix::new";
        if row_ptr.len() != nrows + 1 {
            return Err(SolverError::wrong_dim(
                FUNCTION,
                format!("row_ptr has length {}, expected {}", row_ptr.len(), nrows + 1),
            ));
        }
        if col_idx.len() != values.len() {
            return Err(SolverError::wrong_dim(
                FUNCTION,
                format!("{} column indices for {} values", col_idx.len(), values.len()),
            ));
        }
        if row_ptr[0] != 0 || row_ptr[nrows] != col_idx.len() {
            return Err(SolverError::wrong_index(
                FUNCTION,
                "row_ptr must start at 0 and end at nnz",
            ));
        }
        for i in 0..nrows {
            let (start, end) = (row_ptr[i], row_ptr[i + 1]);
            if start > end {
                return Err(SolverError::wrong_index(
                    FUNCTION,
                    format!("row_ptr decreases at row {}", i),
                ));
            }
            let cols = &col_idx[start..end];
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(SolverError::wrong_index(
                    FUNCTION,
                    format!("columns of row {} are not strictly increasing", i),
                ));
            }
            if let Some(&c) = cols.last() {
                if c >= ncols {
                    return Err(SolverError::wrong_col(
                        FUNCTION,
                        format!("column {} in row {} exceeds {} columns", c, i, ncols),
                    ));
                }
            }
        }
        Ok(Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
            symmetric: false,
        })
    }

    /// Assemble from arrays that are valid by construction.
    pub(crate) fn from_parts(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(row_ptr.len(), nrows + 1);
        Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
            symmetric: false,
        }
    }

    /// Matrix with no stored entries.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::from_parts(nrows, ncols, vec![0; nrows + 1], Vec::new(), Vec::new())
    }

    /// The `n x n` identity.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::from_parts(n, n, (0..=n).collect(), (0..n).collect(), vec![1.0; n]);
        m.symmetric = true;
        m
    }

    /// Build from coordinate triples in any order. Duplicates are summed in
    /// input order.
    pub fn from_coordinates(
        nrows: usize,
        ncols: usize,
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
    ) -> Result<Self> {
        const FUNCTION: &str = "CsrMatrix::from_coordinates";
        if rows.len() != cols.len() || rows.len() != values.len() {
            return Err(SolverError::wrong_dim(
                FUNCTION,
                format!(
                    "{} row indices, {} column indices, {} values",
                    rows.len(),
                    cols.len(),
                    values.len()
                ),
            ));
        }
        for (&r, &c) in rows.iter().zip(cols) {
            if r >= nrows {
                return Err(SolverError::wrong_row(
                    FUNCTION,
                    format!("row {} with {} rows", r, nrows),
                ));
            }
            if c >= ncols {
                return Err(SolverError::wrong_col(
                    FUNCTION,
                    format!("column {} with {} columns", c, ncols),
                ));
            }
        }

        // Bucket entries by row, keeping input order inside a row
        let mut start = vec![0usize; nrows + 1];
        for &r in rows {
            start[r + 1] += 1;
        }
        for i in 0..nrows {
            start[i + 1] += start[i];
        }
        let mut next = start.clone();
        let mut entries = vec![(0usize, 0.0f64); rows.len()];
        for ((&r, &c), &v) in rows.iter().zip(cols).zip(values) {
            entries[next[r]] = (c, v);
            next[r] += 1;
        }

        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::with_capacity(rows.len());
        let mut vals: Vec<f64> = Vec::with_capacity(rows.len());
        row_ptr.push(0);
        for i in 0..nrows {
            let segment = &mut entries[start[i]..start[i + 1]];
            segment.sort_by_key(|&(c, _)| c);
            let row_start = col_idx.len();
            for &(c, v) in segment.iter() {
                if col_idx.len() > row_start && col_idx.last() == Some(&c) {
                    if let Some(last) = vals.last_mut() {
                        *last += v;
                    }
                } else {
                    col_idx.push(c);
                    vals.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }

        Ok(Self::from_parts(nrows, ncols, row_ptr, col_idx, vals))
    }

    /// Coordinate triples `(rows, cols, values)`, row by row.
    pub fn to_coordinates(&self) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        let mut rows = Vec::with_capacity(self.nnz());
        for i in 0..self.nrows {
            rows.extend(std::iter::repeat(i).take(self.row_ptr[i + 1] - self.row_ptr[i]));
        }
        (rows, self.col_idx.clone(), self.values.clone())
    }

    /// Random matrix with `nnz` entries at distinct random positions
    /// (capped at `nrows * ncols`).
    pub fn random<R: Rng + ?Sized>(nrows: usize, ncols: usize, nnz: usize, rng: &mut R) -> Self {
        let mut m = Self::zeros(nrows, ncols);
        m.fill_rand(nnz, rng);
        m
    }

    /// Replace the content with `nnz` random entries, keeping the shape.
    /// The symmetry flag is cleared.
    pub fn fill_rand<R: Rng + ?Sized>(&mut self, nnz: usize, rng: &mut R) {
        let capacity = self.nrows * self.ncols;
        let target = nnz.min(capacity);
        let mut seen = HashSet::with_capacity(target);
        let (mut rows, mut cols, mut values) = (
            Vec::with_capacity(target),
            Vec::with_capacity(target),
            Vec::with_capacity(target),
        );
        while rows.len() < target {
            let i = rng.gen_range(0..self.nrows);
            let j = rng.gen_range(0..self.ncols);
            if seen.insert((i, j)) {
                rows.push(i);
                cols.push(j);
                values.push(rng.gen_range(0.1..1.0));
            }
        }
        // Positions are in range, so assembly cannot fail
        if let Ok(m) = Self::from_coordinates(self.nrows, self.ncols, &rows, &cols, &values) {
            *self = m;
        }
    }

    /// Release the storage; the matrix becomes `0 x 0`.
    pub fn clear(&mut self) {
        *self = Self::zeros(0, 0);
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Whether the matrix is declared symmetric.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Declare (or retract) symmetry. Only square matrices can be symmetric.
    pub fn set_symmetric(&mut self, symmetric: bool) {
        self.symmetric = symmetric && self.is_square();
    }

    /// Check `|a_ij - a_ji| <= tol` for every stored entry.
    pub fn is_numerically_symmetric(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        (0..self.nrows).all(|i| {
            let (cols, vals) = self.row(i);
            cols.iter()
                .zip(vals)
                .all(|(&j, &v)| (v - self.get(j, i)).abs() <= tol)
        })
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Entry `(i, j)`, checked.
    pub fn try_get(&self, i: usize, j: usize) -> Result<f64> {
        if i >= self.nrows {
            return Err(SolverError::wrong_row(
                "CsrMatrix::get",
                format!("row {} with {} rows", i, self.nrows),
            ));
        }
        if j >= self.ncols {
            return Err(SolverError::wrong_col(
                "CsrMatrix::get",
                format!("column {} with {} columns", j, self.ncols),
            ));
        }
        let (cols, vals) = self.row(i);
        Ok(match cols.binary_search(&j) {
            Ok(pos) => vals[pos],
            Err(_) => 0.0,
        })
    }

    /// Entry `(i, j)`; zero when not stored.
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is outside the matrix.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self.try_get(i, j) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }

    /// Row `i` as a dense vector of length `ncols`.
    pub fn get_row(&self, i: usize) -> Result<Vec<f64>> {
        Ok(self.get_row_sparse(i)?.to_dense())
    }

    /// Column `j` as a dense vector of length `nrows`.
    pub fn get_col(&self, j: usize) -> Result<Vec<f64>> {
        Ok(self.get_col_sparse(j)?.to_dense())
    }

    /// Row `i` as a sparse vector.
    pub fn get_row_sparse(&self, i: usize) -> Result<SparseVector> {
        if i >= self.nrows {
            return Err(SolverError::wrong_row(
                "CsrMatrix::get_row",
                format!("row {} with {} rows", i, self.nrows),
            ));
        }
        let (cols, vals) = self.row(i);
        Ok(SparseVector::from_sorted(self.ncols, cols.to_vec(), vals.to_vec()))
    }

    /// Column `j` as a sparse vector.
    pub fn get_col_sparse(&self, j: usize) -> Result<SparseVector> {
        if j >= self.ncols {
            return Err(SolverError::wrong_col(
                "CsrMatrix::get_col",
                format!("column {} with {} columns", j, self.ncols),
            ));
        }
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            if let Ok(pos) = cols.binary_search(&j) {
                indices.push(i);
                values.push(vals[pos]);
            }
        }
        Ok(SparseVector::from_sorted(self.nrows, indices, values))
    }

    /// Diagonal entries (zero where not stored).
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.nrows.min(self.ncols)).map(|i| self.get(i, i)).collect()
    }

    /// Transposed matrix.
    pub fn transpose(&self) -> CsrMatrix {
        let mut row_ptr = vec![0usize; self.ncols + 1];
        for &c in &self.col_idx {
            row_ptr[c + 1] += 1;
        }
        for j in 0..self.ncols {
            row_ptr[j + 1] += row_ptr[j];
        }
        let mut next = row_ptr.clone();
        let mut col_idx = vec![0usize; self.nnz()];
        let mut values = vec![0.0; self.nnz()];
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&c, &v) in cols.iter().zip(vals) {
                col_idx[next[c]] = i;
                values[next[c]] = v;
                next[c] += 1;
            }
        }
        let mut t = Self::from_parts(self.ncols, self.nrows, row_ptr, col_idx, values);
        t.symmetric = self.symmetric;
        t
    }

    /// Symmetric permutation `B = P A Pᵀ` with `B(i, j) = A(perm[i], perm[j])`.
    pub fn permute_symmetric(&self, perm: &[usize]) -> CsrMatrix {
        let n = self.nrows;
        let inverse = crate::ordering::inverse_permutation(perm);
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        row_ptr.push(0);
        let mut entries: Vec<(usize, f64)> = Vec::new();
        for &old in perm {
            let (cols, vals) = self.row(old);
            entries.clear();
            entries.extend(cols.iter().zip(vals).map(|(&c, &v)| (inverse[c], v)));
            entries.sort_by_key(|&(c, _)| c);
            for &(c, v) in &entries {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        let mut b = Self::from_parts(n, self.ncols, row_ptr, col_idx, values);
        b.symmetric = self.symmetric;
        b
    }

    /// Dense copy.
    pub fn to_dense(&self) -> DenseMatrix {
        let mut dense = DenseMatrix::zeros(self.nrows, self.ncols);
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                dense.set(i, j, v);
            }
        }
        dense
    }

    /// Sparse copy of a dense matrix, dropping entries with `|a_ij| <= drop`.
    pub fn from_dense(dense: &DenseMatrix, drop: f64) -> Self {
        let mut row_ptr = Vec::with_capacity(dense.nrows() + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for i in 0..dense.nrows() {
            for (j, &v) in dense.row(i).iter().enumerate() {
                if v.abs() > drop {
                    col_idx.push(j);
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }
        Self::from_parts(dense.nrows(), dense.ncols(), row_ptr, col_idx, values)
    }

    /// Compute `A x`.
    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut y = vec![0.0; self.nrows];
        self.apply(Transpose::NoTrans, x, &mut y)?;
        Ok(y)
    }
}

impl LinearOperator for CsrMatrix {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn apply(&self, trans: Transpose, x: &[f64], y: &mut [f64]) -> Result<()> {
        check_apply_dims(self, trans, x, y, "CsrMatrix::apply")?;
        if trans.is_transposed() {
            y.fill(0.0);
            for (i, &xi) in x.iter().enumerate() {
                let (cols, vals) = self.row(i);
                for (&c, &v) in cols.iter().zip(vals) {
                    y[c] += v * xi;
                }
            }
        } else {
            for (i, yi) in y.iter_mut().enumerate() {
                let (cols, vals) = self.row(i);
                *yi = cols.iter().zip(vals).map(|(&c, &v)| v * x[c]).sum();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample() -> CsrMatrix {
        // [[4, 1, 0],
        //  [0, 3, 2],
        //  [1, 0, 5]]
        CsrMatrix::new(
            3,
            3,
            vec![0, 2, 4, 6],
            vec![0, 1, 1, 2, 0, 2],
            vec![4.0, 1.0, 3.0, 2.0, 1.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_unsorted_columns() {
        let err = CsrMatrix::new(1, 3, vec![0, 2], vec![2, 0], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, SolverError::WrongIndex { .. }));
    }

    #[test]
    fn test_from_coordinates_sums_duplicates() {
        let m =
            CsrMatrix::from_coordinates(2, 2, &[1, 0, 1], &[0, 1, 0], &[2.0, 3.0, 0.5]).unwrap();
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(1, 0), 2.5);
        assert_eq!(m.get(0, 1), 3.0);
        assert_eq!(m.get(0, 0), 0.0);
    }

    #[test]
    fn test_from_coordinates_bad_row() {
        let err = CsrMatrix::from_coordinates(2, 2, &[2], &[0], &[1.0]).unwrap_err();
        assert!(matches!(err, SolverError::WrongRow { .. }));
    }

    #[test]
    fn test_transpose_and_apply() {
        let a = sample();
        let t = a.transpose();
        assert_eq!(t.get(1, 0), 1.0);
        assert_eq!(t.get(0, 2), 1.0);

        let x = [1.0, 2.0, 3.0];
        let mut y1 = vec![0.0; 3];
        let mut y2 = vec![0.0; 3];
        a.apply(Transpose::Trans, &x, &mut y1).unwrap();
        t.apply(Transpose::NoTrans, &x, &mut y2).unwrap();
        assert_eq!(y1, y2);
    }

    #[test]
    fn test_permute_symmetric() {
        let a = sample();
        let perm = [2, 0, 1];
        let b = a.permute_symmetric(&perm);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(b.get(i, j), a.get(perm[i], perm[j]));
            }
        }
    }

    #[test]
    fn test_random_has_requested_entries() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = CsrMatrix::random(25, 10, 30, &mut rng);
        assert_eq!(m.nnz(), 30);
        let full = CsrMatrix::random(3, 3, 100, &mut rng);
        assert_eq!(full.nnz(), 9);
    }

    #[test]
    fn test_dense_round_trip() {
        let a = sample();
        assert_eq!(CsrMatrix::from_dense(&a.to_dense(), 0.0), a);
    }
}
