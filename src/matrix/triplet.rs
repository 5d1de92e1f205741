//! Row-array sparse matrix for incremental assembly.

use rand::Rng;

use crate::error::{Result, SolverError};

use super::CsrMatrix;

/// Sparse matrix stored as one sorted `(column, value)` list per row.
///
/// Cheap to insert into; convert to [`CsrMatrix`] before solving.
#[derive(Debug, Clone, PartialEq)]
pub struct TripletMatrix {
    nrows: usize,
    ncols: usize,
    rows: Vec<Vec<(usize, f64)>>,
    symmetric: bool,
}

impl TripletMatrix {
    /// Empty `nrows x ncols` matrix.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: vec![Vec::new(); nrows],
            symmetric: false,
        }
    }

    /// Like [`new`](Self::new), but reports `OutOfMemory` instead of aborting
    /// when the row table cannot be allocated.
    pub fn try_new(nrows: usize, ncols: usize) -> Result<Self> {
        let mut rows = Vec::new();
        rows.try_reserve_exact(nrows).map_err(|e| {
            SolverError::no_memory(
                "TripletMatrix::try_new",
                format!("{} rows: {}", nrows, e),
            )
        })?;
        rows.resize_with(nrows, Vec::new);
        Ok(Self {
            nrows,
            ncols,
            rows,
            symmetric: false,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Declare the assembled matrix symmetric (carried over to CSR).
    pub fn set_symmetric(&mut self, symmetric: bool) {
        self.symmetric = symmetric && self.nrows == self.ncols;
    }

    /// Add `value` to entry `(i, j)`, creating it if needed.
    pub fn add_interaction(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        if i >= self.nrows {
            return Err(SolverError::wrong_row(
                "TripletMatrix::add_interaction",
                format!("row {} with {} rows", i, self.nrows),
            ));
        }
        if j >= self.ncols {
            return Err(SolverError::wrong_col(
                "TripletMatrix::add_interaction",
                format!("column {} with {} columns", j, self.ncols),
            ));
        }
        let row = &mut self.rows[i];
        match row.binary_search_by_key(&j, |&(c, _)| c) {
            Ok(pos) => row[pos].1 += value,
            Err(pos) => row.insert(pos, (j, value)),
        }
        Ok(())
    }

    /// Entry `(i, j)`; zero when not stored or out of range.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.rows
            .get(i)
            .and_then(|row| {
                row.binary_search_by_key(&j, |&(c, _)| c)
                    .ok()
                    .map(|pos| row[pos].1)
            })
            .unwrap_or(0.0)
    }

    /// Add `nnz` random interactions at random positions.
    pub fn fill_rand<R: Rng + ?Sized>(&mut self, nnz: usize, rng: &mut R) {
        if self.nrows == 0 || self.ncols == 0 {
            return;
        }
        for _ in 0..nnz {
            let i = rng.gen_range(0..self.nrows);
            let j = rng.gen_range(0..self.ncols);
            let row = &mut self.rows[i];
            let value = rng.gen_range(0.1..1.0);
            match row.binary_search_by_key(&j, |&(c, _)| c) {
                Ok(pos) => row[pos].1 += value,
                Err(pos) => row.insert(pos, (j, value)),
            }
        }
    }

    /// Coordinate triples `(rows, cols, values)`, row by row.
    pub fn to_coordinates(&self) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        let nnz = self.nnz();
        let mut rows = Vec::with_capacity(nnz);
        let mut cols = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, v) in row {
                rows.push(i);
                cols.push(j);
                values.push(v);
            }
        }
        (rows, cols, values)
    }

    /// Compressed row copy.
    pub fn to_csr(&self) -> CsrMatrix {
        let mut row_ptr = Vec::with_capacity(self.nrows + 1);
        let mut col_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        row_ptr.push(0);
        for row in &self.rows {
            for &(j, v) in row {
                col_idx.push(j);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        let mut csr = CsrMatrix::from_parts(self.nrows, self.ncols, row_ptr, col_idx, values);
        csr.set_symmetric(self.symmetric);
        csr
    }
}

impl From<TripletMatrix> for CsrMatrix {
    fn from(triplets: TripletMatrix) -> Self {
        triplets.to_csr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_interaction_accumulates() {
        let mut t = TripletMatrix::new(3, 4);
        t.add_interaction(1, 3, 2.0).unwrap();
        t.add_interaction(1, 0, 1.0).unwrap();
        t.add_interaction(1, 3, 0.5).unwrap();
        assert_eq!(t.nnz(), 2);
        assert_eq!(t.get(1, 3), 2.5);

        let csr = t.to_csr();
        assert_eq!(csr.row(1).0, &[0, 3]);
        assert_eq!(csr.get(1, 3), 2.5);
    }

    #[test]
    fn test_try_new_reports_out_of_memory() {
        let t = TripletMatrix::try_new(4, 2).unwrap();
        assert_eq!(t, TripletMatrix::new(4, 2));
        assert!(matches!(
            TripletMatrix::try_new(usize::MAX / 2, 1),
            Err(SolverError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_add_interaction_out_of_range() {
        let mut t = TripletMatrix::new(2, 2);
        assert!(matches!(
            t.add_interaction(0, 2, 1.0),
            Err(SolverError::WrongCol { .. })
        ));
        assert!(matches!(
            t.add_interaction(5, 0, 1.0),
            Err(SolverError::WrongRow { .. })
        ));
    }
}
