//! Sparse LU through the faer crate.

use faer::prelude::*;
use faer::sparse::linalg::solvers::Lu;
use faer::sparse::{SparseColMat, Triplet};
use tracing::debug;

use crate::error::{Result, SolverError};
use crate::matrix::CsrMatrix;
use crate::tags::Transpose;

use super::backend::{check_rhs, permute_rhs, unpermute_solution, FactorizationBackend};

/// Status codes carried by [`SolverError::Backend`].
pub const FAER_BUILD_FAILED: i32 = -1;
pub const FAER_FACTORIZATION_FAILED: i32 = -2;
pub const FAER_NON_FINITE: i32 = -3;

/// faer sparse LU backend.
///
/// faer picks its own column ordering on top of the symmetric permutation
/// handed to `factorize`. Refinement, thread and memory hints are ignored.
#[derive(Default)]
pub struct FaerLu {
    n: usize,
    nnz: usize,
    perm: Vec<usize>,
    lu: Option<Lu<usize, f64>>,
}

impl FaerLu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FactorizationBackend for FaerLu {
    fn name(&self) -> &'static str {
        "faer"
    }

    fn factorize(&mut self, a: &CsrMatrix, perm: &[usize]) -> Result<()> {
        const FUNCTION: &str = "FaerLu::factorize";
        self.lu = None;
        let n = a.nrows();
        let b = a.permute_symmetric(perm);

        let mut triplets = Vec::with_capacity(b.nnz());
        for row in 0..n {
            let (cols, vals) = b.row(row);
            for (&col, &val) in cols.iter().zip(vals) {
                if !val.is_finite() {
                    return Err(SolverError::backend(
                        FAER_NON_FINITE,
                        FUNCTION,
                        format!("entry ({}, {}) is not finite", perm[row], perm[col]),
                    ));
                }
                triplets.push(Triplet::new(row, col, val));
            }
        }

        if n > 0 {
            let sp = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets).map_err(
                |e| SolverError::backend(FAER_BUILD_FAILED, FUNCTION, format!("{e:?}")),
            )?;
            let lu = sp.sp_lu().map_err(|e| {
                SolverError::backend(FAER_FACTORIZATION_FAILED, FUNCTION, format!("{e:?}"))
            })?;
            self.lu = Some(lu);
        }
        debug!(n, nnz = b.nnz(), "faer factorization done");

        self.n = n;
        self.nnz = b.nnz();
        self.perm = perm.to_vec();
        Ok(())
    }

    fn solve(&self, trans: Transpose, x: &mut [f64]) -> Result<()> {
        const FUNCTION: &str = "FaerLu::solve";
        check_rhs(self.n, x, FUNCTION)?;
        let lu = match &self.lu {
            Some(lu) => lu,
            None if self.n == 0 => return Ok(()),
            None => return Err(SolverError::not_factorized(FUNCTION)),
        };

        let c = permute_rhs(&self.perm, x);
        let rhs = faer::Mat::<f64>::from_fn(self.n, 1, |i, _| c[i]);
        let sol = match trans {
            Transpose::NoTrans => lu.solve(rhs),
            Transpose::Trans | Transpose::ConjTrans => lu.solve_transpose(rhs),
        };

        let mut y = vec![0.0; self.n];
        for (i, yi) in y.iter_mut().enumerate() {
            let v = sol[(i, 0)];
            if !v.is_finite() {
                return Err(SolverError::backend(
                    FAER_NON_FINITE,
                    FUNCTION,
                    format!("solution entry {} is not finite", self.perm[i]),
                ));
            }
            *yi = v;
        }
        unpermute_solution(&self.perm, &y, x);
        Ok(())
    }

    /// Entries of the factorized matrix; faer does not report its fill.
    fn memory_used(&self) -> usize {
        self.nnz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solves_both_transposes_under_permutation() {
        let a = CsrMatrix::from_coordinates(
            3,
            3,
            &[0, 0, 1, 1, 2, 2],
            &[0, 2, 0, 1, 1, 2],
            &[4.0, 1.0, -1.0, 3.0, 2.0, 5.0],
        )
        .unwrap();
        let x_true = [1.0, -2.0, 0.5];
        let perm = [2, 0, 1];

        let mut lu = FaerLu::new();
        lu.factorize(&a, &perm).unwrap();
        assert_eq!(lu.memory_used(), 6);

        let mut x = a.mul_vec(&x_true).unwrap();
        lu.solve(Transpose::NoTrans, &mut x).unwrap();
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-12);
        }

        let mut xt = a.transpose().mul_vec(&x_true).unwrap();
        lu.solve(Transpose::Trans, &mut xt).unwrap();
        for (xi, ti) in xt.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_non_finite_entry_is_a_backend_error() {
        let a = CsrMatrix::from_coordinates(2, 2, &[0, 1], &[0, 1], &[f64::NAN, 1.0]).unwrap();
        let err = FaerLu::new().factorize(&a, &[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Backend { info: FAER_NON_FINITE, .. }
        ));
        assert_eq!(err.info(), Some(FAER_NON_FINITE));
    }

    #[test]
    fn test_wrong_length_rhs() {
        let a = CsrMatrix::identity(3);
        let mut lu = FaerLu::new();
        lu.factorize(&a, &[0, 1, 2]).unwrap();
        let mut x = vec![1.0; 2];
        assert!(matches!(
            lu.solve(Transpose::NoTrans, &mut x),
            Err(SolverError::WrongDim { .. })
        ));
    }
}
