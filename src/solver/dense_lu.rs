//! Dense LU factorization with partial pivoting.

use tracing::debug;

use crate::error::{Result, SolverError};
use crate::matrix::{triangular_solve, CsrMatrix, DenseMatrix};
use crate::tags::{Diag, Transpose, Uplo};

use super::backend::{check_rhs, permute_rhs, refine, unpermute_solution, FactorizationBackend};

/// Pivot magnitude, relative to the largest entry, treated as zero.
const SINGULAR_TOLERANCE: f64 = 1e-15;

/// Dense LU backend for small systems.
///
/// Stores `P B = L U` in one row-major matrix (`L` unit lower, below the
/// diagonal) with `pivots[k]` the row of `B` moved to position `k`.
#[derive(Debug, Default)]
pub struct DenseLu {
    refine: bool,
    perm: Vec<usize>,
    lu: Option<DenseMatrix>,
    pivots: Vec<usize>,
    /// Permuted matrix, retained for refinement.
    permuted: Option<DenseMatrix>,
}

impl DenseLu {
    pub fn new() -> Self {
        Self::default()
    }

    /// LU decomposition with partial pivoting of `lu`, in place.
    fn getrf(lu: &mut DenseMatrix, pivots: &mut [usize]) -> Result<()> {
        let n = lu.nrows();
        let scale = lu.as_slice().iter().fold(0.0f64, |m, v| m.max(v.abs()));

        for (i, p) in pivots.iter_mut().enumerate() {
            *p = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = lu.get(k, k).abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                let val = lu.get(i, k).abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val <= SINGULAR_TOLERANCE * scale || !max_val.is_finite() {
                return Err(SolverError::singular(k, "DenseLu::factorize"));
            }

            if max_row != k {
                pivots.swap(k, max_row);
                lu.swap_rows(k, max_row);
            }

            // Eliminate
            let data = lu.as_mut_slice();
            let pivot = data[k * n + k];
            for i in (k + 1)..n {
                let factor = data[i * n + k] / pivot;
                data[i * n + k] = factor;
                if factor == 0.0 {
                    continue;
                }
                for j in (k + 1)..n {
                    data[i * n + j] -= factor * data[k * n + j];
                }
            }
        }
        Ok(())
    }

    /// Forward and back substitution with the computed factors.
    fn getrs(lu: &DenseMatrix, pivots: &[usize], trans: Transpose, x: &mut [f64]) -> Result<()> {
        if trans.is_transposed() {
            // Bᵀ = Uᵀ Lᵀ P
            triangular_solve(lu, Uplo::Upper, Diag::NonUnit, Transpose::Trans, x)?;
            triangular_solve(lu, Uplo::Lower, Diag::Unit, Transpose::Trans, x)?;
            let w = x.to_vec();
            for (k, &row) in pivots.iter().enumerate() {
                x[row] = w[k];
            }
        } else {
            let w: Vec<f64> = pivots.iter().map(|&row| x[row]).collect();
            x.copy_from_slice(&w);
            triangular_solve(lu, Uplo::Lower, Diag::Unit, Transpose::NoTrans, x)?;
            triangular_solve(lu, Uplo::Upper, Diag::NonUnit, Transpose::NoTrans, x)?;
        }
        Ok(())
    }
}

impl FactorizationBackend for DenseLu {
    fn name(&self) -> &'static str {
        "dense-lu"
    }

    fn factorize(&mut self, a: &CsrMatrix, perm: &[usize]) -> Result<()> {
        self.lu = None;
        self.permuted = None;

        let b = a.permute_symmetric(perm).to_dense();
        let mut lu = b.clone();
        let mut pivots = vec![0; b.nrows()];
        Self::getrf(&mut lu, &mut pivots)?;
        debug!(n = b.nrows(), "dense LU done");

        self.perm = perm.to_vec();
        self.pivots = pivots;
        self.lu = Some(lu);
        if self.refine {
            self.permuted = Some(b);
        }
        Ok(())
    }

    fn solve(&self, trans: Transpose, x: &mut [f64]) -> Result<()> {
        let lu = self
            .lu
            .as_ref()
            .ok_or_else(|| SolverError::not_factorized("DenseLu::solve"))?;
        check_rhs(lu.nrows(), x, "DenseLu::solve")?;

        let rhs = permute_rhs(&self.perm, x);
        let mut y = rhs.clone();
        Self::getrs(lu, &self.pivots, trans, &mut y)?;
        if let Some(b) = &self.permuted {
            refine(b, trans, &rhs, &mut y, 1, |r| {
                Self::getrs(lu, &self.pivots, trans, r)
            })?;
        }
        unpermute_solution(&self.perm, &y, x);
        Ok(())
    }

    fn memory_used(&self) -> usize {
        self.lu.as_ref().map_or(0, |lu| lu.nrows() * lu.ncols())
    }

    fn set_refinement(&mut self, refine: bool) {
        self.refine = refine;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::LinearOperator;
    use approx::assert_relative_eq;

    fn sample() -> CsrMatrix {
        // [[2, 1, 1],
        //  [4, -6, 0],
        //  [-2, 7, 2]]
        let dense = DenseMatrix::from_rows(&[
            vec![2.0, 1.0, 1.0],
            vec![4.0, -6.0, 0.0],
            vec![-2.0, 7.0, 2.0],
        ])
        .unwrap();
        CsrMatrix::from_dense(&dense, 0.0)
    }

    #[test]
    fn test_solve_both_directions() {
        let a = sample();
        let mut lu = DenseLu::new();
        lu.set_refinement(true);
        lu.factorize(&a, &[1, 2, 0]).unwrap();
        assert_eq!(lu.memory_used(), 9);

        let x_true = [5.0, 3.0, -1.0];
        let mut x = a.mul_vec(&x_true).unwrap();
        lu.solve(Transpose::NoTrans, &mut x).unwrap();
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-12);
        }

        let mut y = vec![0.0; 3];
        a.apply(Transpose::Trans, &x_true, &mut y).unwrap();
        lu.solve(Transpose::Trans, &mut y).unwrap();
        for (yi, ti) in y.iter().zip(&x_true) {
            assert_relative_eq!(yi, ti, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_matrix() {
        let a = CsrMatrix::from_coordinates(3, 3, &[0, 1], &[0, 1], &[1.0, 1.0]).unwrap();
        let err = DenseLu::new().factorize(&a, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, SolverError::Singular { info: 3, .. }));
    }

    #[test]
    fn test_solve_before_factorize() {
        let mut x = [1.0];
        let err = DenseLu::new().solve(Transpose::NoTrans, &mut x).unwrap_err();
        assert!(matches!(err, SolverError::NotFactorized { .. }));
    }
}
