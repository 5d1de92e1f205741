//! Factorization backend capability.

use tracing::trace;

use crate::error::Result;
use crate::matrix::{axpy, norm2, CsrMatrix, LinearOperator};
use crate::tags::Transpose;

use super::MemoryEstimation;

/// A factorization engine behind [`SparseDirectSolver`](super::SparseDirectSolver).
///
/// `factorize` receives the matrix in its original numbering together with
/// the fill-reducing permutation (`perm[new] = old`); the backend applies the
/// permutation itself and `solve` works in the original numbering.
///
/// Tuning hooks are advisory: a backend that has no use for a hint keeps the
/// default no-op.
pub trait FactorizationBackend: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Factorize `a` under the symmetric permutation `perm`.
    fn factorize(&mut self, a: &CsrMatrix, perm: &[usize]) -> Result<()>;

    /// Solve `op(A) x = b` in place (`x` holds `b` on entry).
    fn solve(&self, trans: Transpose, x: &mut [f64]) -> Result<()>;

    /// Number of stored factor entries.
    fn memory_used(&self) -> usize;

    fn set_refinement(&mut self, _refine: bool) {}

    fn set_threads(&mut self, _threads: usize) {}

    fn set_memory_estimation(&mut self, _memory: MemoryEstimation) {}
}

/// Right-hand side in the permuted numbering: `c[new] = b[perm[new]]`.
pub(crate) fn permute_rhs(perm: &[usize], b: &[f64]) -> Vec<f64> {
    perm.iter().map(|&old| b[old]).collect()
}

/// Scatter a permuted solution back: `x[perm[new]] = y[new]`.
pub(crate) fn unpermute_solution(perm: &[usize], y: &[f64], x: &mut [f64]) {
    for (&old, &v) in perm.iter().zip(y) {
        x[old] = v;
    }
}

/// Check that `x` matches the factorized dimension.
pub(crate) fn check_rhs(n: usize, x: &[f64], function: &str) -> Result<()> {
    if x.len() != n {
        return Err(crate::error::SolverError::wrong_dim(
            function,
            format!("factorized dimension is {}, vector has length {}", n, x.len()),
        ));
    }
    Ok(())
}

/// Iterative refinement of `y` for `op(B) y = rhs`, reusing the factor
/// solve `solve` for the corrections.
pub(crate) fn refine<F>(
    b: &dyn LinearOperator,
    trans: Transpose,
    rhs: &[f64],
    y: &mut [f64],
    steps: usize,
    solve: F,
) -> Result<()>
where
    F: Fn(&mut [f64]) -> Result<()>,
{
    let mut r = vec![0.0; rhs.len()];
    for step in 0..steps {
        b.apply(trans, y, &mut r)?;
        for (ri, bi) in r.iter_mut().zip(rhs) {
            *ri = bi - *ri;
        }
        solve(&mut r)?;
        axpy(1.0, &r, y);
        let correction = norm2(&r);
        trace!(step, correction, "refinement step");
        if correction <= f64::EPSILON * norm2(y) {
            break;
        }
    }
    Ok(())
}
