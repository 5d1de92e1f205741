//! Preconditioners.

use crate::error::{Result, SolverError};
use crate::matrix::{CsrMatrix, LinearOperator};
use crate::solver::{DirectSolverConfig, SolverKind, SparseDirectSolver};
use crate::tags::Transpose;

use super::PreconditionerKind;

/// Approximate inverse `M⁻¹` of the system matrix.
///
/// Both directions are required; BiCG uses the transposed one.
pub trait Preconditioner {
    /// `z = M⁻¹ r`
    fn solve(&mut self, a: &dyn LinearOperator, r: &[f64], z: &mut [f64]) -> Result<()>;

    /// `z = M⁻ᵀ r`
    fn trans_solve(&mut self, a: &dyn LinearOperator, r: &[f64], z: &mut [f64]) -> Result<()>;
}

fn check_dims(a: &dyn LinearOperator, r: &[f64], z: &[f64], function: &str) -> Result<()> {
    let n = a.nrows();
    if a.ncols() != n || r.len() != n || z.len() != n {
        return Err(SolverError::wrong_dim(
            function,
            format!(
                "operator is {}x{}, r has length {}, z has length {}",
                n,
                a.ncols(),
                r.len(),
                z.len()
            ),
        ));
    }
    Ok(())
}

/// `M = I`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn solve(&mut self, a: &dyn LinearOperator, r: &[f64], z: &mut [f64]) -> Result<()> {
        check_dims(a, r, z, "IdentityPreconditioner::solve")?;
        z.copy_from_slice(r);
        Ok(())
    }

    fn trans_solve(&mut self, a: &dyn LinearOperator, r: &[f64], z: &mut [f64]) -> Result<()> {
        check_dims(a, r, z, "IdentityPreconditioner::trans_solve")?;
        z.copy_from_slice(r);
        Ok(())
    }
}

/// A factorized direct solver used as `M` (exact or incomplete, depending
/// on its backend).
impl Preconditioner for SparseDirectSolver {
    fn solve(&mut self, a: &dyn LinearOperator, r: &[f64], z: &mut [f64]) -> Result<()> {
        check_dims(a, r, z, "SparseDirectSolver::solve")?;
        z.copy_from_slice(r);
        self.solve_trans(Transpose::NoTrans, z)
    }

    fn trans_solve(&mut self, a: &dyn LinearOperator, r: &[f64], z: &mut [f64]) -> Result<()> {
        check_dims(a, r, z, "SparseDirectSolver::trans_solve")?;
        z.copy_from_slice(r);
        self.solve_trans(Transpose::Trans, z)
    }
}

/// Build the preconditioner `kind` for `a`.
///
/// `Ilut` and `Direct` factorize a copy of `a` with `config`, overriding its
/// backend.
pub fn build_preconditioner(
    kind: PreconditionerKind,
    a: &CsrMatrix,
    config: &DirectSolverConfig,
) -> Result<Box<dyn Preconditioner>> {
    let backend = match kind {
        PreconditionerKind::Identity => return Ok(Box::new(IdentityPreconditioner)),
        PreconditionerKind::Ilut => SolverKind::Ilut,
        PreconditionerKind::Direct if config.solver.is_exact() => config.solver,
        PreconditionerKind::Direct => SolverKind::SparseLu,
    };
    let mut solver = SparseDirectSolver::with_config(config.clone().with_solver(backend));
    solver.factorize(a.clone())?;
    Ok(Box::new(solver))
}
