//! Iterative solvers.
//!
//! Krylov methods for `A x = b`, driven by an [`Iteration`] controller and
//! accelerated by a [`Preconditioner`]:
//!
//! | Method     | Matrices             | Preconditioner use |
//! |------------|----------------------|--------------------|
//! | `cg`       | symmetric positive definite | `solve` |
//! | `bicg`     | general              | `solve` and `trans_solve` |
//! | `bicgstab` | general              | `solve` (right) |
//! | `gmres`    | general, restarted   | `solve` (left) |
//!
//! A breakdown or the iteration cap is not an error: the method returns a
//! [`SolveReport`] whose state tells what happened, with the best iterate
//! left in `x`. `Err` is kept for dimension and preconditioner failures.
//!
//! ```
//! use sparsolve::{CsrMatrix, IdentityPreconditioner, Iteration, IterativeMethod};
//! use sparsolve::iterative::solve;
//!
//! // [[4, 1], [1, 3]]
//! let a = CsrMatrix::from_coordinates(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[4.0, 1.0, 1.0, 3.0])?;
//! let b = [1.0, 2.0];
//! let mut x = [0.0; 2];
//! let mut iter = Iteration::new(10, 1e-10).with_method(IterativeMethod::Cg);
//! let report = solve(&a, &mut x, &b, &mut IdentityPreconditioner, &mut iter)?;
//! assert!(report.is_converged());
//! # Ok::<(), sparsolve::SolverError>(())
//! ```

mod iteration;
mod methods;
mod preconditioner;

use std::fmt;
use std::str::FromStr;

pub use iteration::{
    Iteration, IterationState, DEFAULT_MAX_ITERATIONS, DEFAULT_RESTART, DEFAULT_TOLERANCE,
    ERROR_BREAKDOWN, ERROR_MAX_ITERATIONS, ERROR_NON_FINITE_RESIDUAL,
};
pub use methods::{bicg, bicgstab, cg, gmres};
pub use preconditioner::{build_preconditioner, IdentityPreconditioner, Preconditioner};

use crate::error::Result;
use crate::matrix::LinearOperator;

/// Krylov method identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterativeMethod {
    #[default]
    Cg,
    BiCg,
    BiCgStab,
    Gmres,
}

impl fmt::Display for IterativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IterativeMethod::Cg => "cg",
            IterativeMethod::BiCg => "bicg",
            IterativeMethod::BiCgStab => "bicgstab",
            IterativeMethod::Gmres => "gmres",
        };
        f.write_str(name)
    }
}

impl FromStr for IterativeMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cg" => Ok(IterativeMethod::Cg),
            "bicg" => Ok(IterativeMethod::BiCg),
            "bicgstab" => Ok(IterativeMethod::BiCgStab),
            "gmres" => Ok(IterativeMethod::Gmres),
            other => Err(format!("unknown iterative method '{}'", other)),
        }
    }
}

/// Preconditioner identifiers recorded in an [`Iteration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreconditionerKind {
    #[default]
    Identity,
    /// Incomplete factorization.
    Ilut,
    /// Exact factorization by a direct solver.
    Direct,
}

impl fmt::Display for PreconditionerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PreconditionerKind::Identity => "identity",
            PreconditionerKind::Ilut => "ilut",
            PreconditionerKind::Direct => "direct",
        };
        f.write_str(name)
    }
}

impl FromStr for PreconditionerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" | "none" => Ok(PreconditionerKind::Identity),
            "ilut" | "ilu" => Ok(PreconditionerKind::Ilut),
            "direct" | "lu" => Ok(PreconditionerKind::Direct),
            other => Err(format!("unknown preconditioner '{}'", other)),
        }
    }
}

/// Outcome of an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    /// Number of iterations performed
    pub iterations: usize,
    /// Final relative residual
    pub residual: f64,
    /// Final controller state
    pub state: IterationState,
    /// Controller error code (0 on convergence)
    pub error_code: i32,
}

impl SolveReport {
    pub fn is_converged(&self) -> bool {
        self.state == IterationState::Converged
    }
}

impl From<&Iteration> for SolveReport {
    fn from(iter: &Iteration) -> Self {
        Self {
            iterations: iter.iteration(),
            residual: iter.last_residual(),
            state: iter.state(),
            error_code: iter.error_code(),
        }
    }
}

impl fmt::Display for SolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.state {
            IterationState::Converged => "converged",
            IterationState::MaxIterations => "reached the iteration limit",
            IterationState::Failed => "failed",
            IterationState::Fresh | IterationState::Running => "stopped",
        };
        write!(
            f,
            "{} in {} iterations, residual = {:.2e}",
            outcome, self.iterations, self.residual
        )?;
        if self.error_code != 0 {
            write!(f, " (code {})", self.error_code)?;
        }
        Ok(())
    }
}

/// Solve `A x = b` with the method selected in `iter`.
pub fn solve(
    a: &dyn LinearOperator,
    x: &mut [f64],
    b: &[f64],
    precond: &mut dyn Preconditioner,
    iter: &mut Iteration,
) -> Result<SolveReport> {
    match iter.method() {
        IterativeMethod::Cg => cg(a, x, b, precond, iter),
        IterativeMethod::BiCg => bicg(a, x, b, precond, iter),
        IterativeMethod::BiCgStab => bicgstab(a, x, b, precond, iter),
        IterativeMethod::Gmres => gmres(a, x, b, precond, iter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let report = SolveReport {
            iterations: 100,
            residual: 0.5,
            state: IterationState::MaxIterations,
            error_code: ERROR_MAX_ITERATIONS,
        };
        assert_eq!(
            report.to_string(),
            "reached the iteration limit in 100 iterations, residual = 5.00e-1 (code -2)"
        );
    }

    #[test]
    fn test_method_names() {
        for m in [
            IterativeMethod::Cg,
            IterativeMethod::BiCg,
            IterativeMethod::BiCgStab,
            IterativeMethod::Gmres,
        ] {
            assert_eq!(m.to_string().parse::<IterativeMethod>().unwrap(), m);
        }
        assert_eq!("none".parse::<PreconditionerKind>().unwrap(), PreconditionerKind::Identity);
    }
}
