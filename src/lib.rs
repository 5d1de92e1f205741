//! # sparsolve
//!
//! Sparse direct and iterative linear solvers.
//!
//! This library provides:
//! - Sparse and dense matrix containers with coordinate assembly
//! - A direct solver front-end with interchangeable factorization backends
//!   (sparse LU, dense LU, incomplete LU, faer's sparse LU behind the
//!   `faer-solver` feature) and fill-reducing orderings
//! - Krylov methods (CG, BiCG, BiCGSTAB, GMRES) driven by an iteration
//!   controller, with identity, incomplete or exact preconditioning
//! - Matrix Market and plain-text vector I/O
//!
//! ## Architecture
//!
//! - [`matrix`] - CSR, CSC, triplet and dense containers, [`LinearOperator`]
//! - [`ordering`] - RCM and minimum degree orderings, permutation helpers
//! - [`solver`] - [`SparseDirectSolver`] and its backends
//! - [`iterative`] - [`Iteration`], preconditioners and Krylov methods
//! - [`io`] - Matrix Market reader and writer
//! - [`tags`] - transpose, triangle, diagonal and side markers
//!
//! ## Usage
//!
//! ```
//! use sparsolve::{sparse_solve, CsrMatrix};
//!
//! // [[2, 0], [1, 4]] x = [2, 9]
//! let a = CsrMatrix::from_coordinates(2, 2, &[0, 1, 1], &[0, 0, 1], &[2.0, 1.0, 4.0])?;
//! let mut y = vec![2.0, 9.0];
//! sparse_solve(a, &mut y)?;
//! assert!((y[0] - 1.0).abs() < 1e-12 && (y[1] - 2.0).abs() < 1e-12);
//! # Ok::<(), sparsolve::SolverError>(())
//! ```
//!
//! ### Native CLI
//!
//! ```bash
//! sparsolve matrix.mtx --rhs b.txt --method gmres --preconditioner ilut -v > x.txt
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmSparseSolver } from 'sparsolve';
//!
//! const solver = new WasmSparseSolver("sparse-lu");
//! solver.factorize(n, rows, cols, values);
//! const x = solver.solve(rhs);
//! ```

pub mod error;
pub mod io;
pub mod iterative;
pub mod matrix;
pub mod ordering;
pub mod solver;
pub mod tags;

// Re-export main types for convenience
pub use error::{Result, SolverError};
pub use iterative::{
    IdentityPreconditioner, Iteration, IterationState, IterativeMethod, Preconditioner,
    PreconditionerKind, SolveReport,
};
pub use matrix::{CscMatrix, CsrMatrix, DenseMatrix, LinearOperator, SparseVector, TripletMatrix};
pub use ordering::Ordering;
pub use solver::{
    get_and_solve_lu, sparse_solve, DirectSolverConfig, MemoryEstimation, SolverKind,
    SparseDirectSolver,
};
pub use tags::{Diag, Side, Transpose, Uplo};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmSparseSolver;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
