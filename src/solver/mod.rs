//! Sparse direct solvers.
//!
//! [`SparseDirectSolver`] offers a single `factorize` / `solve` contract on
//! top of interchangeable factorization backends:
//!
//! | [`SolverKind`] | Backend        | Notes |
//! |----------------|----------------|-------|
//! | `SparseLu`     | [`SparseLu`]   | sparse LU, threshold pivoting, adaptive storage |
//! | `DenseLu`      | [`DenseLu`]    | dense LU with partial pivoting, small systems |
//! | `Ilut`         | [`Ilut`]       | incomplete LU, used as a preconditioner |
//! | `Faer`         | `FaerLu`       | faer sparse LU, needs the `faer-solver` feature |
//! | `Umfpack`, `SuperLu`, `Mumps`, `Pastix`, `Pardiso`, `Wsmp` | none | not built in |
//!
//! ## Factorization pipeline
//!
//! ```text
//! A (CsrMatrix, moved) -> ordering P -> backend.factorize(A, P) -> solve(x) in place
//! ```

mod backend;
mod dense_lu;
mod direct;
#[cfg(feature = "faer-solver")]
mod faer_lu;
mod ilut;
mod sparse_lu;

use std::fmt;
use std::str::FromStr;

pub use backend::FactorizationBackend;
pub use dense_lu::DenseLu;
pub use direct::{get_and_solve_lu, sparse_solve, SparseDirectSolver};
#[cfg(feature = "faer-solver")]
pub use faer_lu::FaerLu;
pub use ilut::Ilut;
pub use sparse_lu::SparseLu;

use crate::ordering::Ordering;

/// Default threshold for partial pivoting (1.0 is classical partial pivoting).
pub const DEFAULT_PIVOT_THRESHOLD: f64 = 0.1;

/// Default drop tolerance of the incomplete factorization.
pub const DEFAULT_ILUT_THRESHOLD: f64 = 1e-3;

/// Default number of refinement steps of the sparse LU backend.
pub const SPARSE_LU_REFINEMENT_STEPS: usize = 2;

/// Factorization backend identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SolverKind {
    /// Native sparse LU.
    #[default]
    SparseLu,
    /// Native dense LU.
    DenseLu,
    /// Native incomplete LU with threshold.
    Ilut,
    /// Sparse LU from the faer crate (`faer-solver` feature).
    Faer,
    Umfpack,
    SuperLu,
    Mumps,
    Pastix,
    Pardiso,
    Wsmp,
}

impl SolverKind {
    /// Every identifier, native backends first.
    pub const ALL: [SolverKind; 10] = [
        SolverKind::SparseLu,
        SolverKind::DenseLu,
        SolverKind::Ilut,
        SolverKind::Faer,
        SolverKind::Umfpack,
        SolverKind::SuperLu,
        SolverKind::Mumps,
        SolverKind::Pastix,
        SolverKind::Pardiso,
        SolverKind::Wsmp,
    ];

    /// Whether this backend is built into the crate.
    pub fn is_native(self) -> bool {
        matches!(
            self,
            SolverKind::SparseLu | SolverKind::DenseLu | SolverKind::Ilut
        )
    }

    /// Whether the backend computes an exact factorization.
    pub fn is_exact(self) -> bool {
        self != SolverKind::Ilut
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::SparseLu => "sparse-lu",
            SolverKind::DenseLu => "dense-lu",
            SolverKind::Ilut => "ilut",
            SolverKind::Faer => "faer",
            SolverKind::Umfpack => "umfpack",
            SolverKind::SuperLu => "superlu",
            SolverKind::Mumps => "mumps",
            SolverKind::Pastix => "pastix",
            SolverKind::Pardiso => "pardiso",
            SolverKind::Wsmp => "wsmp",
        };
        f.write_str(name)
    }
}

impl FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "sparse-lu" | "sparselu" | "lu" => Ok(SolverKind::SparseLu),
            "dense-lu" | "denselu" | "dense" | "lapack" => Ok(SolverKind::DenseLu),
            "ilut" | "ilu" => Ok(SolverKind::Ilut),
            "faer" => Ok(SolverKind::Faer),
            "umfpack" => Ok(SolverKind::Umfpack),
            "superlu" => Ok(SolverKind::SuperLu),
            "mumps" => Ok(SolverKind::Mumps),
            "pastix" => Ok(SolverKind::Pastix),
            "pardiso" => Ok(SolverKind::Pardiso),
            "wsmp" => Ok(SolverKind::Wsmp),
            other => Err(format!("unknown direct solver '{}'", other)),
        }
    }
}

/// Coefficients sizing the factor storage as multiples of `nnz(A)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryEstimation {
    /// Initial storage, in units of `nnz(A)`.
    pub coefficient: f64,
    /// Ceiling beyond which factorization fails with `OutOfMemory`.
    /// Unbounded by default; the dense size `n²` always caps it.
    pub maximum: f64,
    /// Growth factor applied when storage runs out.
    pub increase: f64,
}

impl Default for MemoryEstimation {
    fn default() -> Self {
        Self {
            coefficient: 2.0,
            maximum: f64::INFINITY,
            increase: 2.0,
        }
    }
}

/// Configuration for [`SparseDirectSolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct DirectSolverConfig {
    /// Factorization backend.
    pub solver: SolverKind,
    /// Fill-reducing ordering.
    pub ordering: Ordering,
    /// Permutation used with `Ordering::User`.
    pub permutation: Option<Vec<usize>>,
    /// Threads per node (advisory).
    pub threads: usize,
    /// Drop tolerance for the incomplete factorization.
    pub threshold: f64,
    /// Iterative refinement after each solve.
    pub refinement: bool,
    /// Factor storage sizing.
    pub memory: MemoryEstimation,
    /// Threshold for partial pivoting.
    pub pivot_threshold: f64,
    /// Use the unsymmetric incomplete factorization even on symmetric input.
    pub non_symmetric_ilut: bool,
}

impl Default for DirectSolverConfig {
    fn default() -> Self {
        Self {
            solver: SolverKind::default(),
            ordering: Ordering::default(),
            permutation: None,
            threads: 1,
            threshold: DEFAULT_ILUT_THRESHOLD,
            refinement: false,
            memory: MemoryEstimation::default(),
            pivot_threshold: DEFAULT_PIVOT_THRESHOLD,
            non_symmetric_ilut: false,
        }
    }
}

impl DirectSolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the factorization backend.
    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Set the ordering. Use [`with_permutation`](Self::with_permutation)
    /// for a user ordering.
    pub fn with_ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Set a user permutation (`perm[new] = old`); selects `Ordering::User`.
    pub fn with_permutation(mut self, perm: Vec<usize>) -> Self {
        self.ordering = Ordering::User;
        self.permutation = Some(perm);
        self
    }

    /// Set the number of threads per node.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the drop tolerance of the incomplete factorization.
    ///
    /// - 1e-1: very sparse factors, weak preconditioner
    /// - 1e-3 (default): good balance for most problems
    /// - 0.0: no dropping (complete LU with the incomplete code path)
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.max(0.0);
        self
    }

    /// Enable or disable iterative refinement.
    pub fn with_refinement(mut self, refinement: bool) -> Self {
        self.refinement = refinement;
        self
    }

    /// Set the factor storage coefficients.
    pub fn with_memory_estimation(mut self, memory: MemoryEstimation) -> Self {
        self.memory = memory;
        self
    }

    /// Set the partial pivoting threshold, clamped to `[0, 1]`.
    pub fn with_pivot_threshold(mut self, threshold: f64) -> Self {
        self.pivot_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Force the unsymmetric incomplete factorization.
    pub fn with_non_symmetric_ilut(mut self, enforce: bool) -> Self {
        self.non_symmetric_ilut = enforce;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_kind_round_trip_names() {
        for kind in SolverKind::ALL {
            assert_eq!(kind.to_string().parse::<SolverKind>().unwrap(), kind);
        }
        assert!("cholmod".parse::<SolverKind>().is_err());
        for alias in ["lu", "SparseLU", "sparse_lu"] {
            assert_eq!(alias.parse::<SolverKind>().unwrap(), SolverKind::SparseLu);
        }
        assert!(SolverKind::Ilut.is_native());
        assert!(!SolverKind::Mumps.is_native());
        assert!(!SolverKind::Faer.is_native());
        assert!(SolverKind::Faer.is_exact());
    }

    #[test]
    fn test_config_builder() {
        let config = DirectSolverConfig::new()
            .with_solver(SolverKind::DenseLu)
            .with_permutation(vec![1, 0])
            .with_pivot_threshold(3.0)
            .with_threads(0);
        assert_eq!(config.solver, SolverKind::DenseLu);
        assert_eq!(config.ordering, Ordering::User);
        assert_eq!(config.pivot_threshold, 1.0);
        assert_eq!(config.threads, 1);
    }
}
