//! Backend-independent direct solver.

use tracing::debug;

use crate::error::{Result, SolverError};
use crate::matrix::CsrMatrix;
use crate::ordering::{compute_ordering, Ordering};
use crate::tags::Transpose;

use super::backend::FactorizationBackend;
use super::{DenseLu, DirectSolverConfig, Ilut, MemoryEstimation, SolverKind, SparseLu};

#[cfg(feature = "faer-solver")]
use super::FaerLu;

/// Sparse direct solver with a selectable factorization backend.
///
/// Configure, then `factorize` once and `solve` as many right-hand sides as
/// needed:
///
/// ```
/// use sparsolve::{CsrMatrix, SparseDirectSolver};
///
/// let a = CsrMatrix::from_coordinates(2, 2, &[0, 1, 1], &[0, 0, 1], &[2.0, 1.0, 4.0])?;
/// let mut solver = SparseDirectSolver::new();
/// solver.factorize(a)?;
/// let mut x = vec![2.0, 9.0];
/// solver.solve(&mut x)?;
/// assert!((x[0] - 1.0).abs() < 1e-12 && (x[1] - 2.0).abs() < 1e-12);
/// # Ok::<(), sparsolve::SolverError>(())
/// ```
pub struct SparseDirectSolver {
    config: DirectSolverConfig,
    n: usize,
    backend: Option<Box<dyn FactorizationBackend>>,
}

impl Default for SparseDirectSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SparseDirectSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseDirectSolver")
            .field("config", &self.config)
            .field("n", &self.n)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl SparseDirectSolver {
    /// Create a solver with the default configuration (sparse LU,
    /// automatic ordering).
    pub fn new() -> Self {
        Self::with_config(DirectSolverConfig::default())
    }

    /// Create a solver with a custom configuration.
    pub fn with_config(config: DirectSolverConfig) -> Self {
        Self {
            config,
            n: 0,
            backend: None,
        }
    }

    pub fn config(&self) -> &DirectSolverConfig {
        &self.config
    }

    /// Whether `kind` can factorize in this build.
    pub fn is_available(kind: SolverKind) -> bool {
        kind.is_native() || (kind == SolverKind::Faer && cfg!(feature = "faer-solver"))
    }

    /// Select the factorization backend. A factorization made by another
    /// backend is discarded.
    pub fn select_direct_solver(&mut self, kind: SolverKind) {
        if kind != self.config.solver {
            self.clear();
        }
        self.config.solver = kind;
    }

    pub fn direct_solver(&self) -> SolverKind {
        self.config.solver
    }

    pub fn select_ordering(&mut self, ordering: Ordering) {
        self.config.ordering = ordering;
    }

    pub fn ordering(&self) -> Ordering {
        self.config.ordering
    }

    /// Use the permutation `perm` (`perm[new] = old`); the ordering becomes
    /// [`Ordering::User`].
    pub fn set_permutation(&mut self, perm: Vec<usize>) {
        self.config.ordering = Ordering::User;
        self.config.permutation = Some(perm);
    }

    pub fn permutation(&self) -> Option<&[usize]> {
        self.config.permutation.as_deref()
    }

    /// Threads per node; advisory.
    pub fn set_number_of_threads_per_node(&mut self, threads: usize) {
        self.config.threads = threads.max(1);
        if let Some(backend) = self.backend.as_mut() {
            backend.set_threads(self.config.threads);
        }
    }

    pub fn number_of_threads_per_node(&self) -> usize {
        self.config.threads
    }

    /// Use the unsymmetric incomplete factorization even when the matrix is
    /// flagged symmetric.
    pub fn set_non_symmetric_ilut(&mut self) {
        self.config.non_symmetric_ilut = true;
    }

    pub fn refine_solution(&mut self) {
        self.set_refinement(true);
    }

    pub fn do_not_refine_solution(&mut self) {
        self.set_refinement(false);
    }

    fn set_refinement(&mut self, refine: bool) {
        self.config.refinement = refine;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_refinement(refine);
        }
    }

    /// Initial factor storage, in units of `nnz(A)`.
    pub fn set_coefficient_estimation_needed_memory(&mut self, coef: f64) {
        self.config.memory.coefficient = coef;
        self.forward_memory_estimation();
    }

    /// Factor storage ceiling, in units of `nnz(A)`.
    pub fn set_maximum_coefficient_estimation_needed_memory(&mut self, coef: f64) {
        self.config.memory.maximum = coef;
        self.forward_memory_estimation();
    }

    /// Growth factor of the factor storage.
    pub fn set_increase_coefficient_estimation_needed_memory(&mut self, coef: f64) {
        self.config.memory.increase = coef;
        self.forward_memory_estimation();
    }

    pub fn memory_estimation(&self) -> MemoryEstimation {
        self.config.memory
    }

    fn forward_memory_estimation(&mut self) {
        let memory = self.config.memory;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_memory_estimation(memory);
        }
    }

    /// Drop tolerance of the incomplete factorization.
    pub fn threshold_matrix(&self) -> f64 {
        self.config.threshold
    }

    pub fn set_threshold_matrix(&mut self, eps: f64) {
        self.config.threshold = eps.max(0.0);
    }

    /// Threshold for partial pivoting (1.0 is classical partial pivoting).
    pub fn set_pivot_threshold(&mut self, threshold: f64) {
        self.config.pivot_threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn pivot_threshold(&self) -> f64 {
        self.config.pivot_threshold
    }

    fn make_backend(&self, function: &str) -> Result<Box<dyn FactorizationBackend>> {
        let config = &self.config;
        let mut backend: Box<dyn FactorizationBackend> = match config.solver {
            SolverKind::SparseLu => Box::new(SparseLu::new(config.pivot_threshold)),
            SolverKind::DenseLu => Box::new(DenseLu::new()),
            SolverKind::Ilut => {
                let mut ilut = Ilut::new(config.threshold, config.pivot_threshold);
                ilut.set_unsymmetric(config.non_symmetric_ilut);
                Box::new(ilut)
            }
            #[cfg(feature = "faer-solver")]
            SolverKind::Faer => Box::new(FaerLu::new()),
            other => {
                return Err(SolverError::BackendUnavailable {
                    backend: other.to_string(),
                    function: function.to_string(),
                })
            }
        };
        backend.set_threads(config.threads);
        backend.set_refinement(config.refinement);
        backend.set_memory_estimation(config.memory);
        Ok(backend)
    }

    /// Factorize `a`, taking ownership of it.
    ///
    /// On failure the solver holds no factorization.
    pub fn factorize(&mut self, a: CsrMatrix) -> Result<()> {
        const FUNCTION: &str = "SparseDirectSolver::factorize";
        self.clear();

        if !a.is_square() {
            return Err(SolverError::wrong_dim(
                FUNCTION,
                format!("matrix is {}x{}, a square matrix is needed", a.nrows(), a.ncols()),
            ));
        }

        let mut backend = self.make_backend(FUNCTION)?;
        let perm = compute_ordering(&a, self.config.ordering, self.config.permutation.as_deref())?;
        backend.factorize(&a, &perm)?;

        let entries = backend.memory_used();
        debug!(
            n = a.nrows(),
            nnz = a.nnz(),
            backend = backend.name(),
            ordering = %self.config.ordering,
            entries,
            fill = entries.saturating_sub(a.nnz()),
            "factorization done"
        );
        self.n = a.nrows();
        self.backend = Some(backend);
        Ok(())
    }

    /// Solve `A x = b` in place (`x` holds `b` on entry).
    pub fn solve(&self, x: &mut [f64]) -> Result<()> {
        self.solve_trans(Transpose::NoTrans, x)
    }

    /// Solve `op(A) x = b` in place.
    pub fn solve_trans(&self, trans: Transpose, x: &mut [f64]) -> Result<()> {
        const FUNCTION: &str = "SparseDirectSolver::solve";
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| SolverError::not_factorized(FUNCTION))?;
        if x.len() != self.n {
            return Err(SolverError::wrong_dim(
                FUNCTION,
                format!("factorized dimension is {}, vector has length {}", self.n, x.len()),
            ));
        }
        backend.solve(trans, x)
    }

    /// Number of rows of the factorized matrix.
    pub fn m(&self) -> usize {
        self.n
    }

    /// Number of columns of the factorized matrix.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn is_factorized(&self) -> bool {
        self.backend.is_some()
    }

    /// Release the factorization; settings are kept.
    pub fn clear(&mut self) {
        self.backend = None;
        self.n = 0;
    }

    /// Number of stored factor entries.
    pub fn memory_used(&self) -> usize {
        self.backend.as_ref().map_or(0, |b| b.memory_used())
    }
}

fn check_system(m: &CsrMatrix, y: &[f64], function: &str) -> Result<()> {
    if !m.is_square() || y.len() != m.nrows() {
        return Err(SolverError::wrong_dim(
            function,
            format!(
                "matrix is {}x{}, right-hand side has length {}",
                m.nrows(),
                m.ncols(),
                y.len()
            ),
        ));
    }
    Ok(())
}

/// Solve `m x = y` in place with a transient default solver.
///
/// Dimensions are checked before `m` is consumed.
pub fn sparse_solve(m: CsrMatrix, y: &mut [f64]) -> Result<()> {
    check_system(&m, y, "sparse_solve")?;
    let mut solver = SparseDirectSolver::new();
    solver.factorize(m)?;
    solver.solve(y)
}

/// Solve `m x = y` in place for row or column compressed input.
pub fn get_and_solve_lu(m: impl Into<CsrMatrix>, y: &mut [f64]) -> Result<()> {
    let m = m.into();
    check_system(&m, y, "get_and_solve_lu")?;
    let mut solver = SparseDirectSolver::new();
    solver.factorize(m)?;
    solver.solve(y)
}
