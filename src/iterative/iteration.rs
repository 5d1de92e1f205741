//! Convergence controller shared by the Krylov methods.

use tracing::{info, trace, warn};

use crate::error::{Result, SolverError};
use crate::matrix::norm2;

use super::{IterativeMethod, PreconditionerKind};

/// Default relative tolerance.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default Krylov subspace size between GMRES restarts.
pub const DEFAULT_RESTART: usize = 10;

/// Residual became NaN or infinite.
pub const ERROR_NON_FINITE_RESIDUAL: i32 = -1;

/// Iteration cap reached before the tolerance.
pub const ERROR_MAX_ITERATIONS: i32 = -2;

/// A Krylov method divided by a vanishing scalar.
pub const ERROR_BREAKDOWN: i32 = 1;

/// Print level emitting the residual at every iteration.
const FULL_HISTORY_LEVEL: u8 = 6;

/// Residual reporting period for the intermediate print levels.
const PRINT_PERIOD: usize = 100;

/// Where an iteration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationState {
    /// Constructed, `init` not called.
    #[default]
    Fresh,
    Running,
    Converged,
    MaxIterations,
    Failed,
}

impl IterationState {
    /// Converged, capped or failed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IterationState::Converged | IterationState::MaxIterations | IterationState::Failed
        )
    }
}

/// Iteration controller.
///
/// Methods call [`init`](Self::init) with the right-hand side (which fixes
/// the scaling of every later residual), then loop on
/// [`finished`](Self::finished) and [`increment`](Self::increment). A
/// breakdown is reported with [`fail`](Self::fail).
///
/// ```
/// use sparsolve::Iteration;
///
/// let mut iter = Iteration::new(10, 1e-3);
/// iter.init(&[3.0, 4.0]);
/// assert!(!iter.finished_norm(1.0));
/// iter.increment();
/// assert!(iter.finished_norm(1e-3));
/// assert!(iter.is_converged());
/// ```
#[derive(Debug, Clone)]
pub struct Iteration {
    tolerance: f64,
    residual_factor: f64,
    max_iterations: usize,
    iteration: usize,
    error_code: i32,
    state: IterationState,
    print_level: u8,
    init_guess_null: bool,
    method: IterativeMethod,
    restart: usize,
    preconditioner: PreconditionerKind,
    last_residual: f64,
    history: Vec<f64>,
    message: Option<String>,
}

impl Default for Iteration {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE)
    }
}

impl Iteration {
    /// Create a controller stopping after `max_iterations` or once the
    /// relative residual drops to `tolerance`.
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            tolerance,
            residual_factor: 1.0,
            max_iterations,
            iteration: 0,
            error_code: 0,
            state: IterationState::Fresh,
            print_level: 1,
            init_guess_null: true,
            method: IterativeMethod::default(),
            restart: DEFAULT_RESTART,
            preconditioner: PreconditionerKind::default(),
            last_residual: 0.0,
            history: Vec::new(),
            message: None,
        }
    }

    /// Controller with the parameters of `outer` and fresh counters.
    pub fn inherit(outer: &Iteration) -> Self {
        Self {
            tolerance: outer.tolerance,
            max_iterations: outer.max_iterations,
            print_level: outer.print_level,
            init_guess_null: outer.init_guess_null,
            method: outer.method,
            restart: outer.restart,
            preconditioner: outer.preconditioner,
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: IterativeMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_restart(mut self, restart: usize) -> Self {
        self.set_restart(restart);
        self
    }

    pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    pub fn with_print_level(mut self, level: u8) -> Self {
        self.print_level = level;
        self
    }

    /// Start a solve: the relative residual of `r` will be 1.
    ///
    /// Returns 0, or [`ERROR_NON_FINITE_RESIDUAL`] when `‖r‖` is not finite
    /// (the controller is then failed).
    pub fn init(&mut self, r: &[f64]) -> i32 {
        let norm = norm2(r);
        self.iteration = 0;
        self.error_code = 0;
        self.message = None;
        self.history.clear();
        self.last_residual = 1.0;

        if !norm.is_finite() {
            self.residual_factor = 1.0;
            self.fail(ERROR_NON_FINITE_RESIDUAL, "initial residual is not finite");
            return ERROR_NON_FINITE_RESIDUAL;
        }
        self.residual_factor = if norm == 0.0 { 1.0 } else { 1.0 / norm };
        self.state = IterationState::Running;
        0
    }

    /// True until the first `increment` after `init`.
    pub fn first(&self) -> bool {
        self.iteration == 0
    }

    /// Test the residual vector `r`; see [`finished_norm`](Self::finished_norm).
    pub fn finished(&mut self, r: &[f64]) -> bool {
        self.finished_norm(norm2(r))
    }

    /// Test a residual norm against the tolerance and the iteration cap.
    ///
    /// Moves to `Converged` or `MaxIterations` (returning true) when either
    /// criterion holds. Once terminal the controller stays in that state and
    /// keeps reporting finished until the next [`init`](Self::init).
    pub fn finished_norm(&mut self, norm: f64) -> bool {
        if self.state.is_terminal() {
            return true;
        }
        let relative = norm * self.residual_factor;
        self.last_residual = relative;
        self.history.push(relative);
        self.print_residual(relative);

        if !relative.is_finite() {
            self.fail(ERROR_NON_FINITE_RESIDUAL, "residual is not finite");
            return true;
        }
        if relative <= self.tolerance {
            self.state = IterationState::Converged;
            self.error_code = 0;
            return true;
        }
        if self.iteration >= self.max_iterations {
            self.state = IterationState::MaxIterations;
            self.error_code = ERROR_MAX_ITERATIONS;
            return true;
        }
        self.state = IterationState::Running;
        false
    }

    fn print_residual(&self, relative: f64) {
        let every = self.print_level >= FULL_HISTORY_LEVEL;
        if every || (self.print_level > 0 && self.iteration % PRINT_PERIOD == 0) {
            info!(iteration = self.iteration, residual = relative, "residual");
        }
    }

    /// Abort with `code`; the iteration is finished and not converged.
    pub fn fail(&mut self, code: i32, message: impl Into<String>) {
        let message = message.into();
        if self.print_level > 0 {
            warn!(code, iteration = self.iteration, "{}", message);
        }
        self.state = IterationState::Failed;
        self.error_code = code;
        self.message = Some(message);
    }

    /// Count one iteration.
    pub fn increment(&mut self) -> &mut Self {
        self.iteration += 1;
        trace!(iteration = self.iteration, "iteration");
        self
    }

    /// `Err(ConvergenceFailure)` if the solve stopped without converging.
    pub fn check(&self) -> Result<()> {
        match self.state {
            IterationState::MaxIterations | IterationState::Failed => {
                let residual = self.last_residual;
                Err(SolverError::convergence_failure(self.iteration, residual, self.error_code))
            }
            _ => Ok(()),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// Inverse of the initial residual norm (1 if it was zero).
    pub fn residual_factor(&self) -> f64 {
        self.residual_factor
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: usize) {
        self.iteration = iteration;
    }

    /// 0 after convergence, negative for controller stops, positive for
    /// method breakdowns.
    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    pub fn is_converged(&self) -> bool {
        self.state == IterationState::Converged
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    pub fn print_level(&self) -> u8 {
        self.print_level
    }

    pub fn set_print_level(&mut self, level: u8) {
        self.print_level = level;
    }

    /// Report the residual every 100 iterations.
    pub fn show_messages(&mut self) {
        self.print_level = 1;
    }

    /// Report the residual at every iteration.
    pub fn show_full_history(&mut self) {
        self.print_level = FULL_HISTORY_LEVEL;
    }

    pub fn hide_messages(&mut self) {
        self.print_level = 0;
    }

    /// Whether methods start from `x = 0` instead of the given `x`.
    pub fn is_init_guess_null(&self) -> bool {
        self.init_guess_null
    }

    pub fn set_init_guess(&mut self, null: bool) {
        self.init_guess_null = null;
    }

    pub fn method(&self) -> IterativeMethod {
        self.method
    }

    pub fn restart(&self) -> usize {
        self.restart
    }

    pub fn set_restart(&mut self, restart: usize) {
        self.restart = restart.max(1);
    }

    pub fn preconditioner(&self) -> PreconditionerKind {
        self.preconditioner
    }

    /// Select the method, its restart parameter and the preconditioner.
    pub fn set_solver(
        &mut self,
        method: IterativeMethod,
        restart: usize,
        preconditioner: PreconditionerKind,
    ) {
        self.method = method;
        self.set_restart(restart);
        self.preconditioner = preconditioner;
    }

    /// Relative residual from the last test.
    pub fn last_residual(&self) -> f64 {
        self.last_residual
    }

    /// Every relative residual tested since `init`.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Message recorded by [`fail`](Self::fail).
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
