//! sparsolve - sparse linear system solver
//!
//! Reads a Matrix Market matrix, solves `A x = b` and writes `x` to stdout.
//!
//! # Usage
//!
//! ```bash
//! sparsolve matrix.mtx --rhs b.txt > x.txt
//! cat b.txt | sparsolve matrix.mtx --rhs - --method bicgstab --preconditioner ilut -vv
//! ```

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use sparsolve::{
    error::{Result, SolverError},
    io::{read_matrix_file, read_vector_file, read_vector_stdin, write_vector},
    iterative::{
        self, build_preconditioner, DEFAULT_MAX_ITERATIONS, DEFAULT_RESTART, DEFAULT_TOLERANCE,
    },
    matrix::{norm2, residual},
    CsrMatrix, DirectSolverConfig, Iteration, IterativeMethod, LinearOperator, Ordering,
    PreconditionerKind, SolverKind, SparseDirectSolver, Transpose,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    Direct,
    Cg,
    Bicg,
    Bicgstab,
    Gmres,
}

impl Method {
    fn iterative(self) -> Option<IterativeMethod> {
        match self {
            Method::Direct => None,
            Method::Cg => Some(IterativeMethod::Cg),
            Method::Bicg => Some(IterativeMethod::BiCg),
            Method::Bicgstab => Some(IterativeMethod::BiCgStab),
            Method::Gmres => Some(IterativeMethod::Gmres),
        }
    }
}

/// Sparse linear system solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the system matrix (Matrix Market coordinate format)
    #[arg(value_name = "MATRIX_FILE")]
    matrix_file: PathBuf,

    /// Right-hand side file, or `-` for stdin (default: A times the ones vector)
    #[arg(long, value_name = "FILE")]
    rhs: Option<String>,

    /// Factorization backend for the direct method and the direct preconditioner
    #[arg(long, default_value_t = SolverKind::SparseLu)]
    solver: SolverKind,

    /// Fill-reducing ordering
    #[arg(long, default_value_t = Ordering::Automatic)]
    ordering: Ordering,

    /// Solution method
    #[arg(long, value_enum, default_value_t = Method::Direct)]
    method: Method,

    /// Relative residual tolerance of the iterative methods
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Iteration cap of the iterative methods
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// GMRES restart length
    #[arg(long, default_value_t = DEFAULT_RESTART)]
    restart: usize,

    /// Drop tolerance of the incomplete factorization
    #[arg(long)]
    threshold: Option<f64>,

    /// Refine the direct solution iteratively
    #[arg(long)]
    refine: bool,

    /// Thread count hint for the factorization backend
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Preconditioner of the iterative methods
    #[arg(long, default_value_t = PreconditionerKind::Identity)]
    preconditioner: PreconditionerKind,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn direct_config(&self) -> DirectSolverConfig {
        let mut config = DirectSolverConfig::new()
            .with_solver(self.solver)
            .with_ordering(self.ordering)
            .with_threads(self.threads)
            .with_refinement(self.refine);
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        config
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_rhs(args: &Args, a: &CsrMatrix) -> Result<Vec<f64>> {
    let b = match args.rhs.as_deref() {
        Some("-") => read_vector_stdin()?,
        Some(path) => read_vector_file(&PathBuf::from(path))?,
        None => {
            let ones = vec![1.0; a.ncols()];
            let mut b = vec![0.0; a.nrows()];
            a.apply(Transpose::NoTrans, &ones, &mut b)?;
            b
        }
    };
    if b.len() != a.nrows() {
        return Err(SolverError::wrong_dim(
            "load_rhs",
            format!("matrix has {} rows, right-hand side has length {}", a.nrows(), b.len()),
        ));
    }
    Ok(b)
}

fn solve_iterative(
    args: &Args,
    method: IterativeMethod,
    a: &CsrMatrix,
    b: &[f64],
) -> Result<Vec<f64>> {
    let print_level = match args.verbose {
        0 => 0,
        1 => 1,
        _ => 6,
    };
    let mut iter = Iteration::new(args.max_iterations, args.tolerance)
        .with_method(method)
        .with_restart(args.restart)
        .with_preconditioner(args.preconditioner)
        .with_print_level(print_level);

    let mut precond = build_preconditioner(args.preconditioner, a, &args.direct_config())?;
    let mut x = vec![0.0; b.len()];
    let report = iterative::solve(a, &mut x, b, precond.as_mut(), &mut iter)?;
    info!(%method, preconditioner = %args.preconditioner, "{}", report);
    iter.check()?;
    Ok(x)
}

fn solve_direct(args: &Args, a: &CsrMatrix, b: &[f64]) -> Result<Vec<f64>> {
    let mut solver = SparseDirectSolver::with_config(args.direct_config());
    solver.factorize(a.clone())?;
    info!(
        solver = %solver.direct_solver(),
        memory = solver.memory_used(),
        "factorization done"
    );
    let mut x = b.to_vec();
    solver.solve(&mut x)?;
    Ok(x)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Read the system
    let a = CsrMatrix::from(read_matrix_file(&args.matrix_file)?);
    debug!(
        rows = a.nrows(),
        cols = a.ncols(),
        nnz = a.nnz(),
        symmetric = a.is_symmetric(),
        "matrix loaded"
    );
    let b = load_rhs(&args, &a)?;

    // Solve
    let x = match args.method.iterative() {
        Some(method) => solve_iterative(&args, method, &a, &b)?,
        None => solve_direct(&args, &a, &b)?,
    };
    let r = residual(&a, &x, &b)?;
    info!(residual = norm2(&r) / norm2(&b).max(f64::MIN_POSITIVE), "solution computed");

    // Write the solution
    std::io::stdout()
        .lock()
        .write_all(write_vector(&x).as_bytes())
        .map_err(|e| SolverError::io("main", "stdout", e))?;

    Ok(())
}
