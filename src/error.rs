//! Error types for sparsolve.
//!
//! This module provides a unified error type [`SolverError`] covering every
//! failure the containers, orderings, factorization backends and iterative
//! methods can report. Each variant knows the operation that raised it
//! ([`SolverError::function`]) and carries a free-form comment
//! ([`SolverError::comment`]); backend failures additionally carry the raw
//! backend status code ([`SolverError::info`]).

use thiserror::Error;

/// Result type alias using [`SolverError`].
pub type Result<T> = std::result::Result<T, SolverError>;

/// Unified error type for all sparsolve operations.
#[derive(Error, Debug)]
pub enum SolverError {
    // ============ Resource Errors ============
    /// Allocation refused (factor storage exceeded its ceiling)
    #[error("Out of memory in {function}: {comment}")]
    OutOfMemory { function: String, comment: String },

    // ============ Argument Errors ============
    /// Dimensions of the operands do not agree
    #[error("Wrong dimensions in {function}: {comment}")]
    WrongDim { function: String, comment: String },

    /// Index out of range or malformed index array
    #[error("Index out of range in {function}: {comment}")]
    WrongIndex { function: String, comment: String },

    /// Row index out of range
    #[error("Row index out of range in {function}: {comment}")]
    WrongRow { function: String, comment: String },

    /// Column index out of range
    #[error("Column index out of range in {function}: {comment}")]
    WrongCol { function: String, comment: String },

    // ============ I/O Errors ============
    /// Error reading or writing a file or stream
    #[error("I/O error in {function} ({comment}): {source}")]
    Io {
        function: String,
        comment: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed Matrix Market or vector input
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    // ============ Backend Errors ============
    /// A factorization backend reported a failure
    #[error("Backend error in {function} (info = {info}): {comment}")]
    Backend {
        info: i32,
        function: String,
        comment: String,
    },

    /// Zero pivot met during factorization; `info` is the 1-based pivot row
    #[error("Singular matrix in {function} (info = {info}): {comment}")]
    Singular {
        info: i32,
        function: String,
        comment: String,
    },

    /// `solve` called with no live factorization
    #[error("No factorization available in {function}: call factorize first")]
    NotFactorized { function: String },

    /// The selected backend is not built into this crate
    #[error("Direct solver '{backend}' is not available in this build (requested by {function})")]
    BackendUnavailable { backend: String, function: String },

    // ============ Iterative Errors ============
    /// Iterative method stopped without reaching the tolerance
    #[error("Iterative solver did not converge after {iterations} iterations (residual: {residual:.2e}, code {code})")]
    ConvergenceFailure {
        iterations: usize,
        residual: f64,
        code: i32,
    },
}

impl SolverError {
    /// Create an out-of-memory error
    pub fn no_memory(function: impl Into<String>, comment: impl Into<String>) -> Self {
        Self::OutOfMemory {
            function: function.into(),
            comment: comment.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn wrong_dim(function: impl Into<String>, comment: impl Into<String>) -> Self {
        Self::WrongDim {
            function: function.into(),
            comment: comment.into(),
        }
    }

    /// Create an index error
    pub fn wrong_index(function: impl Into<String>, comment: impl Into<String>) -> Self {
        Self::WrongIndex {
            function: function.into(),
            comment: comment.into(),
        }
    }

    /// Create a row index error
    pub fn wrong_row(function: impl Into<String>, comment: impl Into<String>) -> Self {
        Self::WrongRow {
            function: function.into(),
            comment: comment.into(),
        }
    }

    /// Create a column index error
    pub fn wrong_col(function: impl Into<String>, comment: impl Into<String>) -> Self {
        Self::WrongCol {
            function: function.into(),
            comment: comment.into(),
        }
    }

    /// Create an I/O error
    pub fn io(
        function: impl Into<String>,
        comment: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            function: function.into(),
            comment: comment.into(),
            source,
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a backend error carrying a status code
    pub fn backend(info: i32, function: impl Into<String>, comment: impl Into<String>) -> Self {
        Self::Backend {
            info,
            function: function.into(),
            comment: comment.into(),
        }
    }

    /// Create a singular matrix error for the (0-based) pivot row `row`
    pub fn singular(row: usize, function: impl Into<String>) -> Self {
        Self::Singular {
            info: i32::try_from(row + 1).unwrap_or(i32::MAX),
            function: function.into(),
            comment: format!("zero pivot at row {}", row),
        }
    }

    /// Create a not-factorized error
    pub fn not_factorized(function: impl Into<String>) -> Self {
        Self::NotFactorized {
            function: function.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64, code: i32) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
            code,
        }
    }

    /// Name of the operation that raised the error.
    pub fn function(&self) -> &str {
        match self {
            Self::OutOfMemory { function, .. }
            | Self::WrongDim { function, .. }
            | Self::WrongIndex { function, .. }
            | Self::WrongRow { function, .. }
            | Self::WrongCol { function, .. }
            | Self::Io { function, .. }
            | Self::Backend { function, .. }
            | Self::Singular { function, .. }
            | Self::NotFactorized { function }
            | Self::BackendUnavailable { function, .. } => function,
            Self::Parse { .. } => "read_matrix_market",
            Self::ConvergenceFailure { .. } => "Iteration::check",
        }
    }

    /// Comment attached to the error.
    pub fn comment(&self) -> String {
        match self {
            Self::OutOfMemory { comment, .. }
            | Self::WrongDim { comment, .. }
            | Self::WrongIndex { comment, .. }
            | Self::WrongRow { comment, .. }
            | Self::WrongCol { comment, .. }
            | Self::Io { comment, .. }
            | Self::Backend { comment, .. }
            | Self::Singular { comment, .. } => comment.clone(),
            Self::Parse { message, .. } => message.clone(),
            Self::NotFactorized { .. } => "no factorization available".to_string(),
            Self::BackendUnavailable { backend, .. } => format!("{} not compiled in", backend),
            Self::ConvergenceFailure { residual, .. } => format!("residual {:.2e}", residual),
        }
    }

    /// Backend status code, for errors reported by a factorization backend.
    pub fn info(&self) -> Option<i32> {
        match self {
            Self::Backend { info, .. } | Self::Singular { info, .. } => Some(*info),
            Self::ConvergenceFailure { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether retrying with another backend or configuration can help.
    ///
    /// Numeric, memory and convergence failures depend on the chosen method;
    /// argument, I/O and usage errors do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OutOfMemory { .. }
                | Self::Backend { .. }
                | Self::Singular { .. }
                | Self::BackendUnavailable { .. }
                | Self::ConvergenceFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_function_and_comment() {
        let err = SolverError::wrong_dim("sparse_solve", "matrix is 3x3, rhs has length 2");
        assert_eq!(err.function(), "sparse_solve");
        assert_eq!(err.comment(), "matrix is 3x3, rhs has length 2");
        assert_eq!(
            err.to_string(),
            "Wrong dimensions in sparse_solve: matrix is 3x3, rhs has length 2"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_singular_info_is_one_based() {
        let err = SolverError::singular(4, "SparseLu::factorize");
        assert_eq!(err.info(), Some(5));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_not_factorized_message() {
        let err = SolverError::not_factorized("SparseDirectSolver::solve");
        assert!(err.to_string().contains("call factorize first"));
        assert_eq!(err.info(), None);
    }
}
