//! Reading and writing matrices and vectors.
//!
//! Matrices use the coordinate Matrix Market format (`real`, `integer` or
//! `pattern` fields; `general`, `symmetric` or `skew-symmetric` storage).
//! Vectors are plain whitespace-separated numbers, or a one-column Matrix
//! Market `array` file.

mod mtx;

pub use mtx::{read_matrix_market, read_vector, write_matrix_market, write_vector};

#[cfg(feature = "cli")]
use std::io::Read;
#[cfg(feature = "cli")]
use std::path::Path;

#[cfg(feature = "cli")]
use crate::error::{Result, SolverError};
#[cfg(feature = "cli")]
use crate::matrix::TripletMatrix;

/// Read a Matrix Market file.
#[cfg(feature = "cli")]
pub fn read_matrix_file(path: &Path) -> Result<TripletMatrix> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SolverError::io("read_matrix_file", path.display().to_string(), e))?;
    read_matrix_market(&content)
}

/// Read a vector file.
#[cfg(feature = "cli")]
pub fn read_vector_file(path: &Path) -> Result<Vec<f64>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SolverError::io("read_vector_file", path.display().to_string(), e))?;
    read_vector(&content)
}

/// Read a vector from stdin.
#[cfg(feature = "cli")]
pub fn read_vector_stdin() -> Result<Vec<f64>> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(|e| SolverError::io("read_vector_stdin", "stdin", e))?;
    read_vector(&content)
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_matrix_file(Path::new("/nonexistent/sparsolve/a.mtx")).unwrap_err();
        assert!(matches!(err, SolverError::Io { .. }));
        assert_eq!(err.function(), "read_matrix_file");
    }
}
