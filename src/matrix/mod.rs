//! Matrix and vector containers consumed by the solver layer.
//!
//! ## Formats
//!
//! | Type              | Storage                                   | Typical use |
//! |-------------------|-------------------------------------------|-------------|
//! | [`CsrMatrix`]     | compressed rows (`row_ptr`, `col_idx`)    | factorization input, products |
//! | [`CscMatrix`]     | compressed columns (`col_ptr`, `row_idx`) | column access, alternate input |
//! | [`TripletMatrix`] | one sorted `(col, value)` list per row    | incremental assembly |
//! | [`DenseMatrix`]   | row-major `Vec<f64>`                      | dense LU, reference values |
//! | [`SparseVector`]  | sorted `(index, value)` pairs             | extracted rows/columns |
//!
//! Coordinate format is three parallel arrays `(rows, cols, values)` in any
//! order; duplicates are summed on conversion.
//!
//! Every matrix type implements [`LinearOperator`], the only capability the
//! iterative methods need from `A`.

mod csc;
mod csr;
mod dense;
mod triplet;
mod vector;

pub use csc::CscMatrix;
pub use csr::CsrMatrix;
pub use dense::{triangular_solve, DenseMatrix};
pub use triplet::TripletMatrix;
pub use vector::SparseVector;

use crate::error::{Result, SolverError};
use crate::tags::Transpose;

/// An operator `y = op(A) x`.
pub trait LinearOperator {
    /// Number of rows of `A`.
    fn nrows(&self) -> usize;

    /// Number of columns of `A`.
    fn ncols(&self) -> usize;

    /// Compute `y = A x` (`NoTrans`) or `y = Aᵀ x` (`Trans`, `ConjTrans`).
    fn apply(&self, trans: Transpose, x: &[f64], y: &mut [f64]) -> Result<()>;
}

/// Check `x` and `y` against the shape of `op(A)`.
pub(crate) fn check_apply_dims(
    op: &(impl LinearOperator + ?Sized),
    trans: Transpose,
    x: &[f64],
    y: &[f64],
    function: &str,
) -> Result<()> {
    let (rows, cols) = if trans.is_transposed() {
        (op.ncols(), op.nrows())
    } else {
        (op.nrows(), op.ncols())
    };
    if x.len() != cols || y.len() != rows {
        return Err(SolverError::wrong_dim(
            function,
            format!(
                "operator is {}x{}, x has length {}, y has length {}",
                rows,
                cols,
                x.len(),
                y.len()
            ),
        ));
    }
    Ok(())
}

/// Dot product `xᵀ y`.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// Euclidean norm `‖x‖₂`.
pub fn norm2(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

/// `y += alpha * x`
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// Residual `b - A x`.
pub fn residual(a: &(impl LinearOperator + ?Sized), x: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    let mut r = vec![0.0; a.nrows()];
    a.apply(Transpose::NoTrans, x, &mut r)?;
    if b.len() != r.len() {
        return Err(SolverError::wrong_dim(
            "residual",
            format!("operator has {} rows, b has length {}", r.len(), b.len()),
        ));
    }
    for (ri, bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_helpers() {
        let x = [3.0, 4.0];
        assert!((norm2(&x) - 5.0).abs() < 1e-15);
        let mut y = [1.0, 1.0];
        axpy(2.0, &x, &mut y);
        assert_eq!(y, [7.0, 9.0]);
        assert_eq!(dot(&x, &y), 57.0);
    }

    #[test]
    fn test_residual_dimension_check() {
        let a = DenseMatrix::identity(3);
        let err = residual(&a, &[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, SolverError::WrongDim { .. }));
        let r = residual(&a, &[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]).unwrap();
        assert_eq!(r, vec![0.0, 0.0, 1.0]);
    }
}
