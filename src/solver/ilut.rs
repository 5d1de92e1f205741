//! Incomplete LU factorization with threshold dropping.
//!
//! Two variants:
//!
//! - general matrices: ILUTP, the sparse LU kernel with dropping and column
//!   pivoting;
//! - matrices flagged symmetric: incomplete `L D Lᵀ`, storing only the
//!   upper factor `Lᵀ` row by row.
//!
//! The result is an approximate inverse meant for preconditioning, so zero
//! pivots are perturbed instead of failing.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::{debug, warn};

use crate::error::{Result, SolverError};
use crate::matrix::CsrMatrix;
use crate::tags::Transpose;

use super::backend::{check_rhs, permute_rhs, unpermute_solution, FactorizationBackend};
use super::sparse_lu::{EliminationOptions, RowFactors, MIN_PERTURBATION};
use super::{DEFAULT_ILUT_THRESHOLD, DEFAULT_PIVOT_THRESHOLD};

/// Incomplete `L D Lᵀ`: `upper[k]` holds `(j, L(j, k))` for `j > k`.
#[derive(Debug, Clone)]
struct SymmetricFactors {
    upper: Vec<Vec<(usize, f64)>>,
    diag: Vec<f64>,
}

impl SymmetricFactors {
    fn eliminate(b: &CsrMatrix, threshold: f64) -> Self {
        let n = b.nrows();
        let mut upper: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut diag = Vec::with_capacity(n);
        let mut w = vec![0.0; n];
        let mut in_pattern = vec![false; n];
        let mut pattern: Vec<usize> = Vec::new();

        for i in 0..n {
            let (cols, vals) = b.row(i);
            let mut row_norm = 0.0;
            for (&c, &v) in cols.iter().zip(vals) {
                row_norm += v.abs();
                if c <= i {
                    w[c] = v;
                    in_pattern[c] = true;
                    pattern.push(c);
                }
            }
            row_norm /= cols.len().max(1) as f64;
            let drop_limit = threshold * row_norm;

            // t(i, k) = L(i, k) D(k), eliminated in increasing k
            let mut heap: BinaryHeap<Reverse<usize>> =
                pattern.iter().copied().filter(|&c| c < i).map(Reverse).collect();
            let mut lower: Vec<(usize, f64)> = Vec::new();
            let mut d = 0.0;
            while let Some(Reverse(k)) = heap.pop() {
                let t = w[k];
                if t == 0.0 || t.abs() <= drop_limit {
                    continue;
                }
                let l = t / diag[k];
                lower.push((k, l));
                for &(j, ljk) in &upper[k] {
                    if j >= i {
                        break;
                    }
                    if !in_pattern[j] {
                        in_pattern[j] = true;
                        pattern.push(j);
                        w[j] = 0.0;
                        heap.push(Reverse(j));
                    }
                    w[j] -= t * ljk;
                }
                d -= t * l;
            }
            if in_pattern[i] {
                d += w[i];
            }

            if d.abs() <= f64::EPSILON * row_norm || !d.is_finite() {
                let scale = if row_norm > 0.0 { row_norm } else { 1.0 };
                let eps = if threshold > 0.0 { threshold } else { MIN_PERTURBATION };
                warn!(row = i, pivot = eps * scale, "zero pivot replaced");
                d = eps * scale;
            }
            diag.push(d);
            for (k, l) in lower {
                upper[k].push((i, l));
            }

            for &c in &pattern {
                w[c] = 0.0;
                in_pattern[c] = false;
            }
            pattern.clear();
        }

        Self { upper, diag }
    }

    fn memory_used(&self) -> usize {
        self.diag.len() + self.upper.iter().map(Vec::len).sum::<usize>()
    }

    /// `L D Lᵀ x = b`; the operator is symmetric so both directions agree.
    fn solve_in_place(&self, x: &mut [f64]) {
        let n = self.diag.len();
        for k in 0..n {
            let xk = x[k];
            for &(j, l) in &self.upper[k] {
                x[j] -= l * xk;
            }
        }
        for (xk, d) in x.iter_mut().zip(&self.diag) {
            *xk /= d;
        }
        for k in (0..n).rev() {
            let mut s = x[k];
            for &(j, l) in &self.upper[k] {
                s -= l * x[j];
            }
            x[k] = s;
        }
    }
}

#[derive(Debug, Clone)]
enum IlutFactors {
    General(RowFactors),
    Symmetric(SymmetricFactors),
}

/// Incomplete factorization backend.
#[derive(Debug)]
pub struct Ilut {
    threshold: f64,
    pivot_threshold: f64,
    force_unsymmetric: bool,
    perm: Vec<usize>,
    factors: Option<IlutFactors>,
}

impl Default for Ilut {
    fn default() -> Self {
        Self::new(DEFAULT_ILUT_THRESHOLD, DEFAULT_PIVOT_THRESHOLD)
    }
}

impl Ilut {
    pub fn new(threshold: f64, pivot_threshold: f64) -> Self {
        Self {
            threshold: threshold.max(0.0),
            pivot_threshold: pivot_threshold.clamp(0.0, 1.0),
            force_unsymmetric: false,
            perm: Vec::new(),
            factors: None,
        }
    }

    /// Use the unsymmetric variant even for matrices flagged symmetric.
    pub fn set_unsymmetric(&mut self, enforce: bool) {
        self.force_unsymmetric = enforce;
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether the last factorization used the symmetric variant.
    pub fn is_symmetric(&self) -> bool {
        matches!(self.factors, Some(IlutFactors::Symmetric(_)))
    }
}

impl FactorizationBackend for Ilut {
    fn name(&self) -> &'static str {
        "ilut"
    }

    fn factorize(&mut self, a: &CsrMatrix, perm: &[usize]) -> Result<()> {
        self.factors = None;
        let b = a.permute_symmetric(perm);

        let factors = if a.is_symmetric() && !self.force_unsymmetric {
            IlutFactors::Symmetric(SymmetricFactors::eliminate(&b, self.threshold))
        } else {
            let options = EliminationOptions {
                pivot_threshold: self.pivot_threshold,
                drop_tolerance: Some(self.threshold),
                perturb_zero_pivots: true,
            };
            IlutFactors::General(RowFactors::eliminate(&b, options, None, "Ilut::factorize")?)
        };

        self.perm = perm.to_vec();
        self.factors = Some(factors);
        debug!(
            n = a.nrows(),
            nnz = a.nnz(),
            entries = self.memory_used(),
            symmetric = self.is_symmetric(),
            "incomplete factorization done"
        );
        Ok(())
    }

    fn solve(&self, trans: Transpose, x: &mut [f64]) -> Result<()> {
        let factors = self
            .factors
            .as_ref()
            .ok_or_else(|| SolverError::not_factorized("Ilut::solve"))?;
        check_rhs(self.perm.len(), x, "Ilut::solve")?;

        let mut y = permute_rhs(&self.perm, x);
        match factors {
            IlutFactors::General(f) => f.solve_in_place(trans, &mut y),
            IlutFactors::Symmetric(f) => f.solve_in_place(&mut y),
        }
        unpermute_solution(&self.perm, &y, x);
        Ok(())
    }

    fn memory_used(&self) -> usize {
        match &self.factors {
            Some(IlutFactors::General(f)) => f.memory_used(),
            Some(IlutFactors::Symmetric(f)) => f.memory_used(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 1D Laplacian, flagged symmetric.
    fn laplacian(n: usize) -> CsrMatrix {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            vals.push(2.0);
            if i + 1 < n {
                rows.extend([i, i + 1]);
                cols.extend([i + 1, i]);
                vals.extend([-1.0, -1.0]);
            }
        }
        let mut a = CsrMatrix::from_coordinates(n, n, &rows, &cols, &vals).unwrap();
        a.set_symmetric(true);
        a
    }

    #[test]
    fn test_no_dropping_is_exact_on_tridiagonal() {
        // Tridiagonal matrices have no fill, so ILUT(0) is the exact LU
        let a = laplacian(6);
        let natural: Vec<usize> = (0..6).collect();
        let x_true = [1.0, 2.0, 3.0, -1.0, 0.5, 4.0];

        for unsym in [false, true] {
            let mut ilut = Ilut::new(0.0, 1.0);
            ilut.set_unsymmetric(unsym);
            ilut.factorize(&a, &natural).unwrap();
            assert_eq!(ilut.is_symmetric(), !unsym);

            let mut x = a.mul_vec(&x_true).unwrap();
            ilut.solve(Transpose::NoTrans, &mut x).unwrap();
            for (xi, ti) in x.iter().zip(&x_true) {
                assert_relative_eq!(xi, ti, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_symmetric_variant_stores_one_triangle() {
        let a = laplacian(5);
        let natural: Vec<usize> = (0..5).collect();
        let mut sym = Ilut::new(0.0, 1.0);
        sym.factorize(&a, &natural).unwrap();
        let mut gen = Ilut::new(0.0, 1.0);
        gen.set_unsymmetric(true);
        gen.factorize(&a, &natural).unwrap();
        assert_eq!(sym.memory_used(), 5 + 4);
        assert_eq!(gen.memory_used(), 5 + 4 + 4);
    }

    #[test]
    fn test_zero_pivot_is_perturbed() {
        let a = CsrMatrix::from_coordinates(2, 2, &[0], &[0], &[1.0]).unwrap();
        let mut ilut = Ilut::default();
        ilut.factorize(&a, &[0, 1]).unwrap();
        let mut x = [1.0, 0.0];
        ilut.solve(Transpose::NoTrans, &mut x).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
    }
}
