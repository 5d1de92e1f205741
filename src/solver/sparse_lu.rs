//! Sparse LU factorization with threshold partial pivoting.
//!
//! Rows of `B = P A Pᵀ` are eliminated one at a time (IKJ order) into a
//! dense accumulator, giving `B Q = L U` where `Q` is the column
//! permutation chosen by pivoting. The same kernel drives the incomplete
//! factorization, which additionally drops small entries.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::{debug, warn};

use crate::error::{Result, SolverError};
use crate::matrix::CsrMatrix;
use crate::tags::Transpose;

use super::backend::{check_rhs, permute_rhs, refine, unpermute_solution, FactorizationBackend};
use super::{MemoryEstimation, DEFAULT_PIVOT_THRESHOLD, SPARSE_LU_REFINEMENT_STEPS};

/// Relative size below which a pivot candidate counts as zero.
const PIVOT_EPSILON: f64 = 1e-14;

/// Perturbation used for zero pivots when the drop tolerance is zero.
pub(crate) const MIN_PERTURBATION: f64 = 1e-8;

/// Knobs of the row elimination kernel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EliminationOptions {
    pub pivot_threshold: f64,
    /// Drop entries below `tol × row norm` (incomplete factorization).
    pub drop_tolerance: Option<f64>,
    /// Replace zero pivots by a small value instead of failing.
    pub perturb_zero_pivots: bool,
}

/// Factor storage budget, in stored entries.
#[derive(Debug, Clone)]
pub(crate) struct StorageBudget {
    capacity: usize,
    limit: usize,
    increase: f64,
}

impl StorageBudget {
    pub fn new(memory: MemoryEstimation, n: usize, nnz: usize) -> Self {
        let scaled = |c: f64| (c.max(0.0) * nnz as f64).ceil() as usize;
        // Never more than a dense factorization needs
        let limit = scaled(memory.maximum).max(n).min(n.saturating_mul(n).max(n));
        Self {
            capacity: scaled(memory.coefficient).max(n).min(limit),
            limit,
            increase: memory.increase,
        }
    }

    /// Make room for `needed` entries, growing geometrically.
    pub fn require(&mut self, needed: usize, function: &str) -> Result<()> {
        if needed <= self.capacity {
            return Ok(());
        }
        if needed > self.limit {
            return Err(SolverError::no_memory(
                function,
                format!(
                    "factor needs {} entries (limit {})",
                    needed, self.limit
                ),
            ));
        }
        while needed > self.capacity {
            let grown = (self.capacity as f64 * self.increase).ceil() as usize;
            self.capacity = grown.max(self.capacity + 1).min(self.limit);
        }
        debug!(capacity = self.capacity, "factor storage grown");
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// `B Q = L U` in position numbering.
///
/// `L` is unit lower triangular and `U` upper triangular with its diagonal
/// kept apart; both store column positions. `qperm[pos]` is the column of
/// `B` moved to position `pos`.
#[derive(Debug, Clone, Default)]
pub(crate) struct RowFactors {
    n: usize,
    l_ptr: Vec<usize>,
    l_idx: Vec<usize>,
    l_val: Vec<f64>,
    u_ptr: Vec<usize>,
    u_idx: Vec<usize>,
    u_val: Vec<f64>,
    diag: Vec<f64>,
    qperm: Vec<usize>,
}

impl RowFactors {
    /// Eliminate the rows of the square matrix `b`.
    pub fn eliminate(
        b: &CsrMatrix,
        options: EliminationOptions,
        mut budget: Option<&mut StorageBudget>,
        function: &str,
    ) -> Result<Self> {
        let n = b.nrows();
        let anorm = b.values().iter().fold(0.0f64, |m, v| m.max(v.abs()));

        let mut f = RowFactors {
            n,
            l_ptr: Vec::with_capacity(n + 1),
            u_ptr: Vec::with_capacity(n + 1),
            diag: Vec::with_capacity(n),
            qperm: (0..n).collect(),
            ..Default::default()
        };
        if let Some(budget) = budget.as_deref() {
            f.l_idx.reserve(budget.capacity() / 2);
            f.u_idx.reserve(budget.capacity() / 2);
        }
        f.l_ptr.push(0);
        f.u_ptr.push(0);
        let mut qinv: Vec<usize> = (0..n).collect();

        let mut w = vec![0.0; n];
        let mut in_pattern = vec![false; n];
        let mut pattern: Vec<usize> = Vec::new();
        let mut heap: BinaryHeap<Reverse<usize>> = BinaryHeap::new();

        for i in 0..n {
            let (cols, vals) = b.row(i);
            let mut row_norm = 0.0;
            for (&c, &v) in cols.iter().zip(vals) {
                w[c] = v;
                in_pattern[c] = true;
                pattern.push(c);
                row_norm += v.abs();
                if qinv[c] < i {
                    heap.push(Reverse(qinv[c]));
                }
            }
            row_norm /= cols.len().max(1) as f64;
            let drop_limit = options.drop_tolerance.map(|t| t * row_norm);

            // Lower part, in increasing position order
            while let Some(Reverse(k)) = heap.pop() {
                let col = f.qperm[k];
                let mult = w[col] / f.diag[k];
                w[col] = 0.0;
                if mult == 0.0 || drop_limit.is_some_and(|lim| mult.abs() <= lim) {
                    continue;
                }
                f.l_idx.push(k);
                f.l_val.push(mult);
                for idx in f.u_ptr[k]..f.u_ptr[k + 1] {
                    let c = f.u_idx[idx];
                    if !in_pattern[c] {
                        in_pattern[c] = true;
                        pattern.push(c);
                        w[c] = 0.0;
                        if qinv[c] < i {
                            heap.push(Reverse(qinv[c]));
                        }
                    }
                    w[c] -= mult * f.u_val[idx];
                }
            }
            f.l_ptr.push(f.l_idx.len());

            // Pivot among the remaining columns
            let diag_col = f.qperm[i];
            let diag_val = if in_pattern[diag_col] { w[diag_col] } else { 0.0 };
            let (mut pivot_col, mut max_abs) = (diag_col, 0.0f64);
            for &c in &pattern {
                if qinv[c] >= i && w[c].abs() > max_abs {
                    max_abs = w[c].abs();
                    pivot_col = c;
                }
            }

            let pivot = if max_abs <= PIVOT_EPSILON * anorm || !max_abs.is_finite() {
                if !options.perturb_zero_pivots {
                    return Err(SolverError::singular(i, function));
                }
                let scale = if row_norm > 0.0 { row_norm } else { 1.0 };
                let eps = options.drop_tolerance.filter(|&t| t > 0.0).unwrap_or(MIN_PERTURBATION);
                warn!(row = i, pivot = eps * scale, "zero pivot replaced");
                pivot_col = diag_col;
                eps * scale
            } else {
                if diag_val.abs() >= options.pivot_threshold * max_abs && diag_val != 0.0 {
                    pivot_col = diag_col;
                }
                w[pivot_col]
            };

            if pivot_col != diag_col {
                let p = qinv[pivot_col];
                f.qperm.swap(i, p);
                qinv[pivot_col] = i;
                qinv[diag_col] = p;
            }
            f.diag.push(pivot);

            // Upper part, kept by column until positions are final
            for &c in &pattern {
                if qinv[c] > i {
                    let v = w[c];
                    if drop_limit.is_some_and(|lim| v.abs() <= lim) {
                        continue;
                    }
                    f.u_idx.push(c);
                    f.u_val.push(v);
                }
            }
            f.u_ptr.push(f.u_idx.len());

            for &c in &pattern {
                w[c] = 0.0;
                in_pattern[c] = false;
            }
            pattern.clear();

            if let Some(budget) = budget.as_deref_mut() {
                budget.require(f.memory_used(), function)?;
            }
        }

        for c in &mut f.u_idx {
            *c = qinv[*c];
        }
        Ok(f)
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Stored entries of `L`, `U` and the diagonal.
    pub fn memory_used(&self) -> usize {
        self.l_val.len() + self.u_val.len() + self.diag.len()
    }

    /// Solve `op(B) y = c` in place.
    pub fn solve_in_place(&self, trans: Transpose, x: &mut [f64]) {
        let n = self.n;
        if trans.is_transposed() {
            // Uᵀ Lᵀ y = Qᵀ c
            let mut w: Vec<f64> = self.qperm.iter().map(|&c| x[c]).collect();
            for i in 0..n {
                w[i] /= self.diag[i];
                let wi = w[i];
                for idx in self.u_ptr[i]..self.u_ptr[i + 1] {
                    w[self.u_idx[idx]] -= self.u_val[idx] * wi;
                }
            }
            for i in (0..n).rev() {
                let wi = w[i];
                for idx in self.l_ptr[i]..self.l_ptr[i + 1] {
                    w[self.l_idx[idx]] -= self.l_val[idx] * wi;
                }
            }
            x.copy_from_slice(&w);
        } else {
            // L U z = c, then y = Q z
            let mut w = x.to_vec();
            for i in 0..n {
                let mut s = w[i];
                for idx in self.l_ptr[i]..self.l_ptr[i + 1] {
                    s -= self.l_val[idx] * w[self.l_idx[idx]];
                }
                w[i] = s;
            }
            for i in (0..n).rev() {
                let mut s = w[i];
                for idx in self.u_ptr[i]..self.u_ptr[i + 1] {
                    s -= self.u_val[idx] * w[self.u_idx[idx]];
                }
                w[i] = s / self.diag[i];
            }
            for (pos, &c) in self.qperm.iter().enumerate() {
                x[c] = w[pos];
            }
        }
    }
}

/// Native sparse LU backend.
#[derive(Debug)]
pub struct SparseLu {
    pivot_threshold: f64,
    memory: MemoryEstimation,
    refine: bool,
    perm: Vec<usize>,
    factors: Option<RowFactors>,
    /// Permuted matrix, retained for refinement.
    permuted: Option<CsrMatrix>,
}

impl Default for SparseLu {
    fn default() -> Self {
        Self::new(DEFAULT_PIVOT_THRESHOLD)
    }
}

impl SparseLu {
    pub fn new(pivot_threshold: f64) -> Self {
        Self {
            pivot_threshold: pivot_threshold.clamp(0.0, 1.0),
            memory: MemoryEstimation::default(),
            refine: false,
            perm: Vec::new(),
            factors: None,
            permuted: None,
        }
    }

    /// Entries of `L + U` beyond those of `A`.
    pub fn fill_in(&self, a: &CsrMatrix) -> usize {
        self.memory_used().saturating_sub(a.nnz())
    }
}

impl FactorizationBackend for SparseLu {
    fn name(&self) -> &'static str {
        "sparse-lu"
    }

    fn factorize(&mut self, a: &CsrMatrix, perm: &[usize]) -> Result<()> {
        const FUNCTION: &str = "SparseLu::factorize";
        self.factors = None;
        self.permuted = None;

        let b = a.permute_symmetric(perm);
        let mut budget = StorageBudget::new(self.memory, a.nrows(), a.nnz());
        let options = EliminationOptions {
            pivot_threshold: self.pivot_threshold,
            drop_tolerance: None,
            perturb_zero_pivots: false,
        };
        let factors = RowFactors::eliminate(&b, options, Some(&mut budget), FUNCTION)?;
        debug!(
            n = factors.n(),
            entries = factors.memory_used(),
            capacity = budget.capacity(),
            "sparse LU done"
        );

        self.perm = perm.to_vec();
        self.factors = Some(factors);
        if self.refine {
            self.permuted = Some(b);
        }
        Ok(())
    }

    fn solve(&self, trans: Transpose, x: &mut [f64]) -> Result<()> {
        let factors = self
            .factors
            .as_ref()
            .ok_or_else(|| SolverError::not_factorized("SparseLu::solve"))?;
        check_rhs(factors.n(), x, "SparseLu::solve")?;

        let rhs = permute_rhs(&self.perm, x);
        let mut y = rhs.clone();
        factors.solve_in_place(trans, &mut y);
        if let Some(b) = &self.permuted {
            refine(b, trans, &rhs, &mut y, SPARSE_LU_REFINEMENT_STEPS, |r| {
                factors.solve_in_place(trans, r);
                Ok(())
            })?;
        }
        unpermute_solution(&self.perm, &y, x);
        Ok(())
    }

    fn memory_used(&self) -> usize {
        self.factors.as_ref().map_or(0, RowFactors::memory_used)
    }

    fn set_refinement(&mut self, refine: bool) {
        self.refine = refine;
    }

    fn set_memory_estimation(&mut self, memory: MemoryEstimation) {
        self.memory = memory;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::LinearOperator;
    use approx::assert_relative_eq;

    fn unsymmetric() -> CsrMatrix {
        // [[0, 2, 1],
        //  [3, 1, 0],
        //  [1, 0, 4]]
        CsrMatrix::from_coordinates(
            3,
            3,
            &[0, 0, 1, 1, 2, 2],
            &[1, 2, 0, 1, 0, 2],
            &[2.0, 1.0, 3.0, 1.0, 1.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_zero_diagonal_needs_pivoting() {
        let a = unsymmetric();
        let mut lu = SparseLu::default();
        lu.factorize(&a, &[0, 1, 2]).unwrap();

        let x_true = [1.0, -2.0, 0.5];
        let mut x = a.mul_vec(&x_true).unwrap();
        lu.solve(Transpose::NoTrans, &mut x).unwrap();
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_transpose_solve_with_permutation() {
        let a = unsymmetric();
        let mut lu = SparseLu::new(1.0);
        lu.set_refinement(true);
        lu.factorize(&a, &[2, 0, 1]).unwrap();

        let x_true = [0.25, 3.0, -1.0];
        let mut x = vec![0.0; 3];
        a.apply(Transpose::Trans, &x_true, &mut x).unwrap();
        lu.solve(Transpose::Trans, &mut x).unwrap();
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_reports_row() {
        // Second row is a multiple of the first
        let a = CsrMatrix::from_coordinates(
            2,
            2,
            &[0, 0, 1, 1],
            &[0, 1, 0, 1],
            &[1.0, 2.0, 2.0, 4.0],
        )
        .unwrap();
        let err = SparseLu::default().factorize(&a, &[0, 1]).unwrap_err();
        assert_eq!(err.info(), Some(2));
    }

    #[test]
    fn test_storage_ceiling() {
        // Arrow matrix eliminated hub first fills completely
        let n = 8;
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            vals.push(n as f64);
            if i > 0 {
                rows.extend([0, i]);
                cols.extend([i, 0]);
                vals.extend([1.0, 1.0]);
            }
        }
        let a = CsrMatrix::from_coordinates(n, n, &rows, &cols, &vals).unwrap();
        let natural: Vec<usize> = (0..n).collect();

        let mut lu = SparseLu::default();
        lu.set_memory_estimation(MemoryEstimation {
            coefficient: 1.0,
            maximum: 1.5,
            increase: 2.0,
        });
        let err = lu.factorize(&a, &natural).unwrap_err();
        assert!(matches!(err, SolverError::OutOfMemory { .. }));

        lu.set_memory_estimation(MemoryEstimation::default());
        lu.factorize(&a, &natural).unwrap();
        assert_eq!(lu.memory_used(), n * n);
    }

    #[test]
    fn test_budget_reports_needed_entries() {
        let memory = MemoryEstimation {
            coefficient: 1.0,
            maximum: 2.0,
            increase: 2.0,
        };
        let mut budget = StorageBudget::new(memory, 4, 5);
        budget.require(8, "test").unwrap();
        assert_eq!(budget.capacity(), 10);
        let err = budget.require(11, "test").unwrap_err();
        assert_eq!(err.comment(), "factor needs 11 entries (limit 10)");
    }

    #[test]
    fn test_default_budget_admits_dense_fill() {
        let mut budget = StorageBudget::new(MemoryEstimation::default(), 1500, 7491);
        budget.require(1500 * 1500, "test").unwrap();
        assert!(budget.require(1500 * 1500 + 1, "test").is_err());
    }
}
