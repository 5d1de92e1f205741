//! Krylov methods.

use tracing::debug;

use crate::error::{Result, SolverError};
use crate::matrix::{axpy, dot, norm2, LinearOperator};
use crate::tags::Transpose;

use super::{Iteration, Preconditioner, SolveReport, ERROR_BREAKDOWN};

/// Check shapes and compute the initial residual `b - A x` (or `b` when the
/// initial guess is null, in which case `x` is zeroed).
fn start(
    a: &dyn LinearOperator,
    x: &mut [f64],
    b: &[f64],
    iter: &Iteration,
    function: &str,
) -> Result<Vec<f64>> {
    let n = a.nrows();
    if a.ncols() != n || x.len() != n || b.len() != n {
        return Err(SolverError::wrong_dim(
            function,
            format!(
                "operator is {}x{}, x has length {}, b has length {}",
                n,
                a.ncols(),
                x.len(),
                b.len()
            ),
        ));
    }
    if iter.is_init_guess_null() {
        x.fill(0.0);
        return Ok(b.to_vec());
    }
    let mut r = vec![0.0; n];
    a.apply(Transpose::NoTrans, x, &mut r)?;
    for (ri, bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
    Ok(r)
}

fn finish(iter: &Iteration, method: &str) -> SolveReport {
    let report = SolveReport::from(iter);
    debug!(method, %report, "iterative solve done");
    report
}

/// Preconditioned conjugate gradient, for symmetric positive definite `A`.
pub fn cg(
    a: &dyn LinearOperator,
    x: &mut [f64],
    b: &[f64],
    precond: &mut dyn Preconditioner,
    iter: &mut Iteration,
) -> Result<SolveReport> {
    let mut r = start(a, x, b, iter, "cg")?;
    iter.init(b);
    let n = r.len();
    let mut z = vec![0.0; n];
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];
    let mut rho_prev = 0.0;

    while !iter.finished(&r) {
        precond.solve(a, &r, &mut z)?;
        let rho = dot(&r, &z);
        if rho == 0.0 {
            iter.fail(ERROR_BREAKDOWN, "cg breakdown: rho = 0");
            break;
        }

        if iter.first() {
            p.copy_from_slice(&z);
        } else {
            let beta = rho / rho_prev;
            for (pi, zi) in p.iter_mut().zip(&z) {
                *pi = zi + beta * *pi;
            }
        }

        a.apply(Transpose::NoTrans, &p, &mut q)?;
        let pq = dot(&p, &q);
        if pq == 0.0 {
            iter.fail(ERROR_BREAKDOWN, "cg breakdown: p'Ap = 0");
            break;
        }
        let alpha = rho / pq;
        axpy(alpha, &p, x);
        axpy(-alpha, &q, &mut r);

        rho_prev = rho;
        iter.increment();
    }

    Ok(finish(iter, "cg"))
}

/// Preconditioned biconjugate gradient.
pub fn bicg(
    a: &dyn LinearOperator,
    x: &mut [f64],
    b: &[f64],
    precond: &mut dyn Preconditioner,
    iter: &mut Iteration,
) -> Result<SolveReport> {
    let mut r = start(a, x, b, iter, "bicg")?;
    iter.init(b);
    let n = r.len();
    let mut r_tilde = r.clone();
    let (mut z, mut z_tilde) = (vec![0.0; n], vec![0.0; n]);
    let (mut p, mut p_tilde) = (vec![0.0; n], vec![0.0; n]);
    let (mut q, mut q_tilde) = (vec![0.0; n], vec![0.0; n]);
    let mut rho_prev = 0.0;

    while !iter.finished(&r) {
        precond.solve(a, &r, &mut z)?;
        precond.trans_solve(a, &r_tilde, &mut z_tilde)?;
        let rho = dot(&z, &r_tilde);
        if rho == 0.0 {
            iter.fail(ERROR_BREAKDOWN, "bicg breakdown: rho = 0");
            break;
        }

        if iter.first() {
            p.copy_from_slice(&z);
            p_tilde.copy_from_slice(&z_tilde);
        } else {
            let beta = rho / rho_prev;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
                p_tilde[i] = z_tilde[i] + beta * p_tilde[i];
            }
        }

        a.apply(Transpose::NoTrans, &p, &mut q)?;
        a.apply(Transpose::Trans, &p_tilde, &mut q_tilde)?;
        let delta = dot(&p_tilde, &q);
        if delta == 0.0 {
            iter.fail(ERROR_BREAKDOWN, "bicg breakdown: delta = 0");
            break;
        }
        let alpha = rho / delta;
        axpy(alpha, &p, x);
        axpy(-alpha, &q, &mut r);
        axpy(-alpha, &q_tilde, &mut r_tilde);

        rho_prev = rho;
        iter.increment();
    }

    Ok(finish(iter, "bicg"))
}

/// Right-preconditioned BiCGSTAB.
pub fn bicgstab(
    a: &dyn LinearOperator,
    x: &mut [f64],
    b: &[f64],
    precond: &mut dyn Preconditioner,
    iter: &mut Iteration,
) -> Result<SolveReport> {
    let mut r = start(a, x, b, iter, "bicgstab")?;
    iter.init(b);
    let n = r.len();
    let r_tilde = r.clone();
    let mut p = vec![0.0; n];
    let mut v = vec![0.0; n];
    let mut s = vec![0.0; n];
    let mut t = vec![0.0; n];
    let mut p_hat = vec![0.0; n];
    let mut s_hat = vec![0.0; n];
    let (mut rho_prev, mut alpha, mut omega) = (1.0, 1.0, 1.0);

    while !iter.finished(&r) {
        let rho = dot(&r_tilde, &r);
        if rho == 0.0 {
            iter.fail(ERROR_BREAKDOWN, "bicgstab breakdown: rho = 0");
            break;
        }

        if iter.first() {
            p.copy_from_slice(&r);
        } else {
            if omega == 0.0 {
                iter.fail(ERROR_BREAKDOWN, "bicgstab breakdown: omega = 0");
                break;
            }
            let beta = (rho / rho_prev) * (alpha / omega);
            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
            }
        }

        precond.solve(a, &p, &mut p_hat)?;
        a.apply(Transpose::NoTrans, &p_hat, &mut v)?;
        let denom = dot(&r_tilde, &v);
        if denom == 0.0 {
            iter.fail(ERROR_BREAKDOWN, "bicgstab breakdown: r~'v = 0");
            break;
        }
        alpha = rho / denom;
        for i in 0..n {
            s[i] = r[i] - alpha * v[i];
        }

        // Half step already converged
        if iter.finished(&s) {
            axpy(alpha, &p_hat, x);
            r.copy_from_slice(&s);
            iter.increment();
            break;
        }

        precond.solve(a, &s, &mut s_hat)?;
        a.apply(Transpose::NoTrans, &s_hat, &mut t)?;
        let tt = dot(&t, &t);
        omega = if tt == 0.0 { 0.0 } else { dot(&t, &s) / tt };

        axpy(alpha, &p_hat, x);
        axpy(omega, &s_hat, x);
        for i in 0..n {
            r[i] = s[i] - omega * t[i];
        }

        rho_prev = rho;
        iter.increment();
    }

    Ok(finish(iter, "bicgstab"))
}

/// Plane rotation `(c, s)` zeroing `b` in `(a, b)`.
fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        (1.0, 0.0)
    } else if b.abs() > a.abs() {
        let t = a / b;
        let s = 1.0 / (1.0 + t * t).sqrt();
        (t * s, s)
    } else {
        let t = b / a;
        let c = 1.0 / (1.0 + t * t).sqrt();
        (c, t * c)
    }
}

/// Left-preconditioned GMRES, restarted every `iter.restart()` iterations.
///
/// Residuals are measured on the preconditioned system `M⁻¹ A x = M⁻¹ b`.
pub fn gmres(
    a: &dyn LinearOperator,
    x: &mut [f64],
    b: &[f64],
    precond: &mut dyn Preconditioner,
    iter: &mut Iteration,
) -> Result<SolveReport> {
    start(a, x, b, iter, "gmres")?;
    let n = b.len();
    let m = iter.restart().max(1);

    let mut w = vec![0.0; n];
    precond.solve(a, b, &mut w)?;
    iter.init(&w);

    let mut t = vec![0.0; n];
    let mut r = vec![0.0; n];
    // Hessenberg matrix, column-major by Arnoldi step: h[k][i] = H(i, k)
    let mut h = vec![vec![0.0; m + 1]; m];
    let mut cs = vec![0.0; m];
    let mut sn = vec![0.0; m];
    let mut g = vec![0.0; m + 1];
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(m + 1);

    loop {
        // r = M⁻¹ (b - A x)
        a.apply(Transpose::NoTrans, x, &mut t)?;
        for (ti, bi) in t.iter_mut().zip(b) {
            *ti = bi - *ti;
        }
        precond.solve(a, &t, &mut r)?;
        let beta = norm2(&r);
        if iter.finished_norm(beta) {
            break;
        }

        basis.clear();
        basis.push(r.iter().map(|ri| ri / beta).collect());
        g.fill(0.0);
        g[0] = beta;

        let mut k = 0;
        let mut done = false;
        while k < m {
            a.apply(Transpose::NoTrans, &basis[k], &mut t)?;
            precond.solve(a, &t, &mut w)?;

            // Modified Gram-Schmidt
            let col = &mut h[k];
            for (j, v) in basis.iter().enumerate() {
                col[j] = dot(&w, v);
                axpy(-col[j], v, &mut w);
            }
            col[k + 1] = norm2(&w);

            for j in 0..k {
                let tmp = cs[j] * col[j] + sn[j] * col[j + 1];
                col[j + 1] = -sn[j] * col[j] + cs[j] * col[j + 1];
                col[j] = tmp;
            }
            let (c, s) = givens(col[k], col[k + 1]);
            cs[k] = c;
            sn[k] = s;
            col[k] = c * col[k] + s * col[k + 1];
            let subdiagonal = col[k + 1];
            col[k + 1] = 0.0;
            g[k + 1] = -s * g[k];
            g[k] *= c;

            if col[k] == 0.0 {
                iter.fail(ERROR_BREAKDOWN, "gmres breakdown: singular Hessenberg matrix");
                done = true;
                break;
            }
            if subdiagonal != 0.0 {
                basis.push(w.iter().map(|wi| wi / subdiagonal).collect());
            }

            k += 1;
            iter.increment();
            if iter.finished_norm(g[k].abs()) || subdiagonal == 0.0 {
                done = iter.state().is_terminal() || subdiagonal == 0.0;
                break;
            }
        }

        // x += V y with H y = g
        let mut y = g[..k].to_vec();
        for i in (0..k).rev() {
            for j in (i + 1)..k {
                y[i] -= h[j][i] * y[j];
            }
            y[i] /= h[i][i];
        }
        for (yi, v) in y.iter().zip(&basis) {
            axpy(*yi, v, x);
        }

        if done {
            if !iter.state().is_terminal() {
                // Invariant subspace found: the update is exact
                iter.finished_norm(0.0);
            }
            break;
        }
    }

    Ok(finish(iter, "gmres"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterative::{IdentityPreconditioner, IterationState};
    use crate::matrix::CsrMatrix;
    use approx::assert_relative_eq;

    /// 2D Laplacian on a `k x k` grid.
    fn laplacian_2d(k: usize) -> CsrMatrix {
        let n = k * k;
        let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
        for i in 0..k {
            for j in 0..k {
                let p = i * k + j;
                rows.push(p);
                cols.push(p);
                vals.push(4.0);
                let mut link = |q: usize| {
                    rows.push(p);
                    cols.push(q);
                    vals.push(-1.0);
                };
                if i > 0 {
                    link(p - k);
                }
                if i + 1 < k {
                    link(p + k);
                }
                if j > 0 {
                    link(p - 1);
                }
                if j + 1 < k {
                    link(p + 1);
                }
            }
        }
        CsrMatrix::from_coordinates(n, n, &rows, &cols, &vals).unwrap()
    }

    /// Convection-diffusion style unsymmetric tridiagonal matrix.
    fn convection(n: usize) -> CsrMatrix {
        let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            vals.push(3.0);
            if i > 0 {
                rows.push(i);
                cols.push(i - 1);
                vals.push(-1.5);
            }
            if i + 1 < n {
                rows.push(i);
                cols.push(i + 1);
                vals.push(-0.5);
            }
        }
        CsrMatrix::from_coordinates(n, n, &rows, &cols, &vals).unwrap()
    }

    type Method = fn(
        &dyn LinearOperator,
        &mut [f64],
        &[f64],
        &mut dyn Preconditioner,
        &mut Iteration,
    ) -> Result<SolveReport>;

    fn check_solution(a: &CsrMatrix, method: Method) {
        let n = a.nrows();
        let x_true: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
        let b = a.mul_vec(&x_true).unwrap();
        let mut x = vec![0.0; n];
        let mut iter = Iteration::new(500, 1e-10).with_restart(30);
        iter.hide_messages();
        let report = method(a, &mut x, &b, &mut IdentityPreconditioner, &mut iter).unwrap();
        assert!(report.is_converged(), "{}", report);
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_cg_on_laplacian() {
        check_solution(&laplacian_2d(6), cg);
    }

    #[test]
    fn test_unsymmetric_methods() {
        let a = convection(40);
        check_solution(&a, bicg);
        check_solution(&a, bicgstab);
        check_solution(&a, gmres);
    }

    #[test]
    fn test_tight_tolerance_hits_max_iterations() {
        let a = laplacian_2d(8);
        let b = vec![1.0; 64];
        let mut x = vec![0.0; 64];
        let mut iter = Iteration::new(3, 1e-14);
        iter.hide_messages();
        let report = cg(&a, &mut x, &b, &mut IdentityPreconditioner, &mut iter).unwrap();
        assert_eq!(report.state, IterationState::MaxIterations);
        assert_eq!(report.iterations, 3);
        assert!(iter.check().is_err());
    }

    #[test]
    fn test_nonzero_initial_guess() {
        let a = convection(10);
        let x_true = vec![1.0; 10];
        let b = a.mul_vec(&x_true).unwrap();
        let mut x = x_true.clone();
        let mut iter = Iteration::default();
        iter.set_init_guess(false);
        let report = bicgstab(&a, &mut x, &b, &mut IdentityPreconditioner, &mut iter).unwrap();
        assert!(report.is_converged());
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = convection(4);
        let mut x = vec![0.0; 3];
        let mut iter = Iteration::default();
        let err = gmres(&a, &mut x, &[1.0; 4], &mut IdentityPreconditioner, &mut iter).unwrap_err();
        assert!(matches!(err, SolverError::WrongDim { .. }));
    }

    #[test]
    fn test_zero_rhs_converges_immediately() {
        let a = laplacian_2d(3);
        let mut x = vec![1.0; 9];
        let mut iter = Iteration::default();
        let report = cg(&a, &mut x, &[0.0; 9], &mut IdentityPreconditioner, &mut iter).unwrap();
        assert!(report.is_converged());
        assert!(x.iter().all(|&v| v == 0.0));
    }
}
