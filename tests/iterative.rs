use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sparsolve::iterative::{self, build_preconditioner, ERROR_MAX_ITERATIONS};
use sparsolve::{
    CsrMatrix, DirectSolverConfig, IdentityPreconditioner, Iteration, IterationState,
    IterativeMethod, LinearOperator, PreconditionerKind, SolverError, Transpose, TripletMatrix,
};

/// Random symmetric matrix made positive definite by diagonal dominance.
fn random_spd(n: usize, pairs: usize, seed: u64) -> CsrMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = TripletMatrix::new(n, n);
    let mut row_sum = vec![0.0; n];
    for _ in 0..pairs {
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        if i == j {
            continue;
        }
        let v = -rng.gen_range(0.1..1.0);
        t.add_interaction(i, j, v).unwrap();
        t.add_interaction(j, i, v).unwrap();
        row_sum[i] -= v;
        row_sum[j] -= v;
    }
    for (i, s) in row_sum.iter().enumerate() {
        t.add_interaction(i, i, s + 1.0).unwrap();
    }
    t.set_symmetric(true);
    CsrMatrix::from(t)
}

/// Random unsymmetric matrix with a dominant diagonal.
fn random_unsymmetric(n: usize, nnz: usize, seed: u64) -> CsrMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = TripletMatrix::new(n, n);
    t.fill_rand(nnz, &mut rng);
    for i in 0..n {
        t.add_interaction(i, i, 0.5 * n as f64).unwrap();
    }
    CsrMatrix::from(t)
}

fn relative_residual(a: &CsrMatrix, x: &[f64], b: &[f64]) -> f64 {
    let mut r = vec![0.0; b.len()];
    a.apply(Transpose::NoTrans, x, &mut r).unwrap();
    let num: f64 = r.iter().zip(b).map(|(ri, bi)| (bi - ri).powi(2)).sum::<f64>().sqrt();
    let den: f64 = b.iter().map(|bi| bi * bi).sum::<f64>().sqrt();
    num / den
}

fn rhs(a: &CsrMatrix) -> Vec<f64> {
    let x: Vec<f64> = (0..a.ncols()).map(|k| 1.0 + (k % 5) as f64).collect();
    a.mul_vec(&x).unwrap()
}

proptest! {
    #[test]
    fn prop_cg_converges_on_spd(n in 5usize..40, density in 1usize..4, seed in any::<u64>()) {
        let a = random_spd(n, density * n, seed);
        let b = rhs(&a);
        let mut x = vec![0.0; n];
        let mut iter = Iteration::new(10 * n, 1e-10);
        let report = iterative::cg(&a, &mut x, &b, &mut IdentityPreconditioner, &mut iter).unwrap();
        prop_assert!(report.is_converged(), "{}", report);
        prop_assert!(relative_residual(&a, &x, &b) < 1e-8);
    }

    #[test]
    fn prop_init_then_finished_with_loose_tolerance(
        r in prop::collection::vec(-1e3f64..1e3, 1..20),
        tolerance in 1.5f64..10.0,
    ) {
        let mut iter = Iteration::new(10, tolerance);
        iter.init(&r);
        prop_assert!(iter.finished(&r));
        prop_assert_eq!(iter.state(), IterationState::Converged);
    }
}

#[test]
fn test_unreachable_tolerance_hits_iteration_limit() {
    let a = random_unsymmetric(50, 300, 1);
    let b = rhs(&a);
    let mut x = vec![0.0; 50];
    let mut iter = Iteration::new(3, 1e-14).with_method(IterativeMethod::Gmres).with_restart(2);
    let report = iterative::solve(&a, &mut x, &b, &mut IdentityPreconditioner, &mut iter).unwrap();
    assert_eq!(report.state, IterationState::MaxIterations);
    assert_eq!(report.error_code, ERROR_MAX_ITERATIONS);
    assert_eq!(report.iterations, 3);
    assert!(matches!(
        iter.check(),
        Err(SolverError::ConvergenceFailure { iterations: 3, .. })
    ));
}

#[test]
fn test_unsymmetric_methods_with_every_preconditioner() {
    let n = 60;
    let a = random_unsymmetric(n, 4 * n, 2);
    let b = rhs(&a);
    let config = DirectSolverConfig::new();
    for kind in [
        PreconditionerKind::Identity,
        PreconditionerKind::Ilut,
        PreconditionerKind::Direct,
    ] {
        for method in [
            IterativeMethod::BiCg,
            IterativeMethod::BiCgStab,
            IterativeMethod::Gmres,
        ] {
            let mut precond = build_preconditioner(kind, &a, &config).unwrap();
            let mut x = vec![0.0; n];
            let mut iter = Iteration::new(500, 1e-10)
                .with_method(method)
                .with_restart(30)
                .with_preconditioner(kind);
            let report = iterative::solve(&a, &mut x, &b, precond.as_mut(), &mut iter).unwrap();
            assert!(report.is_converged(), "{} with {}: {}", method, kind, report);
            assert!(
                relative_residual(&a, &x, &b) < 1e-7,
                "{} with {}",
                method,
                kind
            );
        }
    }
}

#[test]
fn test_ilut_preconditioning_reduces_cg_iterations() {
    let n = 80;
    let a = random_spd(n, 3 * n, 3);
    let b = rhs(&a);

    let mut x = vec![0.0; n];
    let mut plain = Iteration::new(1000, 1e-10);
    let plain = iterative::cg(&a, &mut x, &b, &mut IdentityPreconditioner, &mut plain).unwrap();

    let mut precond = build_preconditioner(
        PreconditionerKind::Ilut,
        &a,
        &DirectSolverConfig::new().with_threshold(1e-4),
    )
    .unwrap();
    let mut x = vec![0.0; n];
    let mut iter = Iteration::new(1000, 1e-10);
    let ilut = iterative::cg(&a, &mut x, &b, precond.as_mut(), &mut iter).unwrap();

    assert!(plain.is_converged() && ilut.is_converged());
    assert!(ilut.iterations <= plain.iterations);
    assert!(relative_residual(&a, &x, &b) < 1e-8);
}

#[test]
fn test_gmres_with_direct_preconditioner_takes_one_iteration() {
    let n = 40;
    let a = random_unsymmetric(n, 200, 4);
    let b = rhs(&a);
    let config = DirectSolverConfig::new();
    let mut precond = build_preconditioner(PreconditionerKind::Direct, &a, &config).unwrap();
    let mut x = vec![0.0; n];
    let mut iter = Iteration::new(50, 1e-10).with_method(IterativeMethod::Gmres);
    let report = iterative::solve(&a, &mut x, &b, precond.as_mut(), &mut iter).unwrap();
    assert!(report.is_converged());
    assert_eq!(report.iterations, 1);
    assert!(relative_residual(&a, &x, &b) < 1e-10);
}

#[test]
fn test_inherited_controller_shares_settings() {
    let outer = Iteration::new(77, 1e-6)
        .with_method(IterativeMethod::BiCgStab)
        .with_preconditioner(PreconditionerKind::Ilut)
        .with_restart(12);
    let inner = Iteration::inherit(&outer);
    assert_eq!(inner.max_iterations(), 77);
    assert_eq!(inner.tolerance(), 1e-6);
    assert_eq!(inner.method(), IterativeMethod::BiCgStab);
    assert_eq!(inner.preconditioner(), PreconditionerKind::Ilut);
    assert_eq!(inner.restart(), 12);
    assert_eq!(inner.iteration(), 0);
}

#[test]
fn test_non_finite_rhs_fails_immediately() {
    let a = random_spd(5, 5, 5);
    let mut b = rhs(&a);
    b[2] = f64::NAN;
    let mut x = vec![0.0; 5];
    let mut iter = Iteration::new(10, 1e-8);
    let report = iterative::cg(&a, &mut x, &b, &mut IdentityPreconditioner, &mut iter).unwrap();
    assert_eq!(report.state, IterationState::Failed);
    assert!(iter.check().is_err());
}
