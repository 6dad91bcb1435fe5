use approx::assert_relative_eq;
use nalgebra::{dmatrix, dvector, DMatrix};

use super::test_helpers::{LinearProblem, MockCall, MockProblem, Rosenbrock};
use super::*;
use crate::options::{SubproblemMethod, TrUpdateStrategy};
use crate::problem::FnProblem;

const METHODS: [SubproblemMethod; 4] = [
    SubproblemMethod::Dogleg,
    SubproblemMethod::Aint,
    SubproblemMethod::MoreSorensen,
    SubproblemMethod::Dtrs,
];

fn linear() -> LinearProblem {
    LinearProblem {
        a: dmatrix![1., 0.; 0., 2.; 1., 1.],
        b: dvector![1., 2., 4.],
    }
}

#[test]
fn n_greater_than_m_evaluates_nothing() {
    let mut problem = MockProblem::new(linear());
    let mut x = DVector::zeros(3);
    let inform = NllsSolver::new().minimize(&mut x, 2, &mut problem);
    assert_eq!(inform.failure, Some(NllsError::NGtM { n: 3, m: 2 }));
    assert!(problem.calls().is_empty());
    assert_eq!(inform.f_eval, 0);
    assert_eq!(inform.iter, 0);
}

#[test]
fn zero_maxit_evaluates_nothing() {
    let mut problem = MockProblem::new(linear());
    let mut x = DVector::zeros(2);
    let solver = NllsSolver::with_options(NllsOptions::new().with_maxit(0));
    let inform = solver.minimize(&mut x, 3, &mut problem);
    assert_eq!(inform.failure, Some(NllsError::Maxits { maxit: 0 }));
    assert_eq!(inform.iter, 0);
    assert!(problem.calls().is_empty());
}

#[test]
#[cfg(target_pointer_width = "64")]
fn unallocatable_workspace_evaluates_nothing() {
    let mut problem = MockProblem::new(linear());
    let mut x = DVector::zeros(1);
    let inform = NllsSolver::new().minimize(&mut x, 1 << 60, &mut problem);
    assert_eq!(inform.failure, Some(NllsError::Allocation { bytes: 1 << 63 }));
    assert_eq!(inform.failure.as_ref().map(NllsError::code), Some(-6));
    assert!(problem.calls().is_empty());
}

#[test]
fn converged_at_start() {
    let mut problem = MockProblem::new(LinearProblem {
        a: dmatrix![1., 0.; 0., 2.; 1., 1.],
        b: dvector![1., 2., 2.],
    });
    let mut x = dvector![1., 1.];
    let inform = NllsSolver::new().minimize(&mut x, 3, &mut problem);
    assert!(inform.is_success());
    assert!(inform.convergence_normf);
    assert_eq!(inform.iter, 0);
    assert_eq!(inform.obj, 0.);
    assert_eq!(problem.calls(), [MockCall::Residuals, MockCall::Jacobian]);
}

#[test]
fn linear_problem_in_one_iteration() {
    for method in METHODS {
        let options = NllsOptions::new()
            .with_model(Model::GaussNewton)
            .with_method(method);
        let mut problem = MockProblem::new(linear());
        let mut x = DVector::zeros(2);
        let inform = NllsSolver::with_options(options).minimize(&mut x, 3, &mut problem);
        assert!(inform.is_success(), "{:?}: {}", method, inform.error_message());
        assert_eq!(inform.iter, 1);
        assert!(inform.convergence_normg);
        assert!(!inform.convergence_normf);
        assert_eq!(
            problem.calls(),
            [
                MockCall::Residuals,
                MockCall::Jacobian,
                MockCall::Residuals,
                MockCall::Jacobian
            ]
        );
        assert_relative_eq!(x, dvector![17. / 9., 11. / 9.], epsilon = 1e-10);
        // f = A x - b at the solution
        assert_relative_eq!(inform.obj, 0.5 * (144. / 81.), epsilon = 1e-10);
    }
}

#[test]
fn rank_deficient_jacobian() {
    // every row of J is (x_2, x_1), the minimizers form the curve x_1 x_2 = 3
    let c = [2., 3., 4.];
    for method in METHODS {
        let mut problem = FnProblem::new(
            |x: &DVector<f64>, f: &mut DVector<f64>| {
                for (fi, ci) in f.iter_mut().zip(&c) {
                    *fi = x[0] * x[1] - ci;
                }
                Ok(())
            },
            |x: &DVector<f64>, j: &mut DMatrix<f64>| {
                for i in 0..3 {
                    j[(i, 0)] = x[1];
                    j[(i, 1)] = x[0];
                }
                Ok(())
            },
        );
        let options = NllsOptions::new()
            .with_model(Model::GaussNewton)
            .with_method(method);
        let mut x = dvector![1., 2.];
        let inform = NllsSolver::with_options(options).minimize(&mut x, 3, &mut problem);
        assert!(inform.is_success(), "{:?}: {}", method, inform.error_message());
        assert_relative_eq!(x[0] * x[1], 3., epsilon = 1e-6);
        assert_relative_eq!(inform.obj, 1., epsilon = 1e-12);
        assert!(inform.f_eval <= 10, "{:?}: {} evaluations", method, inform.f_eval);
    }
}

#[test]
fn residual_failure_keeps_last_iterate() {
    let mut problem = MockProblem::new(Rosenbrock).failing_at(MockCall::Residuals, 1, 7);
    let mut x = dvector![-1.2, 1.];
    let inform = NllsSolver::new().minimize(&mut x, 2, &mut problem);
    assert_eq!(
        inform.failure,
        Some(NllsError::Evaluation {
            callback: Callback::Residuals,
            status: 7
        })
    );
    assert_eq!(x, dvector![-1.2, 1.]);
    assert_eq!(
        problem.calls(),
        [MockCall::Residuals, MockCall::Jacobian, MockCall::Residuals]
    );
    assert_eq!(inform.f_eval, 2);
}

#[test]
fn jacobian_failure() {
    let mut problem = MockProblem::new(Rosenbrock).failing_at(MockCall::Jacobian, 0, -3);
    let mut x = dvector![-1.2, 1.];
    let inform = NllsSolver::new().minimize(&mut x, 2, &mut problem);
    assert_eq!(
        inform.failure,
        Some(NllsError::Evaluation {
            callback: Callback::Jacobian,
            status: -3
        })
    );
    assert_eq!(problem.calls(), [MockCall::Residuals, MockCall::Jacobian]);
}

#[test]
fn hessian_failure() {
    let mut problem = MockProblem::new(Rosenbrock).failing_at(MockCall::Hessians, 0, 2);
    let mut x = dvector![-1.2, 1.];
    let options = NllsOptions::new()
        .with_model(Model::Newton)
        .with_exact_second_derivatives(true);
    let inform = NllsSolver::with_options(options).minimize(&mut x, 2, &mut problem);
    assert_eq!(
        inform.failure,
        Some(NllsError::Evaluation {
            callback: Callback::Hessians,
            status: 2
        })
    );
    assert_eq!(inform.h_eval, 1);
}

#[test]
fn rejected_steps_are_bounded() {
    let mut problem = MockProblem::new(FnProblem::new(
        |x: &DVector<f64>, f: &mut DVector<f64>| {
            f[0] = if x[0] == 0. { 1. } else { f64::INFINITY };
            Ok(())
        },
        |_x: &DVector<f64>, j: &mut DMatrix<f64>| {
            j[(0, 0)] = 1.;
            Ok(())
        },
    ));
    let mut x = dvector![0.];
    let solver = NllsSolver::with_options(NllsOptions::new().with_max_tr_reductions(3));
    let inform = solver.minimize(&mut x, 1, &mut problem);
    assert_eq!(
        inform.failure,
        Some(NllsError::MaxTrReductions { reductions: 4 })
    );
    assert_eq!(inform.f_eval, 5);
    assert_eq!(inform.iter, 0);
    assert_eq!(x, dvector![0.]);
    // every trial point differs from the start
    assert!(problem.params()[1..].iter().all(|p| p[0] != 0.));
}

#[test]
fn step_lost_in_rounding() {
    let mut problem = LinearProblem {
        a: dmatrix![1.],
        b: dvector![1e17 + 64.],
    };
    let mut x = dvector![1e17];
    let options = NllsOptions::new()
        .with_initial_radius(1.)
        .with_eta(0., 0., 0.9, 2.);
    let inform = NllsSolver::with_options(options).minimize(&mut x, 1, &mut problem);
    assert_eq!(inform.failure, Some(NllsError::XNoProgress));
    assert_eq!(x, dvector![1e17]);
}

#[test]
fn iteration_cap() {
    let mut x = dvector![-1.2, 1.];
    let solver = NllsSolver::with_options(NllsOptions::new().with_maxit(1));
    let inform = solver.minimize(&mut x, 2, &mut Rosenbrock);
    assert_eq!(inform.failure, Some(NllsError::Maxits { maxit: 1 }));
    assert_eq!(inform.iter, 1);
    assert!(inform.obj < 12.1);
    assert_ne!(x, dvector![-1.2, 1.]);
}

#[test]
fn exact_newton_counts_hessians() {
    let mut problem = MockProblem::new(Rosenbrock);
    let mut x = dvector![-1.2, 1.];
    let options = NllsOptions::new()
        .with_model(Model::Newton)
        .with_exact_second_derivatives(true);
    let inform = NllsSolver::with_options(options).minimize(&mut x, 2, &mut problem);
    assert!(inform.is_success(), "{}", inform.error_message());
    assert_relative_eq!(x, dvector![1., 1.], epsilon = 1e-4);
    assert_eq!(inform.h_eval, inform.iter + 1);
    assert_eq!(inform.g_eval, inform.iter + 1);
    assert_eq!(
        problem.calls()[..3],
        [MockCall::Residuals, MockCall::Jacobian, MockCall::Hessians]
    );
}

#[test]
fn history_is_monotone() {
    let mut x = dvector![-1.2, 1.];
    let solver = NllsSolver::with_options(NllsOptions::new().with_progress_vectors(true));
    let inform = solver.minimize(&mut x, 2, &mut Rosenbrock);
    assert!(inform.is_success(), "{}", inform.error_message());
    let history = inform.history.unwrap();
    assert_eq!(history.resvec.len(), inform.iter + 1);
    assert_eq!(history.gradvec.len(), inform.iter + 1);
    assert_eq!(history.largest_sv.len(), inform.iter + 1);
    assert!(history.resvec.windows(2).all(|w| w[1] < w[0]));
    assert!(history
        .largest_sv
        .iter()
        .zip(history.smallest_sv.iter())
        .all(|(s1, sn)| s1 >= sn));
}

#[test]
fn history_without_singular_values() {
    let mut x = dvector![-1.2, 1.];
    let options = NllsOptions::new()
        .with_progress_vectors(true)
        .with_calculate_svd_j(false);
    let inform = NllsSolver::with_options(options).minimize(&mut x, 2, &mut Rosenbrock);
    let history = inform.history.unwrap();
    assert!(!history.resvec.is_empty());
    assert!(history.largest_sv.is_empty());
}

#[test]
fn no_history_by_default() {
    let mut x = dvector![-1.2, 1.];
    let inform = NllsSolver::new().minimize(&mut x, 2, &mut Rosenbrock);
    assert!(inform.history.is_none());
}

#[test]
fn continuous_radius_update_converges() {
    let mut x = dvector![-1.2, 1.];
    let options = NllsOptions::new().with_tr_update_strategy(TrUpdateStrategy::Continuous);
    let inform = NllsSolver::with_options(options).minimize(&mut x, 2, &mut Rosenbrock);
    assert!(inform.is_success(), "{}", inform.error_message());
    assert_relative_eq!(x, dvector![1., 1.], epsilon = 1e-4);
}

#[test]
fn initial_radius_choices() {
    let mut w = Workspace::new(2, 2).unwrap();
    w.j = dmatrix![1., 3.; 2., 0.];
    w.norm_jf = 7.;
    assert_eq!(initial_radius(&NllsOptions::new(), &w), 100.);
    let options = NllsOptions::new().with_initial_radius(-1.);
    assert_eq!(initial_radius(&options, &w), 7.);
    // columns have squared norms 5 and 9
    let options = NllsOptions::new().with_relative_radius(0.5);
    assert_eq!(initial_radius(&options, &w), 4.5);
}

#[test]
fn convergence_flags() {
    let options = NllsOptions::new().with_stop_f(1e-3, 0.).with_stop_g(0., 0.1);
    let mut w = Workspace::new(1, 1).unwrap();
    w.norm_f0 = 1.;
    w.norm_jf0 = 10.;

    let mut inform = NllsInform::default();
    w.norm_f = 0.5;
    w.norm_jf = 2.;
    assert!(!test_convergence(&options, &w, &mut inform));

    w.norm_jf = 1.;
    assert!(test_convergence(&options, &w, &mut inform));
    assert!(inform.convergence_normg);
    assert!(!inform.convergence_normf);

    let mut inform = NllsInform::default();
    w.norm_f = 1e-4;
    w.norm_jf = 5.;
    assert!(test_convergence(&options, &w, &mut inform));
    assert!(inform.convergence_normf);
    assert!(!inform.convergence_normg);
}
