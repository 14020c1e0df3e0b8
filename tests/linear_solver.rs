use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sparsecode::{
    iterative_ridge, CgOptions, DiagnosticEvent, IterativeRidgeOptions, SolveStatus, StepPolicy,
    SubproblemSolver,
};

/// A well-conditioned sparse-coding problem with a known generating code.
fn random_problem(
    seed: u64,
    batch: usize,
    inp_dim: usize,
    code_dim: usize,
) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let weight = Array2::from_shape_fn((inp_dim, code_dim), |_| rng.random_range(-1.0..1.0));
    let z_true = Array2::from_shape_fn((batch, code_dim), |_| {
        if rng.random::<f64>() < 0.4 {
            rng.random_range(-2.0..2.0)
        } else {
            0.0
        }
    });
    let x = z_true.dot(&weight.t());
    let z0 = Array2::zeros((batch, code_dim));
    (z0, x, weight)
}

#[test]
fn ols_boundary_recovers_least_squares_in_one_ridge_step() {
    let weight = array![[1.0, 0.0], [0.0, 1.0]];
    let x = array![[3.0, 4.0]];
    let z0 = array![[0.0, 0.0]];
    let options = IterativeRidgeOptions {
        alpha: 0.0,
        tikhonov: 0.0,
        line_search: false,
        ..Default::default()
    };

    let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
    assert_eq!(solution.status, SolveStatus::Converged);
    // The first ridge step lands on the least-squares solution; the second
    // only confirms that the update has vanished.
    assert!(solution.iterations <= 2);
    assert_abs_diff_eq!(solution.codes[[0, 0]], 3.0, epsilon = 1e-8);
    assert_abs_diff_eq!(solution.codes[[0, 1]], 4.0, epsilon = 1e-8);
}

#[test]
fn line_search_objective_never_increases() {
    let (z0, x, weight) = random_problem(7, 4, 12, 6);
    let options = IterativeRidgeOptions {
        alpha: 0.1,
        line_search: true,
        record_losses: true,
        max_iter: 30,
        ..Default::default()
    };

    let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
    let losses = solution.losses.expect("losses were requested");
    assert_eq!(losses.len(), solution.iterations + 1);
    for pair in losses.windows(2) {
        assert!(
            pair[1] <= pair[0] + 1e-7 * pair[0].abs().max(1.0),
            "objective increased: {} -> {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn halving_the_tolerance_never_takes_fewer_iterations() {
    let (z0, x, weight) = random_problem(11, 3, 10, 5);
    let base = IterativeRidgeOptions {
        alpha: 0.05,
        line_search: false,
        max_iter: 200,
        ..Default::default()
    };

    let loose = iterative_ridge(
        z0.view(),
        x.view(),
        weight.view(),
        &IterativeRidgeOptions {
            tol: 1e-4,
            ..base.clone()
        },
    );
    let tight = iterative_ridge(
        z0.view(),
        x.view(),
        weight.view(),
        &IterativeRidgeOptions {
            tol: 5e-5,
            ..base
        },
    );
    assert_eq!(loose.status, SolveStatus::Converged);
    assert_eq!(tight.status, SolveStatus::Converged);
    assert!(
        tight.iterations >= loose.iterations,
        "tightening tol reduced iterations: {} < {}",
        tight.iterations,
        loose.iterations
    );
}

#[test]
fn resolving_a_converged_iterate_leaves_it_unchanged() {
    let (z0, x, weight) = random_problem(23, 2, 8, 4);
    let options = IterativeRidgeOptions {
        alpha: 0.2,
        max_iter: 200,
        ..Default::default()
    };

    let first = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
    assert_eq!(first.status, SolveStatus::Converged);

    let second = iterative_ridge(
        first.codes.view(),
        x.view(),
        weight.view(),
        &IterativeRidgeOptions {
            max_iter: 1,
            ..options
        },
    );
    assert_eq!(second.status, SolveStatus::Converged);
    let max_shift = first
        .codes
        .iter()
        .zip(second.codes.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);
    assert!(max_shift < 1e-4, "converged iterate moved by {max_shift}");
}

#[test]
fn zero_initialized_codes_produce_no_nan_reweighting() {
    // Every z0 entry sits below eps, so the first subproblem must be a pure
    // (unweighted) ridge solve rather than a division by zero.
    let (z0, x, weight) = random_problem(31, 3, 12, 6);
    let options = IterativeRidgeOptions {
        alpha: 5.0,
        max_iter: 50,
        ..Default::default()
    };

    let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
    assert_ne!(solution.status, SolveStatus::Diverged);
    assert!(solution.codes.iter().all(|v| v.is_finite()));
    assert!(solution.fun.is_finite());
}

#[test]
fn singular_ridge_system_signals_divergence() {
    // Rank-deficient dictionary with no tikhonov term: the Gram matrix is
    // exactly singular and the solve must report divergence, never a
    // NaN-valued "success".
    let weight = array![[1.0, 1.0], [1.0, 1.0]];
    let x = array![[1.0, 2.0]];
    let z0 = array![[0.3, -0.7]];
    let options = IterativeRidgeOptions {
        alpha: 0.0,
        tikhonov: 0.0,
        line_search: false,
        ..Default::default()
    };

    let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
    assert_eq!(solution.status, SolveStatus::Diverged);
    assert!(!solution.status.success());
    assert!(!solution.message.is_empty());
}

#[test]
fn conjugate_gradient_path_matches_cholesky_path() {
    let (z0, x, weight) = random_problem(43, 3, 10, 4);
    let direct = IterativeRidgeOptions {
        alpha: 0.2,
        max_iter: 60,
        ..Default::default()
    };
    let iterative = IterativeRidgeOptions {
        subproblem: SubproblemSolver::ConjugateGradient(CgOptions {
            max_iter: 50,
            tol: 1e-12,
        }),
        ..direct.clone()
    };

    let a = iterative_ridge(z0.view(), x.view(), weight.view(), &direct);
    let b = iterative_ridge(z0.view(), x.view(), weight.view(), &iterative);
    assert_eq!(a.status, SolveStatus::Converged);
    assert_eq!(b.status, SolveStatus::Converged);
    for (lhs, rhs) in a.codes.iter().zip(b.codes.iter()) {
        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-3);
    }
}

#[test]
fn per_sample_steps_are_at_least_as_good_after_one_iteration() {
    let (z0, x, weight) = random_problem(59, 4, 12, 6);
    let shared = IterativeRidgeOptions {
        alpha: 0.3,
        tol: 0.0,
        max_iter: 1,
        line_search: true,
        step_policy: StepPolicy::Shared,
        ..Default::default()
    };
    let per_sample = IterativeRidgeOptions {
        step_policy: StepPolicy::PerSample,
        ..shared.clone()
    };

    let a = iterative_ridge(z0.view(), x.view(), weight.view(), &shared);
    let b = iterative_ridge(z0.view(), x.view(), weight.view(), &per_sample);
    // Minimizing each sample's own step cannot do worse in total than one
    // shared step, up to line-search tolerance.
    assert!(
        b.fun <= a.fun + 1e-6 * a.fun.abs().max(1.0),
        "per-sample {} vs shared {}",
        b.fun,
        a.fun
    );
}

#[test]
fn exhausted_budget_is_a_soft_failure_with_an_event() {
    let (z0, x, weight) = random_problem(71, 2, 10, 5);
    let options = IterativeRidgeOptions {
        alpha: 0.5,
        tol: 1e-14,
        max_iter: 2,
        ..Default::default()
    };

    let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
    assert_eq!(solution.status, SolveStatus::MaxIterReached);
    assert_eq!(solution.iterations, 2);
    assert!(solution.codes.iter().all(|v| v.is_finite()));
    assert!(solution
        .events
        .iter()
        .any(|e| matches!(e, DiagnosticEvent::IterationCapReached { max_iter: 2 })));
}
