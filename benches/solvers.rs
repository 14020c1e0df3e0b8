use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sparsecode::{
    iterative_ridge, iterative_ridge_bfgs, CgOptions, IterativeRidgeOptions, RidgeBfgsOptions,
    SubproblemSolver,
};
use std::hint::black_box;
use std::time::Duration;

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

fn bench_linear_cholesky(c: &mut Criterion) {
    let (z0, x, weight) = random_problem(1, 8, 64, 32);
    let options = IterativeRidgeOptions {
        alpha: 0.1,
        max_iter: 20,
        ..Default::default()
    };
    c.bench_function("linear_cholesky", |b| {
        b.iter(|| {
            let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
            black_box(solution.fun);
        });
    });
}

fn bench_linear_conjugate_gradient(c: &mut Criterion) {
    let (z0, x, weight) = random_problem(1, 8, 64, 32);
    let options = IterativeRidgeOptions {
        alpha: 0.1,
        max_iter: 20,
        subproblem: SubproblemSolver::ConjugateGradient(CgOptions::default()),
        ..Default::default()
    };
    c.bench_function("linear_conjugate_gradient", |b| {
        b.iter(|| {
            let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
            black_box(solution.fun);
        });
    });
}

fn bench_bfgs_quadratic(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let centers = Array2::from_shape_fn((8, 16), |_| rng.random_range(-2.0..2.0));
    let x0 = Array2::<f64>::zeros((8, 16));
    let options = RidgeBfgsOptions {
        alpha: 0.1,
        max_iter: Some(30),
        ..Default::default()
    };
    c.bench_function("bfgs_quadratic", |b| {
        b.iter(|| {
            let objective = |x: &Array2<f64>| {
                let residual = x - &centers;
                let value = 0.5 * residual.iter().map(|v| v * v).sum::<f64>();
                (value, residual)
            };
            let solution = iterative_ridge_bfgs(objective, x0.view(), &options);
            black_box(solution.fun);
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(2));
    targets =
        bench_linear_cholesky,
        bench_linear_conjugate_gradient,
        bench_bfgs_quadratic
}
criterion_main!(benches);
