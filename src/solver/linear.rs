//! Iterated ridge regression for fixed-dictionary Lasso problems.
//!
//! Each outer iteration majorizes the L1 penalty at the current iterate by a
//! diagonal quadratic, solves the resulting ridge system for every sample in
//! the batch, and steps toward the subproblem solution (optionally with a
//! bounded line search). See section 2.5 of Schmidt (2005), "Least Squares
//! Optimization with L1-Norm Regularization."

use crate::diagnostics::{record, DiagnosticEvent};
use crate::linalg::conjgrad::conjgrad;
use crate::linalg::faer_ndarray::{batch_solve_spd, fast_ab, fast_abt, gram};
use crate::solver::line_search::{minimize_scalar_bounded, ScalarSearchOptions};
use crate::solver::reweight;
use crate::types::{CgOptions, IterativeRidgeOptions, SolveStatus, StepPolicy, SubproblemSolver};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

/// Step lengths are searched over this fixed bracket.
const LINE_SEARCH_BOUNDS: (f64, f64) = (0.0, 10.0);

/// The Lasso objective for a fixed dictionary, as an explicit record so the
/// line-search evaluators carry no hidden solver state.
pub struct LassoObjective<'a> {
    /// Dictionary matrix, `[N, K]`.
    pub weight: ArrayView2<'a, f64>,
    /// Reconstruction targets, `[B, N]`.
    pub target: ArrayView2<'a, f64>,
    pub alpha: f64,
}

impl LassoObjective<'_> {
    /// Batch-summed objective `0.5·Σ‖zWᵗ − x‖² + α·Σ|z|`.
    pub fn value(&self, z: &Array2<f64>) -> f64 {
        let recon = fast_abt(z, &self.weight);
        let residual = &recon - &self.target;
        0.5 * residual.iter().map(|r| r * r).sum::<f64>()
            + self.alpha * z.iter().map(|v| v.abs()).sum::<f64>()
    }

    /// A single sample's term of the batch objective.
    pub fn sample_value(&self, sample: usize, code: ArrayView1<'_, f64>) -> f64 {
        let recon = self.weight.dot(&code);
        let residual = &recon - &self.target.index_axis(Axis(0), sample);
        0.5 * residual.iter().map(|r| r * r).sum::<f64>()
            + self.alpha * code.iter().map(|v| v.abs()).sum::<f64>()
    }
}

/// Outcome of [`iterative_ridge`].
#[derive(Debug, Clone)]
pub struct RidgeSolution {
    /// Final code vectors, `[B, K]`.
    pub codes: Array2<f64>,
    pub status: SolveStatus,
    pub message: String,
    /// Final value of the batch-summed objective.
    pub fun: f64,
    pub iterations: usize,
    /// Objective evaluations performed (per-sample terms count as one each
    /// under the per-sample step policy).
    pub num_evals: usize,
    /// Objective value after every iteration, when requested.
    pub losses: Option<Vec<f64>>,
    pub events: Vec<DiagnosticEvent>,
}

enum SubproblemPath {
    Direct { gram: Array2<f64> },
    Iterative { cg: CgOptions },
}

/// Solve a batch of Lasso problems `argmin_z 0.5‖zWᵗ − x‖² + α‖z‖₁` by
/// iterated reweighted ridge regression.
///
/// * `z0` — initial code vectors, `[B, K]`
/// * `x` — reconstruction targets, `[B, N]`
/// * `weight` — dictionary matrix, `[N, K]`, shared across the batch
///
/// Every outcome is reported through [`RidgeSolution::status`]; nothing here
/// returns an error. Shape mismatches surface as panics from the underlying
/// array operations.
pub fn iterative_ridge<'a>(
    z0: ArrayView2<'_, f64>,
    x: ArrayView2<'a, f64>,
    weight: ArrayView2<'a, f64>,
    options: &IterativeRidgeOptions,
) -> RidgeSolution {
    let (batch, code_dim) = z0.dim();
    let alpha = options.alpha;
    let tikhonov = options.tikhonov;
    // The configured tolerance is an average per element.
    let tol = options.tol * z0.len() as f64;

    let objective = LassoObjective {
        weight,
        target: x,
        alpha,
    };

    let mut z = z0.to_owned();
    let mut fval = objective.value(&z);
    let mut num_evals = 1_usize;
    log::debug!("initial objective: {fval:.6e}");
    let mut losses = options.record_losses.then(|| vec![fval]);
    let mut events = Vec::new();

    // Right-hand side of the normal equations, constant across iterations.
    let rhs = fast_ab(&x, &weight);

    let path = match &options.subproblem {
        SubproblemSolver::Cholesky => SubproblemPath::Direct {
            gram: gram(&weight),
        },
        SubproblemSolver::ConjugateGradient(cg) => SubproblemPath::Iterative { cg: cg.clone() },
    };

    let mut status = SolveStatus::Running;
    let mut message = String::new();
    let mut iterations = 0_usize;

    for k in 1..=options.max_iter {
        iterations = k;

        let zmag_inv = reweight(&z, options.eps);

        let z_sol = match &path {
            SubproblemPath::Direct { gram } => {
                let mut systems = Array3::<f64>::zeros((batch, code_dim, code_dim));
                for b in 0..batch {
                    let mut system = systems.index_axis_mut(Axis(0), b);
                    system.assign(gram);
                    for j in 0..code_dim {
                        system[[j, j]] += 2.0 * alpha * zmag_inv[[b, j]] + tikhonov;
                    }
                }
                match batch_solve_spd(&systems, &rhs) {
                    Ok(solution) => solution,
                    Err(err) => {
                        log::debug!("ridge subproblem solve error: {err}");
                        record(
                            &mut events,
                            DiagnosticEvent::FactorizationFailed { iteration: k },
                        );
                        status = SolveStatus::Diverged;
                        message = "ridge system factorization failed".to_string();
                        break;
                    }
                }
            }
            SubproblemPath::Iterative { cg } => {
                let matvec = |v: &Array2<f64>| {
                    // (vWᵗ)W plus the diagonal ridge term, without forming A.
                    let mut av = fast_ab(&fast_abt(v, &weight), &weight);
                    ndarray::azip!((av in &mut av, &vj in v, &zi in &zmag_inv) {
                        *av += (2.0 * alpha * zi + tikhonov) * vj;
                    });
                    av
                };
                conjgrad(&rhs, matvec, cg)
            }
        };

        let direction = &z_sol - &z;

        let update = if options.line_search {
            match options.step_policy {
                StepPolicy::Shared => {
                    let search = minimize_scalar_bounded(
                        |t| objective.value(&(&z + &(&direction * t))),
                        LINE_SEARCH_BOUNDS,
                        &ScalarSearchOptions::default(),
                    );
                    num_evals += search.num_evals;
                    fval = search.f_min;
                    let update = &direction * search.t;
                    z += &update;
                    update
                }
                StepPolicy::PerSample => {
                    let mut update = direction.clone();
                    for b in 0..batch {
                        let code = z.index_axis(Axis(0), b);
                        let dir = direction.index_axis(Axis(0), b);
                        let search = minimize_scalar_bounded(
                            |t| {
                                let trial = &code + &(&dir * t);
                                objective.sample_value(b, trial.view())
                            },
                            LINE_SEARCH_BOUNDS,
                            &ScalarSearchOptions::default(),
                        );
                        num_evals += search.num_evals;
                        let mut row = update.index_axis_mut(Axis(0), b);
                        row *= search.t;
                    }
                    z += &update;
                    fval = objective.value(&z);
                    num_evals += 1;
                    update
                }
            }
        } else {
            // Full step straight to the subproblem solution.
            let update = direction;
            z = z_sol;
            fval = objective.value(&z);
            num_evals += 1;
            update
        };

        log::debug!("iter {k:3} - objective {fval:.6e}");
        if let Some(losses) = losses.as_mut() {
            losses.push(fval);
        }

        if update.iter().map(|v| v.abs()).sum::<f64>() <= tol {
            status = SolveStatus::Converged;
            message = "absolute change in the iterate is within tolerance".to_string();
            break;
        }
        if fval.is_nan() || update.iter().any(|v| v.is_nan()) {
            status = SolveStatus::Diverged;
            message = "NaN encountered in the objective or the update".to_string();
            break;
        }
    }

    if status == SolveStatus::Running {
        status = SolveStatus::MaxIterReached;
        message = "iteration budget exhausted before convergence".to_string();
        record(
            &mut events,
            DiagnosticEvent::IterationCapReached {
                max_iter: options.max_iter,
            },
        );
    }
    log::debug!("{message} ({iterations} iterations, objective {fval:.6e})");

    RidgeSolution {
        codes: z,
        status,
        message,
        fun: fval,
        iterations,
        num_evals,
        losses,
        events,
    }
}
