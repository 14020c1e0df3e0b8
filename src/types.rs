use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Terminal (and in-flight) state of a solver run.
///
/// `Running` only appears while a solve is in progress; every returned
/// solution carries one of the three terminal variants. Callers must branch
/// on this: none of the outcomes are surfaced as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Running,
    /// Update magnitude (linear) or gradient norm (nonlinear) within tolerance.
    Converged,
    /// Objective, gradient, or iterate became non-finite; the iterate at the
    /// point of divergence is still returned for inspection.
    Diverged,
    /// Iteration budget exhausted. A soft failure: the last iterate is
    /// returned together with a warning-tagged status.
    MaxIterReached,
}

impl SolveStatus {
    pub fn success(&self) -> bool {
        matches!(self, SolveStatus::Converged)
    }
}

/// How a line-searched (or scaled) step length is applied across the batch.
///
/// `Shared` couples all samples through a single scalar step, trading
/// per-sample optimality for one search over the batch-summed objective.
/// `PerSample` keeps every problem's step independent where the solver can
/// evaluate per-sample objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPolicy {
    Shared,
    PerSample,
}

/// What to do with a sample whose BFGS curvature pair `(s, y)` is
/// near-singular (`|y·s|` below threshold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurvaturePolicy {
    /// Substitute a large fallback curvature scale and update anyway.
    Fallback,
    /// Leave the sample's curvature approximation untouched this iteration.
    Skip,
}

/// Per-sample audit tag for the BFGS curvature maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurvatureTag {
    Valid,
    /// A near-singular curvature pair was detected for this sample at some
    /// point during the run.
    Fallback,
}

/// Norm used for the nonlinear solver's gradient convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientNorm {
    /// Maximum absolute entry over the whole batch (the default).
    MaxAbs,
    L1,
    L2,
}

impl GradientNorm {
    pub fn eval(&self, grad: &Array2<f64>) -> f64 {
        match self {
            // f64::max would silently drop NaN entries; a NaN gradient must
            // yield a NaN norm so the divergence checks can see it.
            GradientNorm::MaxAbs => grad.iter().fold(0.0_f64, |acc, &g| {
                if g.abs() > acc || g.is_nan() {
                    g.abs()
                } else {
                    acc
                }
            }),
            GradientNorm::L1 => grad.iter().map(|g| g.abs()).sum(),
            GradientNorm::L2 => grad.iter().map(|g| g * g).sum::<f64>().sqrt(),
        }
    }
}

/// Options for the batched conjugate-gradient subproblem solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CgOptions {
    pub max_iter: usize,
    /// Stop once every sample's residual infinity-norm falls below
    /// `tol` relative to its right-hand side.
    pub tol: f64,
}

impl Default for CgOptions {
    fn default() -> Self {
        Self {
            max_iter: 20,
            tol: 1e-5,
        }
    }
}

/// Which path solves the per-iteration ridge system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubproblemSolver {
    /// Batched LLT factorization of the explicit `[B, D, D]` systems, with an
    /// LDLT fallback per sample.
    Cholesky,
    /// Matrix-free conjugate gradient; never forms the Gram matrix.
    ConjugateGradient(CgOptions),
}

/// Configuration for [`crate::solver::linear::iterative_ridge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativeRidgeOptions {
    /// Sparsity weight of the Lasso problem.
    pub alpha: f64,
    /// Average-per-element tolerance on the absolute change of the iterate;
    /// scaled internally by the total element count.
    pub tol: f64,
    /// Uniform diagonal added to the ridge system for conditioning.
    pub tikhonov: f64,
    /// Magnitudes below this threshold get a reweighting term of exactly zero.
    pub eps: f64,
    pub max_iter: usize,
    /// Bounded 1-D minimization of the step length over `t in [0, 10]`;
    /// full steps otherwise.
    pub line_search: bool,
    pub step_policy: StepPolicy,
    pub subproblem: SubproblemSolver,
    /// Record the objective value after every iteration.
    pub record_losses: bool,
}

impl Default for IterativeRidgeOptions {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            tol: 1e-5,
            tikhonov: 1e-5,
            eps: f64::EPSILON,
            max_iter: 100,
            line_search: true,
            step_policy: StepPolicy::Shared,
            subproblem: SubproblemSolver::Cholesky,
            record_losses: false,
        }
    }
}

/// Configuration for [`crate::solver::bfgs::iterative_ridge_bfgs`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeBfgsOptions {
    /// Sparsity weight of the Lasso problem.
    pub alpha: f64,
    /// Gradient-norm threshold for successful termination.
    pub gtol: f64,
    /// Initial step length for each line search (and the fixed step size when
    /// line search is disabled).
    pub lr: f64,
    /// Strong-Wolfe search for the step length; fixed steps otherwise.
    pub line_search: bool,
    pub grad_norm: GradientNorm,
    /// Defaults to `200 * D` for a `[B, D]` problem.
    pub max_iter: Option<usize>,
    /// Governs the first iteration's step length on the fixed-step path;
    /// line-searched steps are always one shared scalar because the objective
    /// is batch-summed.
    pub step_policy: StepPolicy,
    pub curvature_policy: CurvaturePolicy,
    /// Record the objective value after every iteration.
    pub record_losses: bool,
}

impl Default for RidgeBfgsOptions {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            gtol: 1e-5,
            lr: 1.0,
            line_search: true,
            grad_norm: GradientNorm::MaxAbs,
            max_iter: None,
            step_policy: StepPolicy::PerSample,
            curvature_policy: CurvaturePolicy::Fallback,
            record_losses: false,
        }
    }
}
