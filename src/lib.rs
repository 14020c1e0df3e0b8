#![deny(dead_code)]
#![deny(unused_imports)]

//! Batched iterative-ridge solvers for Lasso problems.
//!
//! This crate minimizes `0.5 * ||reconstruction(z) - x||^2 + alpha * ||z||_1`
//! for a batch of independent problems at once, by turning the non-smooth L1
//! penalty into a sequence of smooth ridge subproblems (an iteratively
//! reweighted least-squares scheme):
//!
//! - [`iterative_ridge`] handles the fixed linear reconstruction `z · Wᵗ` of
//!   dictionary-based sparse coding, solving one reweighted ridge system per
//!   iteration (batched Cholesky or matrix-free conjugate gradient).
//! - [`iterative_ridge_bfgs`] handles an arbitrary differentiable
//!   reconstruction objective by composing the same reweighting with a
//!   per-sample BFGS curvature approximation and a strong-Wolfe line search.
//!
//! All outcomes — convergence, divergence, exhausted iteration budget — come
//! back as a [`SolveStatus`] on the solution struct together with structured
//! [`DiagnosticEvent`]s; the solvers never raise outcomes as errors and never
//! print.
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use sparsecode::{iterative_ridge, IterativeRidgeOptions, SolveStatus};
//!
//! // Ordinary least squares in disguise: identity dictionary, no penalty.
//! let weight = array![[1.0, 0.0], [0.0, 1.0]];
//! let x = array![[3.0, 4.0]];
//! let z0 = array![[0.0, 0.0]];
//! let options = IterativeRidgeOptions {
//!     alpha: 0.0,
//!     tikhonov: 0.0,
//!     line_search: false,
//!     ..Default::default()
//! };
//!
//! let solution = iterative_ridge(z0.view(), x.view(), weight.view(), &options);
//! assert_eq!(solution.status, SolveStatus::Converged);
//! assert!((solution.codes[[0, 0]] - 3.0).abs() < 1e-6);
//! assert!((solution.codes[[0, 1]] - 4.0).abs() < 1e-6);
//! ```

pub mod diagnostics;
pub mod linalg;
pub mod solver;
pub mod types;

pub use diagnostics::DiagnosticEvent;
pub use solver::bfgs::{iterative_ridge_bfgs, BfgsSolution};
pub use solver::line_search::{
    minimize_scalar_bounded, strong_wolfe, DirectionalEvaluation, ScalarMinimum,
    ScalarSearchOptions, WolfeOptions, WolfeResult,
};
pub use solver::linear::{iterative_ridge, LassoObjective, RidgeSolution};
pub use types::{
    CgOptions, CurvaturePolicy, CurvatureTag, GradientNorm, IterativeRidgeOptions,
    RidgeBfgsOptions, SolveStatus, StepPolicy, SubproblemSolver,
};
