//! Scalar step-length searches used by the ridge solvers.
//!
//! Two collaborators live here: a bounded 1-D minimizer (golden-section on a
//! fixed bracket) for the linear solver, and a strong-Wolfe search (bracket
//! plus cubic-interpolation zoom, Nocedal & Wright Alg. 3.5/3.6) for the
//! quasi-Newton solver. The Wolfe search evaluates the objective along a ray
//! through an explicit [`DirectionalEvaluation`] record instead of a closure
//! capturing solver internals, so the evaluator can be exercised on its own.

use ndarray::Array2;

/// Options for [`minimize_scalar_bounded`].
#[derive(Debug, Clone)]
pub struct ScalarSearchOptions {
    pub max_iter: usize,
    /// Absolute tolerance on the bracket width.
    pub xatol: f64,
}

impl Default for ScalarSearchOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            xatol: 1e-5,
        }
    }
}

/// Result of a bounded 1-D minimization.
#[derive(Debug, Clone)]
pub struct ScalarMinimum {
    pub t: f64,
    pub f_min: f64,
    pub iterations: usize,
    pub num_evals: usize,
    /// False when the bracket did not narrow below tolerance within the
    /// iteration cap; the midpoint of the final bracket is still returned.
    pub converged: bool,
}

/// Golden-section minimization of `g` over the closed interval `[lo, hi]`.
pub fn minimize_scalar_bounded<F>(
    mut g: F,
    bounds: (f64, f64),
    options: &ScalarSearchOptions,
) -> ScalarMinimum
where
    F: FnMut(f64) -> f64,
{
    let (mut a, mut b) = bounds;
    assert!(a < b, "invalid search interval [{a}, {b}]");

    let inv_phi = ((5.0_f64).sqrt() - 1.0) / 2.0;
    let inv_phi2 = 1.0 - inv_phi;

    let mut x1 = a + inv_phi2 * (b - a);
    let mut x2 = a + inv_phi * (b - a);
    let mut f1 = g(x1);
    let mut f2 = g(x2);
    let mut num_evals = 2;

    for iter in 0..options.max_iter {
        if b - a < options.xatol {
            let t = 0.5 * (a + b);
            let f_min = g(t);
            return ScalarMinimum {
                t,
                f_min,
                iterations: iter,
                num_evals: num_evals + 1,
                converged: true,
            };
        }
        if f1 < f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = a + inv_phi2 * (b - a);
            f1 = g(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = a + inv_phi * (b - a);
            f2 = g(x2);
        }
        num_evals += 1;
    }

    let t = 0.5 * (a + b);
    let f_min = g(t);
    ScalarMinimum {
        t,
        f_min,
        iterations: options.max_iter,
        num_evals: num_evals + 1,
        converged: false,
    }
}

/// Options for [`strong_wolfe`].
#[derive(Debug, Clone)]
pub struct WolfeOptions {
    /// Sufficient-decrease constant.
    pub c1: f64,
    /// Curvature constant.
    pub c2: f64,
    pub max_bracket: usize,
    pub max_zoom: usize,
}

impl Default for WolfeOptions {
    fn default() -> Self {
        Self {
            c1: 1e-4,
            c2: 0.9,
            max_bracket: 20,
            max_zoom: 10,
        }
    }
}

/// The objective restricted to a ray `t ↦ f(base + t·direction)`.
///
/// Holds only borrows of the caller's state; evaluation is stateless and
/// returns everything the search needs at a trial step.
pub struct DirectionalEvaluation<'a, F>
where
    F: Fn(&Array2<f64>) -> (f64, Array2<f64>),
{
    objective: &'a F,
    base: &'a Array2<f64>,
    direction: &'a Array2<f64>,
}

impl<'a, F> DirectionalEvaluation<'a, F>
where
    F: Fn(&Array2<f64>) -> (f64, Array2<f64>),
{
    pub fn new(objective: &'a F, base: &'a Array2<f64>, direction: &'a Array2<f64>) -> Self {
        Self {
            objective,
            base,
            direction,
        }
    }

    /// Objective value, gradient, and directional derivative at `base + t·d`.
    pub fn eval(&self, t: f64) -> (f64, Array2<f64>, f64) {
        let trial = self.base + &(self.direction * t);
        let (value, grad) = (self.objective)(&trial);
        let deriv = (&grad * self.direction).sum();
        (value, grad, deriv)
    }
}

/// Result of a strong-Wolfe step-length search.
#[derive(Debug, Clone)]
pub struct WolfeResult {
    pub f: f64,
    pub grad: Array2<f64>,
    pub t: f64,
    pub num_evals: usize,
    /// False when no point satisfying both Wolfe conditions was found; the
    /// best evaluated point (possibly `t = 0`) is returned instead.
    pub success: bool,
}

struct BracketPoint {
    t: f64,
    f: f64,
    deriv: f64,
    grad: Array2<f64>,
}

/// Find a step length along `eval`'s ray satisfying the strong Wolfe
/// conditions, starting the bracket search from `t0`.
///
/// `f0`, `grad0` and `gtd0` are the objective value, gradient, and
/// directional derivative at `t = 0`, which the caller already has.
pub fn strong_wolfe<F>(
    eval: &DirectionalEvaluation<'_, F>,
    t0: f64,
    f0: f64,
    grad0: &Array2<f64>,
    gtd0: f64,
    options: &WolfeOptions,
) -> WolfeResult
where
    F: Fn(&Array2<f64>) -> (f64, Array2<f64>),
{
    let mut t = t0;
    let mut prev = BracketPoint {
        t: 0.0,
        f: f0,
        deriv: gtd0,
        grad: grad0.clone(),
    };
    let mut num_evals = 0;

    for attempt in 0..options.max_bracket {
        let (f_i, g_i, d_i) = eval.eval(t);
        num_evals += 1;
        let cur = BracketPoint {
            t,
            f: f_i,
            deriv: d_i,
            grad: g_i,
        };

        // A non-finite value means the step overshot; treat it as an Armijo
        // failure and let the zoom phase shrink the bracket.
        if !cur.f.is_finite()
            || cur.f > f0 + options.c1 * cur.t * gtd0
            || (attempt > 0 && cur.f >= prev.f)
        {
            return zoom(eval, f0, grad0, gtd0, prev, cur, num_evals, options);
        }
        if cur.deriv.abs() <= options.c2 * gtd0.abs() {
            return WolfeResult {
                f: cur.f,
                grad: cur.grad,
                t: cur.t,
                num_evals,
                success: true,
            };
        }
        if cur.deriv >= 0.0 {
            return zoom(eval, f0, grad0, gtd0, prev, cur, num_evals, options);
        }

        prev = cur;
        t *= 2.0;
    }

    // The objective kept decreasing without meeting the curvature condition;
    // the furthest Armijo-satisfying point is the best available step.
    WolfeResult {
        f: prev.f,
        grad: prev.grad,
        t: prev.t,
        num_evals,
        success: false,
    }
}

/// Refine a bracketing interval with cubic interpolation until a point
/// satisfies the strong Wolfe conditions (Nocedal & Wright Alg. 3.6).
#[allow(clippy::too_many_arguments)]
fn zoom<F>(
    eval: &DirectionalEvaluation<'_, F>,
    f0: f64,
    grad0: &Array2<f64>,
    gtd0: f64,
    mut lo: BracketPoint,
    mut hi: BracketPoint,
    mut num_evals: usize,
    options: &WolfeOptions,
) -> WolfeResult
where
    F: Fn(&Array2<f64>) -> (f64, Array2<f64>),
{
    const MIN_STEP: f64 = 1e-12;

    for _ in 0..options.max_zoom {
        if lo.t > hi.t {
            std::mem::swap(&mut lo, &mut hi);
        }
        let width = hi.t - lo.t;

        let t_j = if width < MIN_STEP || !lo.f.is_finite() || !hi.f.is_finite() {
            0.5 * (lo.t + hi.t)
        } else {
            let d1 = lo.deriv + hi.deriv - 3.0 * (hi.f - lo.f) / width;
            let d2_sq = d1 * d1 - lo.deriv * hi.deriv;
            if d2_sq.is_sign_positive() {
                let d2 = d2_sq.sqrt();
                let trial = hi.t - width * (hi.deriv + d2 - d1) / (hi.deriv - lo.deriv + 2.0 * d2);
                if !trial.is_finite() || trial < lo.t || trial > hi.t {
                    0.5 * (lo.t + hi.t)
                } else {
                    trial
                }
            } else {
                0.5 * (lo.t + hi.t)
            }
        };
        let t_j = if (t_j - lo.t).abs() < MIN_STEP || (t_j - hi.t).abs() < MIN_STEP {
            0.5 * (lo.t + hi.t)
        } else {
            t_j
        };

        let (f_j, g_j, d_j) = eval.eval(t_j);
        num_evals += 1;

        if f_j.is_nan() || g_j.iter().any(|v| v.is_nan()) {
            break;
        }

        if !f_j.is_finite() || f_j > f0 + options.c1 * t_j * gtd0 || f_j >= lo.f {
            hi = BracketPoint {
                t: t_j,
                f: f_j,
                deriv: d_j,
                grad: g_j,
            };
        } else {
            if d_j.abs() <= options.c2 * gtd0.abs() {
                return WolfeResult {
                    f: f_j,
                    grad: g_j,
                    t: t_j,
                    num_evals,
                    success: true,
                };
            }
            let point = BracketPoint {
                t: t_j,
                f: f_j,
                deriv: d_j,
                grad: g_j,
            };
            if d_j >= 0.0 {
                hi = point;
            } else {
                lo = point;
            }
        }
    }

    if lo.f.is_finite() && lo.f <= f0 {
        WolfeResult {
            f: lo.f,
            grad: lo.grad,
            t: lo.t,
            num_evals,
            success: false,
        }
    } else {
        WolfeResult {
            f: f0,
            grad: grad0.clone(),
            t: 0.0,
            num_evals,
            success: false,
        }
    }
}
