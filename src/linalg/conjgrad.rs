//! Batched matrix-free conjugate gradient for symmetric positive-definite
//! systems.
//!
//! One CG recurrence runs for all `B` samples at once: the matvec closure
//! applies every sample's operator to a `[B, D]` block, while the scalar
//! recurrences (`alpha`, `beta`, residual norms) are kept per sample. A
//! sample whose system stagnates simply keeps its best iterate; non-finite
//! values flow back to the caller's divergence checks rather than erroring
//! here.

use crate::types::CgOptions;
use ndarray::{Array1, Array2, Axis};

#[inline]
fn sample_dot(a: &Array2<f64>, b: &Array2<f64>) -> Array1<f64> {
    let batch = a.nrows();
    Array1::from_shape_fn(batch, |i| {
        a.index_axis(Axis(0), i).dot(&b.index_axis(Axis(0), i))
    })
}

#[inline]
fn inf_norm_rows(a: &Array2<f64>) -> Array1<f64> {
    let batch = a.nrows();
    Array1::from_shape_fn(batch, |i| {
        a.index_axis(Axis(0), i)
            .iter()
            .fold(0.0_f64, |acc, &v| acc.max(v.abs()))
    })
}

/// Solve `A_b · z_b = rhs_b` for every batch sample with the Hestenes-Stiefel
/// recurrence, starting from the zero iterate.
///
/// `matvec` must apply each sample's symmetric positive-definite operator to
/// the corresponding row of its `[B, D]` argument.
pub fn conjgrad<F>(rhs: &Array2<f64>, matvec: F, options: &CgOptions) -> Array2<f64>
where
    F: Fn(&Array2<f64>) -> Array2<f64>,
{
    let batch = rhs.nrows();
    let mut x = Array2::<f64>::zeros(rhs.raw_dim());
    let mut r = rhs.clone();
    let mut p = r.clone();
    let mut rz = sample_dot(&r, &r);

    // Relative-residual targets, guarded against an all-zero rhs row.
    let mut target = inf_norm_rows(rhs);
    target.mapv_inplace(|v| options.tol * v.max(f64::MIN_POSITIVE));

    for iter in 0..options.max_iter {
        let ap = matvec(&p);
        let pap = sample_dot(&p, &ap);

        for b in 0..batch {
            // A zero curvature means this sample's direction is exhausted;
            // freeze it instead of dividing by zero.
            let alpha = if pap[b].abs() > 0.0 { rz[b] / pap[b] } else { 0.0 };
            x.index_axis_mut(Axis(0), b)
                .scaled_add(alpha, &p.index_axis(Axis(0), b));
            r.index_axis_mut(Axis(0), b)
                .scaled_add(-alpha, &ap.index_axis(Axis(0), b));
        }

        let residual = inf_norm_rows(&r);
        if (0..batch).all(|b| residual[b] <= target[b]) {
            log::debug!("conjugate gradient converged in {} iterations", iter + 1);
            return x;
        }

        let rz_new = sample_dot(&r, &r);
        for b in 0..batch {
            let beta = if rz[b].abs() > 0.0 { rz_new[b] / rz[b] } else { 0.0 };
            let mut p_row = p.index_axis_mut(Axis(0), b);
            p_row *= beta;
            p_row += &r.index_axis(Axis(0), b);
        }
        rz = rz_new;
    }

    log::debug!(
        "conjugate gradient stopped at the iteration cap ({})",
        options.max_iter
    );
    x
}
