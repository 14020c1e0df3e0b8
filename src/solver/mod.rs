pub mod bfgs;
pub mod line_search;
pub mod linear;

use ndarray::Array2;

/// Elementwise generalized reciprocal of `|z|`: the local quadratic majorizer
/// of the L1 penalty at the current iterate.
///
/// Magnitudes below `eps` map to exactly zero, so a coordinate that has
/// collapsed contributes no ridge weight instead of an unbounded one. The
/// result never contains infinities.
pub(crate) fn reweight(z: &Array2<f64>, eps: f64) -> Array2<f64> {
    z.mapv(|v| {
        let mag = v.abs();
        if mag < eps { 0.0 } else { mag.recip() }
    })
}
