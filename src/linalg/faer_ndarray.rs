//! Zero-copy interop between `ndarray` containers and `faer`, plus the dense
//! products and the batched symmetric-positive-definite solve the ridge
//! solvers are built on.
//!
//! Products dispatch on size: tiny operands stay on `ndarray` to avoid GEMM
//! setup overhead, everything else goes through `faer`. All faer calls run
//! sequentially (`Par::Seq`); batching is the only parallel axis in this
//! crate and it is data-parallel by construction, not threaded.

use faer::linalg::matmul::matmul;
use faer::linalg::solvers::{Ldlt, LdltError, Llt, Solve};
use faer::{Accum, Mat, MatRef, Par, Side};
use ndarray::{Array2, Array3, ArrayBase, Axis, Data, Ix1, Ix2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error("symmetric factorization failed for batch sample {sample}: {error:?}")]
    BatchFactorization { sample: usize, error: LdltError },
}

#[inline]
fn should_use_faer_matmul(m: usize, n: usize, k: usize) -> bool {
    // Stay on ndarray for tiny products; switch to faer GEMM for moderate+.
    const MIN_DIM: usize = 32;
    const MIN_FLOP_SCALE: usize = 64 * 64;
    (m >= MIN_DIM || n >= MIN_DIM || k >= MIN_DIM)
        && m.saturating_mul(n).saturating_mul(k) >= MIN_FLOP_SCALE
}

#[inline]
pub fn array_to_mat_ref<S: Data<Elem = f64>>(array: &ArrayBase<S, Ix2>) -> MatRef<'_, f64> {
    let (rows, cols) = array.dim();
    let strides = array.strides();

    // SAFETY: dimensions and strides come straight from ndarray, which
    // guarantees they describe `array`'s allocation.
    unsafe { MatRef::from_raw_parts(array.as_ptr(), rows, cols, strides[0], strides[1]) }
}

#[inline]
pub fn array_to_col_mat_ref<S: Data<Elem = f64>>(array: &ArrayBase<S, Ix1>) -> MatRef<'_, f64> {
    let len = array.len();
    let stride = array.strides()[0];
    // SAFETY: as above; the column stride is irrelevant for a single column.
    unsafe { MatRef::from_raw_parts(array.as_ptr(), len, 1, stride, 0) }
}

#[inline]
pub fn mat_to_array(mat: &Mat<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Gram matrix `AᵗA` for a dictionary `A` of shape `(n, p)`.
#[inline]
pub fn gram<S: Data<Elem = f64>>(a: &ArrayBase<S, Ix2>) -> Array2<f64> {
    let (n, p) = a.dim();
    if !should_use_faer_matmul(p, p, n) {
        return a.t().dot(a);
    }

    let mut result = Mat::<f64>::zeros(p, p);
    let a_ref = array_to_mat_ref(a);
    matmul(
        result.as_mut(),
        Accum::Replace,
        a_ref.transpose(),
        a_ref,
        1.0,
        Par::Seq,
    );
    mat_to_array(&result)
}

/// Dense product `A·B` for `A (n, p)` and `B (p, q)`.
#[inline]
pub fn fast_ab<S1: Data<Elem = f64>, S2: Data<Elem = f64>>(
    a: &ArrayBase<S1, Ix2>,
    b: &ArrayBase<S2, Ix2>,
) -> Array2<f64> {
    let (n, p) = a.dim();
    let (p_b, q) = b.dim();
    debug_assert_eq!(p, p_b, "A and B must have compatible inner dimensions");

    if !should_use_faer_matmul(n, q, p) {
        return a.dot(b);
    }

    let mut result = Mat::<f64>::zeros(n, q);
    matmul(
        result.as_mut(),
        Accum::Replace,
        array_to_mat_ref(a),
        array_to_mat_ref(b),
        1.0,
        Par::Seq,
    );
    mat_to_array(&result)
}

/// Dense product `A·Bᵗ` for `A (n, p)` and `B (q, p)`.
#[inline]
pub fn fast_abt<S1: Data<Elem = f64>, S2: Data<Elem = f64>>(
    a: &ArrayBase<S1, Ix2>,
    b: &ArrayBase<S2, Ix2>,
) -> Array2<f64> {
    let (n, p) = a.dim();
    let (q, p_b) = b.dim();
    debug_assert_eq!(p, p_b, "A and Bᵗ must have compatible inner dimensions");

    if !should_use_faer_matmul(n, q, p) {
        return a.dot(&b.t());
    }

    let mut result = Mat::<f64>::zeros(n, q);
    matmul(
        result.as_mut(),
        Accum::Replace,
        array_to_mat_ref(a),
        array_to_mat_ref(b).transpose(),
        1.0,
        Par::Seq,
    );
    mat_to_array(&result)
}

enum SpdFactor {
    Llt(Llt<f64>),
    Ldlt(Ldlt<f64>),
}

impl SpdFactor {
    #[inline]
    fn solve(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        match self {
            SpdFactor::Llt(f) => f.solve(rhs),
            SpdFactor::Ldlt(f) => f.solve(rhs),
        }
    }
}

/// Factorize one symmetric system with an LLT first attempt and LDLT fallback.
#[inline]
fn factorize_spd_with_fallback(
    matrix: MatRef<'_, f64>,
    sample: usize,
) -> Result<SpdFactor, LinalgError> {
    if let Ok(llt) = Llt::new(matrix, Side::Lower) {
        return Ok(SpdFactor::Llt(llt));
    }
    let ldlt = Ldlt::new(matrix, Side::Lower)
        .map_err(|error| LinalgError::BatchFactorization { sample, error })?;
    Ok(SpdFactor::Ldlt(ldlt))
}

/// Solve a batch of symmetric positive-definite systems `A_b · z_b = rhs_b`,
/// one `[D, D]` matrix per batch sample.
///
/// Positive-definiteness is the caller's promise, not a checked invariant: a
/// semi-definite system may factor via the LDLT fallback and produce
/// non-finite solution entries, which the solvers catch in their divergence
/// checks. An outright factorization failure is reported for the offending
/// sample.
pub fn batch_solve_spd(
    systems: &Array3<f64>,
    rhs: &Array2<f64>,
) -> Result<Array2<f64>, LinalgError> {
    let (batch, dim, dim2) = systems.dim();
    debug_assert_eq!(dim, dim2, "per-sample systems must be square");
    debug_assert_eq!(rhs.dim(), (batch, dim), "rhs must be [B, D]");

    let mut out = Array2::<f64>::zeros((batch, dim));
    for b in 0..batch {
        let a = systems.index_axis(Axis(0), b);
        let factor = factorize_spd_with_fallback(array_to_mat_ref(&a), b)?;
        let rhs_row = rhs.index_axis(Axis(0), b);
        let solution = factor.solve(array_to_col_mat_ref(&rhs_row));
        let mut out_row = out.index_axis_mut(Axis(0), b);
        for j in 0..dim {
            out_row[j] = solution[(j, 0)];
        }
    }
    Ok(out)
}
