//! Dense linear algebra used by the subproblem solvers.
//!
//! All routines work on `f64` and accept owned matrices as well as views into
//! the solve's scratch arena. Dimension mismatches are programming errors and
//! panic; numerical breakdowns are reported as [`NllsError::FromExternal`].
#[cfg(test)]
use approx::assert_relative_eq;
use nalgebra::{
    storage::{Storage, StorageMut},
    Cholesky, DMatrix, DVector, Dyn, Matrix, Schur, SymmetricEigen, Vector, SVD, U1,
};

use crate::error::NllsError;

/// Imaginary parts below this (relative to the modulus) count as real.
const EIG_IMAG_TOL: f64 = 1.0e-6;

pub(crate) fn external(routine: &'static str, code: i32) -> NllsError {
    NllsError::FromExternal { routine, code }
}

fn all_finite<S: Storage<f64, Dyn, Dyn>>(a: &Matrix<f64, Dyn, Dyn, S>) -> bool {
    a.iter().all(|v| v.is_finite())
}

/// Euclidean norm of `v`, `0` for an empty vector.
///
/// Accumulates with a running scale like LAPACK's `dnrm2` so that neither
/// large nor tiny entries over- or underflow.
pub fn norm2<S: Storage<f64, Dyn, U1>>(v: &Vector<f64, Dyn, S>) -> f64 {
    let mut scale = 0.0f64;
    let mut ssq = 1.0f64;
    for &xi in v.iter() {
        if xi != 0. {
            let absxi = xi.abs();
            if scale < absxi {
                ssq = 1. + ssq * (scale / absxi).powi(2);
                scale = absxi;
            } else {
                ssq += (absxi / scale).powi(2);
            }
        }
    }
    scale * ssq.sqrt()
}

/// `$\mathbf{J}\vec{x}$` written to `jx`.
///
/// # Panics
///
/// Panics if the dimensions do not agree.
pub fn mult_j<SJ, SX, SO>(
    j: &Matrix<f64, Dyn, Dyn, SJ>,
    x: &Vector<f64, Dyn, SX>,
    jx: &mut Vector<f64, Dyn, SO>,
) where
    SJ: Storage<f64, Dyn, Dyn>,
    SX: Storage<f64, Dyn, U1>,
    SO: StorageMut<f64, Dyn, U1>,
{
    assert_eq!(j.ncols(), x.nrows(), "mult_j: J has {} columns", j.ncols());
    assert_eq!(j.nrows(), jx.nrows(), "mult_j: J has {} rows", j.nrows());
    jx.gemv(1., j, x, 0.);
}

/// `$\mathbf{J}^\top\vec{x}$` written to `jtx`.
///
/// # Panics
///
/// Panics if the dimensions do not agree.
pub fn mult_jt<SJ, SX, SO>(
    j: &Matrix<f64, Dyn, Dyn, SJ>,
    x: &Vector<f64, Dyn, SX>,
    jtx: &mut Vector<f64, Dyn, SO>,
) where
    SJ: Storage<f64, Dyn, Dyn>,
    SX: Storage<f64, Dyn, U1>,
    SO: StorageMut<f64, Dyn, U1>,
{
    assert_eq!(j.nrows(), x.nrows(), "mult_jt: J has {} rows", j.nrows());
    assert_eq!(j.ncols(), jtx.nrows(), "mult_jt: J has {} columns", j.ncols());
    jtx.gemv_tr(1., j, x, 0.);
}

/// `$\mathbf{A} = \mathbf{J}^\top\mathbf{J}$`.
pub(crate) fn matmult_inner<SJ, SA>(j: &Matrix<f64, Dyn, Dyn, SJ>, a: &mut Matrix<f64, Dyn, Dyn, SA>)
where
    SJ: Storage<f64, Dyn, Dyn>,
    SA: StorageMut<f64, Dyn, Dyn>,
{
    assert_eq!(a.nrows(), j.ncols(), "matmult_inner: A must be n x n");
    a.gemm_tr(1., j, j, 0.);
}

/// Largest and smallest singular value of `$\mathbf{J}$`.
///
/// The smallest value may be (numerically) zero for rank-deficient `$\mathbf{J}$`.
pub fn get_svd_j<S: Storage<f64, Dyn, Dyn>>(
    j: &Matrix<f64, Dyn, Dyn, S>,
) -> Result<(f64, f64), NllsError> {
    if j.is_empty() {
        return Ok((0., 0.));
    }
    if !all_finite(j) {
        return Err(external("svd", -1));
    }
    let svd = SVD::try_new(j.clone_owned(), false, false, f64::EPSILON, 0)
        .ok_or_else(|| external("svd", 1))?;
    let s = &svd.singular_values;
    Ok((s.max(), s.min()))
}

/// Full eigendecomposition of a symmetric matrix.
///
/// Eigenvalues are returned in ascending order, eigenvectors are the
/// matching columns of the second value.
pub(crate) fn all_eig_symm<S: Storage<f64, Dyn, Dyn>>(
    a: &Matrix<f64, Dyn, Dyn, S>,
) -> Result<(DVector<f64>, DMatrix<f64>), NllsError> {
    if !all_finite(a) {
        return Err(external("symmetric_eigen", -1));
    }
    let eigen = SymmetricEigen::try_new(a.clone_owned(), f64::EPSILON, 0)
        .ok_or_else(|| external("symmetric_eigen", 1))?;
    let n = eigen.eigenvalues.nrows();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_unstable_by(|&i, &k| eigen.eigenvalues[i].total_cmp(&eigen.eigenvalues[k]));
    let ew = DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i]));
    let ev = DMatrix::from_fn(n, n, |r, c| eigen.eigenvectors[(r, order[c])]);
    Ok((ew, ev))
}

/// Rightmost real eigenvalue of a non-symmetric matrix of even order
/// together with an eigenvector.
///
/// The eigenvector is taken as the right singular vector of
/// `$\mathbf{A} - \lambda\mathbf{I}$` belonging to its smallest singular value.
pub(crate) fn max_eig(a: &DMatrix<f64>) -> Result<(f64, DVector<f64>), NllsError> {
    let dim = a.nrows();
    if dim % 2 != 0 {
        return Err(NllsError::AintEigOdd { dim });
    }
    if !all_finite(a) {
        return Err(external("schur", -1));
    }
    let schur = Schur::try_new(a.clone(), f64::EPSILON, 0).ok_or_else(|| external("schur", 1))?;
    let lambda = schur
        .complex_eigenvalues()
        .iter()
        .filter(|ev| ev.im.abs() <= EIG_IMAG_TOL * ev.re.abs().max(1.))
        .map(|ev| ev.re)
        .fold(None, |acc: Option<f64>, re| Some(acc.map_or(re, |best| best.max(re))))
        .ok_or(NllsError::AintEigImag)?;

    let mut shifted = a.clone();
    for i in 0..dim {
        shifted[(i, i)] -= lambda;
    }
    let svd = SVD::try_new(shifted, false, true, f64::EPSILON, 0)
        .ok_or_else(|| external("svd", 1))?;
    let v_t = svd.v_t.as_ref().ok_or_else(|| external("svd", 2))?;
    let imin = svd.singular_values.imin();
    Ok((lambda, v_t.row(imin).transpose()))
}

/// Cholesky factorization, `None` if the matrix is not positive definite.
pub(crate) fn cholesky<S: Storage<f64, Dyn, Dyn>>(
    a: &Matrix<f64, Dyn, Dyn, S>,
) -> Option<Cholesky<f64, Dyn>> {
    if !all_finite(a) {
        return None;
    }
    Cholesky::new(a.clone_owned())
}

/// Minimum-norm solution of `$\min_{\vec{d}}\|\mathbf{J}\vec{d} + \vec{f}\|$`.
pub(crate) fn solve_lls<SJ, SF>(
    j: &Matrix<f64, Dyn, Dyn, SJ>,
    f: &Vector<f64, Dyn, SF>,
) -> Result<DVector<f64>, NllsError>
where
    SJ: Storage<f64, Dyn, Dyn>,
    SF: Storage<f64, Dyn, U1>,
{
    if !all_finite(j) {
        return Err(external("svd", -1));
    }
    let svd =
        SVD::try_new(j.clone_owned(), true, true, f64::EPSILON, 0).ok_or_else(|| external("svd", 1))?;
    let eps = f64::EPSILON * svd.singular_values.max() * (j.nrows().max(j.ncols()) as f64);
    svd.solve(&(-f.clone_owned()), eps)
        .map_err(|_| external("svd", 2))
}
