#[cfg(test)]
use approx::assert_relative_eq;
use log::trace;
use nalgebra::{storage::Storage, Cholesky, DMatrix, DVector, Dyn, Matrix, Vector, U1};

use super::{definite_cholesky, find_beta, is_semidefinite, semidefinite_step};
use crate::error::NllsError;
use crate::linalg::{all_eig_symm, cholesky, norm2};
use crate::options::NllsOptions;

/// Failed factorizations tolerated before giving up on a shift.
const MAX_SHIFTS: usize = 30;

/// Cholesky factorization of `$\mathbf{A} + \sigma\mathbf{I}$`, reusing `buf`.
fn shifted_cholesky<S: Storage<f64, Dyn, Dyn>>(
    a: &Matrix<f64, Dyn, Dyn, S>,
    sigma: f64,
    buf: &mut DMatrix<f64>,
) -> Option<Cholesky<f64, Dyn>> {
    buf.copy_from(a);
    for i in 0..buf.nrows() {
        buf[(i, i)] += sigma;
    }
    cholesky(&*buf)
}

/// More-Sorensen iteration on the shift `$\sigma$` of
/// `$(\mathbf{A} + \sigma\mathbf{I})\vec{d} = -\vec{g}$`.
///
/// Accepts `$\vec{d}$` once `$\bigl|\|\vec{d}\| - \Delta\bigr| \leq \mathtt{tol}\cdot\Delta$`.
pub(super) fn solve<SA, SV>(
    a: &Matrix<f64, Dyn, Dyn, SA>,
    v: &Vector<f64, Dyn, SV>,
    delta: f64,
    options: &NllsOptions,
) -> Result<DVector<f64>, NllsError>
where
    SA: Storage<f64, Dyn, Dyn>,
    SV: Storage<f64, Dyn, U1>,
{
    let n = a.nrows();
    let neg_v = -v.clone_owned();
    let mut buf = DMatrix::zeros(n, n);
    let mut sigma = 0.;
    let mut hard_case_dir = None;

    let mut chol = match definite_cholesky(a) {
        Some(chol) => chol,
        None => {
            let (ew, ev) = all_eig_symm(a)?;
            let lambda_min = if is_semidefinite(&ew) {
                if let Some(d) = semidefinite_step(a, v, delta)? {
                    return Ok(d);
                }
                ew[0].min(0.)
            } else {
                hard_case_dir = Some(ev.column(0).clone_owned());
                ew[0]
            };
            // shift just past the most negative eigenvalue
            let mut shift = options.more_sorensen_shift.max(f64::EPSILON);
            let mut shifts = 0;
            loop {
                sigma = -lambda_min + shift;
                if let Some(chol) = shifted_cholesky(a, sigma, &mut buf) {
                    break chol;
                }
                shifts += 1;
                if shifts > MAX_SHIFTS {
                    return Err(NllsError::MsTooManyShifts { shifts });
                }
                shift *= 10.;
            }
        }
    };
    let mut d = chol.solve(&neg_v);
    let mut normd = norm2(&d);

    if normd <= delta {
        return match hard_case_dir {
            None => Ok(d),
            // hard case: move along the eigenvector to the boundary
            Some(y) => {
                let alpha = find_beta(&d, &y, delta)?;
                Ok(d + y * alpha)
            }
        };
    }

    for its in 0..options.more_sorensen_maxits {
        if (normd - delta).abs() <= options.more_sorensen_tol * delta {
            trace!("More-Sorensen converged after {} iterations, sigma = {:.3e}", its, sigma);
            return Ok(d);
        }
        let q = chol
            .l_dirty()
            .solve_lower_triangular(&d)
            .ok_or(NllsError::MsNoProgress { sigma })?;
        let mut sigma_shift = (normd / norm2(&q)).powi(2) * ((normd - delta) / delta);
        if sigma_shift.abs() < options.more_sorensen_tiny * sigma.abs() {
            return Err(NllsError::MsNoProgress { sigma });
        }
        let mut shifts = 0;
        chol = loop {
            if let Some(chol) = shifted_cholesky(a, sigma + sigma_shift, &mut buf) {
                break chol;
            }
            // overshot into the indefinite region, back off
            shifts += 1;
            if shifts > MAX_SHIFTS {
                return Err(NllsError::MsTooManyShifts { shifts });
            }
            sigma_shift *= 0.5;
        };
        sigma += sigma_shift;
        d = chol.solve(&neg_v);
        normd = norm2(&d);
    }
    Err(NllsError::MsMaxits {
        its: options.more_sorensen_maxits,
    })
}
