//! Trust-region subproblem in the eigenbasis of the model Hessian.
//!
//! With `$\mathbf{A} = \mathbf{Q}\mathbf{\Lambda}\mathbf{Q}^\top$` and
//! `$\vec{c} = \mathbf{Q}^\top\vec{g}$` the step is
//! `$x_i(\sigma) = -c_i / (\lambda_i + \sigma)$`, and on the boundary
//! `$\sigma$` is the root of the secular equation
//! ```math
//!   \phi(\sigma) = \frac{1}{\|\vec{x}(\sigma)\|} - \frac{1}{\Delta} = 0,
//! ```
//! found by safeguarded Newton iteration.
#[cfg(test)]
use approx::assert_relative_eq;
use log::trace;
use nalgebra::{storage::Storage, DVector, Dyn, Matrix, Vector, U1};

use super::{is_semidefinite, SEMIDEFINITE_TOL};
use crate::error::NllsError;
use crate::linalg::{all_eig_symm, external, norm2};

const MAX_ITS: usize = 200;
/// Relative accuracy of `$\|\vec{x}\| = \Delta$`.
const BOUNDARY_TOL: f64 = 1.0e-10;

pub(super) fn solve<SA, SV>(
    a: &Matrix<f64, Dyn, Dyn, SA>,
    v: &Vector<f64, Dyn, SV>,
    delta: f64,
) -> Result<DVector<f64>, NllsError>
where
    SA: Storage<f64, Dyn, Dyn>,
    SV: Storage<f64, Dyn, U1>,
{
    let (ew, ev) = all_eig_symm(a)?;
    let c = ev.tr_mul(v);
    let y = solve_diagonal(&ew, &c, delta)?;
    Ok(ev * y)
}

/// Solve the subproblem for `$\mathbf{A} = \operatorname{diag}(\vec{\lambda})$`
/// with ascending `lambda`.
pub(super) fn solve_diagonal(
    lambda: &DVector<f64>,
    c: &DVector<f64>,
    delta: f64,
) -> Result<DVector<f64>, NllsError> {
    let n = lambda.nrows();
    if n == 0 {
        return Ok(DVector::zeros(0));
    }
    let lambda1 = lambda[0];
    let normc = norm2(c);
    let x_at = |sigma: f64| DVector::from_fn(n, |i, _| -c[i] / (lambda[i] + sigma));
    let definite = lambda1 > SEMIDEFINITE_TOL * lambda.amax();

    if definite {
        let x = x_at(0.);
        if norm2(&x) <= delta {
            return Ok(x);
        }
    }

    // hard case: c has no component in the leftmost eigenspace
    let degenerate_tol = f64::EPSILON.sqrt() * lambda1.abs().max(1.);
    let tiny_c = f64::EPSILON.sqrt() * normc;
    let hard = !definite
        && lambda
            .iter()
            .zip(c.iter())
            .all(|(l, ci)| l - lambda1 > degenerate_tol || ci.abs() <= tiny_c);
    if hard {
        let mut x = DVector::from_fn(n, |i, _| {
            if lambda[i] - lambda1 > degenerate_tol {
                -c[i] / (lambda[i] - lambda1)
            } else {
                0.
            }
        });
        let normx = norm2(&x);
        if normx <= delta {
            if !is_semidefinite(lambda) {
                x[0] = (delta.powi(2) - normx.powi(2)).sqrt();
            }
            return Ok(x);
        }
    }

    // phi(lo) < 0 <= phi(hi)
    let mut lo = (-lambda1).max(0.);
    let mut hi = normc / delta - lambda1;
    let mut sigma = hi;
    for its in 0..MAX_ITS {
        if lambda1 + sigma <= 0. {
            lo = sigma;
            sigma = 0.5 * (lo + hi);
            continue;
        }
        let x = x_at(sigma);
        let normx = norm2(&x);
        if (normx - delta).abs() <= BOUNDARY_TOL * delta || hi - lo <= f64::EPSILON * hi.abs() {
            trace!("secular equation solved after {} iterations, sigma = {:.3e}", its, sigma);
            return Ok(x);
        }
        let phi = normx.recip() - delta.recip();
        if phi < 0. {
            lo = sigma;
        } else {
            hi = sigma;
        }
        let dphi = lambda
            .iter()
            .zip(c.iter())
            .map(|(l, ci)| ci.powi(2) / (l + sigma).powi(3))
            .sum::<f64>()
            / normx.powi(3);
        let newton = sigma - phi / dphi;
        sigma = if newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }
    Err(external("dtrs", 1))
}
