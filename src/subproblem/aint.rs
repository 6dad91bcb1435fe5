//! The trust-region subproblem as a generalized eigenvalue problem.
//!
//! The Lagrange multiplier of the boundary solution is the rightmost real
//! eigenvalue `$\lambda^*$` of
//! ```math
//!   \mathbf{M} = \begin{pmatrix} -\mathbf{A} & \vec{g}\vec{g}^\top/\Delta^2 \\ \mathbf{I} & -\mathbf{A} \end{pmatrix},
//! ```
//! see Adachi, Iwata, Nakatsukasa and Takeda, SIAM J. Optim. 27 (2017).
#[cfg(test)]
use approx::assert_relative_eq;
use nalgebra::{storage::Storage, DMatrix, DVector, Dyn, Matrix, Vector, U1};

use super::{definite_cholesky, find_beta, is_semidefinite, semidefinite_step};
use crate::error::NllsError;
use crate::linalg::{all_eig_symm, max_eig, norm2, solve_lls};

/// Below this `$\|\vec{z}_1\|/\|\vec{z}\|$` the eigenvector carries no
/// information about `$\vec{g}$`.
const HARD_CASE_TOL: f64 = 1.0e-4;

pub(super) fn solve<SA, SV>(
    a: &Matrix<f64, Dyn, Dyn, SA>,
    v: &Vector<f64, Dyn, SV>,
    delta: f64,
) -> Result<DVector<f64>, NllsError>
where
    SA: Storage<f64, Dyn, Dyn>,
    SV: Storage<f64, Dyn, U1>,
{
    let n = a.nrows();
    let neg_v = -v.clone_owned();
    match definite_cholesky(a) {
        Some(chol) => {
            let p = chol.solve(&neg_v);
            if norm2(&p) <= delta {
                return Ok(p);
            }
        }
        None => {
            // singular but convex, the minimum-norm minimizer may still fit
            if is_semidefinite(&all_eig_symm(a)?.0) {
                if let Some(p) = semidefinite_step(a, v, delta)? {
                    return Ok(p);
                }
            }
        }
    }

    let mut m = DMatrix::zeros(2 * n, 2 * n);
    let delta2 = delta.powi(2);
    for k in 0..n {
        for i in 0..n {
            m[(i, k)] = -a[(i, k)];
            m[(n + i, n + k)] = -a[(i, k)];
            m[(i, n + k)] = v[i] * v[k] / delta2;
        }
        m[(n + k, k)] = 1.;
    }
    let (lambda, z) = max_eig(&m)?;
    let z1 = z.rows(0, n);
    let z2 = z.rows(n, n);

    if norm2(&z1) > HARD_CASE_TOL * norm2(&z) {
        let vz2 = v.dot(&z2);
        if vz2 != 0. {
            return Ok(z1 * (-delta2 / vz2));
        }
    }

    // hard case: z2 spans the null space of A + lambda I
    let mut shifted = a.clone_owned();
    for i in 0..n {
        shifted[(i, i)] += lambda;
    }
    let x = solve_lls(&shifted, v)?;
    let normz2 = norm2(&z2);
    if normz2 == 0. {
        return Err(NllsError::AintEigImag);
    }
    if norm2(&x) >= delta {
        return Ok(x);
    }
    let u = z2 / normz2;
    let tau = find_beta(&x, &u, delta)?;
    Ok(x + u * tau)
}
