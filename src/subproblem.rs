//! Trust-region subproblem.
//!
//! Each iteration approximately solves
//! ```math
//!   \min_{\vec{d}}\; \vec{g}^\top\vec{d} + \tfrac12\vec{d}^\top\mathbf{A}\vec{d}
//!   \quad\text{s.t.}\quad \|\vec{d}\| \leq \Delta,
//! ```
//! with `$\vec{g} = \mathbf{J}^\top\vec{f}$` and
//! `$\mathbf{A} = \mathbf{J}^\top\mathbf{J}\,(+\,\mathbf{H}_f)$`.
//! The solver is picked by [`SubproblemMethod`].
#[cfg(test)]
use approx::assert_relative_eq;
use log::trace;
use nalgebra::{
    storage::Storage, Cholesky, DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Dyn, Matrix,
    Vector, U1,
};

use crate::error::NllsError;
use crate::linalg::{cholesky, matmult_inner, norm2, solve_lls};
use crate::options::{Model, NllsOptions, Scaling, SubproblemMethod};
use crate::workspace::Workspace;

mod aint;
mod dogleg;
mod dtrs;
mod more_sorensen;

#[cfg(test)]
mod test_random;

/// Compute the step `w.d` and its length `w.normd` for the current radius.
///
/// With scaling active the length is measured in the scaled variables,
/// which is the norm the radius applies to.
pub(crate) fn calculate_step(options: &NllsOptions, w: &mut Workspace) -> Result<(), NllsError> {
    let delta = w.delta;
    let (d, normd) = match options.nlls_method {
        SubproblemMethod::Dogleg => {
            if options.model == Model::Newton {
                return Err(NllsError::DoglegModel {
                    model: options.model,
                });
            }
            let mut s = w.arena.scratch();
            clip(dogleg::solve(&w.j, &w.f, &w.g, delta, &mut s.jd)?, delta)
        }
        method => {
            let mut s = w.arena.scratch();
            matmult_inner(&w.j, &mut s.a);
            if w.use_second_derivatives {
                s.a += &w.hf;
            }
            s.v.copy_from(&w.g);
            let scaled = method != SubproblemMethod::Aint && options.scale != Scaling::None;
            if scaled {
                apply_scaling(&w.j, &mut s.a, &mut s.v, &mut s.scale, options);
            }
            let d = match method {
                SubproblemMethod::Aint => aint::solve(&s.a, &s.v, delta)?,
                SubproblemMethod::MoreSorensen => more_sorensen::solve(&s.a, &s.v, delta, options)?,
                _ => dtrs::solve(&s.a, &s.v, delta)?,
            };
            let (mut d, normd) = clip(d, delta);
            if scaled {
                d.component_div_assign(&s.scale);
            }
            (d, normd)
        }
    };
    trace!("step with |d| = {:.3e} for radius {:.3e}", normd, delta);
    w.d = d;
    w.normd = normd;
    Ok(())
}

/// Scale the model to `$\mathbf{S}^{-1}\mathbf{A}\mathbf{S}^{-1}$`, `$\mathbf{S}^{-1}\vec{g}$`.
///
/// The diagonal of `$\mathbf{S}$` is left in `scale`; a step of the scaled
/// problem maps back by `$\vec{d} = \mathbf{S}^{-1}\tilde{\vec{d}}$`.
pub(crate) fn apply_scaling(
    j: &DMatrix<f64>,
    a: &mut DMatrixViewMut<'_, f64>,
    v: &mut DVectorViewMut<'_, f64>,
    scale: &mut DVectorViewMut<'_, f64>,
    options: &NllsOptions,
) {
    let n = a.nrows();
    for i in 0..n {
        let mut temp = match options.scale {
            Scaling::None => 1.,
            Scaling::Jacobian => j.column(i).norm_squared(),
            Scaling::Hessian => a.row(i).norm_squared(),
        };
        if temp < options.scale_min {
            temp = if options.scale_trim_min {
                options.scale_min
            } else {
                1.
            };
        } else if temp > options.scale_max {
            temp = if options.scale_trim_max {
                options.scale_max
            } else {
                1.
            };
        }
        let temp = temp.sqrt();
        scale[i] = if options.scale_require_increase {
            scale[i].max(temp)
        } else {
            temp
        };
    }
    for k in 0..n {
        for i in 0..n {
            a[(i, k)] /= scale[i] * scale[k];
        }
        v[k] /= scale[k];
    }
}

/// Scale `d` back onto the trust region if it left it through rounding.
fn clip(mut d: DVector<f64>, delta: f64) -> (DVector<f64>, f64) {
    let normd = norm2(&d);
    if normd > delta {
        d *= delta / normd;
        (d, delta)
    } else {
        (d, normd)
    }
}

/// Eigenvalues below zero by less than this fraction of `$\|\mathbf{A}\|$` are rounding.
pub(crate) const SEMIDEFINITE_TOL: f64 = 1.0e-10;

/// Whether ascending eigenvalues `ew` belong to a positive semidefinite matrix.
pub(crate) fn is_semidefinite(ew: &DVector<f64>) -> bool {
    ew.is_empty() || ew[0] >= -SEMIDEFINITE_TOL * ew.amax()
}

/// Cholesky factor of `a` unless `a` is singular to working precision.
pub(crate) fn definite_cholesky<S: Storage<f64, Dyn, Dyn>>(
    a: &Matrix<f64, Dyn, Dyn, S>,
) -> Option<Cholesky<f64, Dyn>> {
    let chol = cholesky(a)?;
    let pivot = chol.l_dirty().diagonal().min();
    (pivot * pivot > SEMIDEFINITE_TOL * a.diagonal().max()).then_some(chol)
}

/// Minimizer of a convex model with singular `$\mathbf{A}$`.
///
/// Returns the minimum-norm solution `$-\mathbf{A}^+\vec{g}$` if it solves
/// `$\mathbf{A}\vec{d} = -\vec{g}$` and lies inside the region. Otherwise the
/// solution is on the boundary and `None` is returned.
pub(crate) fn semidefinite_step<SA, SV>(
    a: &Matrix<f64, Dyn, Dyn, SA>,
    v: &Vector<f64, Dyn, SV>,
    delta: f64,
) -> Result<Option<DVector<f64>>, NllsError>
where
    SA: Storage<f64, Dyn, Dyn>,
    SV: Storage<f64, Dyn, U1>,
{
    let p = solve_lls(a, v)?;
    let mut r = a * &p;
    r += v;
    if norm2(&p) <= delta && norm2(&r) <= f64::EPSILON.sqrt() * norm2(v) {
        trace!("minimum-norm step of the singular model, |d| = {:.3e}", norm2(&p));
        Ok(Some(p))
    } else {
        Ok(None)
    }
}

/// Largest `$\beta$` with `$\|\vec{a} + \beta\vec{b}\| = \Delta$`.
///
/// Requires `$\|\vec{a}\| \leq \Delta$` for a real root to exist.
pub(crate) fn find_beta<SA, SB>(
    a: &Vector<f64, Dyn, SA>,
    b: &Vector<f64, Dyn, SB>,
    delta: f64,
) -> Result<f64, NllsError>
where
    SA: Storage<f64, Dyn, U1>,
    SB: Storage<f64, Dyn, U1>,
{
    let c = a.dot(b);
    let norma2 = norm2(a).powi(2);
    let normb2 = norm2(b).powi(2);
    let discrim = c.powi(2) + normb2 * (delta.powi(2) - norma2);
    if normb2 == 0. || !(discrim >= 0.) {
        return Err(NllsError::FindBeta);
    }
    // avoid cancellation
    let beta = if c <= 0. {
        (-c + discrim.sqrt()) / normb2
    } else {
        (delta.powi(2) - norma2) / (c + discrim.sqrt())
    };
    Ok(beta)
}
