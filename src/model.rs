//! Local model, step quality and trust-region radius update.
#[cfg(test)]
use approx::assert_relative_eq;
use log::trace;
use nalgebra::{DMatrix, DVector, DVectorViewMut};

use crate::linalg::{mult_j, norm2};
use crate::options::{NllsOptions, TrUpdateStrategy};
use crate::workspace::Workspace;

/// Steps longer than this fraction of the radius count as boundary steps.
const BOUNDARY_FRACTION: f64 = 0.999;

/// Value of the local model at `$\vec{x} + \vec{d}$`:
/// ```math
///   m(\vec{d}) = \tfrac12\|\vec{f} + \mathbf{J}\vec{d}\|^2 \;\bigl(+\, \tfrac12\vec{d}^\top\mathbf{H}_f\vec{d}\bigr),
/// ```
/// where the curvature term is only added when second-order information is in use.
pub(crate) fn evaluate_model(
    f: &DVector<f64>,
    j: &DMatrix<f64>,
    hf: &DMatrix<f64>,
    d: &DVector<f64>,
    use_second_derivatives: bool,
    jd: &mut DVectorViewMut<'_, f64>,
    hd: &mut DVectorViewMut<'_, f64>,
) -> f64 {
    mult_j(j, d, jd);
    *jd += f;
    let mut md = 0.5 * norm2(&*jd).powi(2);
    if use_second_derivatives {
        hd.gemv(1., hf, d, 0.);
        md += 0.5 * d.dot(&*hd);
    }
    md
}

/// Ratio of actual to predicted reduction of `$\frac12\|\vec{f}\|^2$`.
///
/// `md` is the model value from [`evaluate_model`]. Returns `-1` when the
/// model predicts no decrease, so such a step is always rejected.
pub(crate) fn calculate_rho(normf: f64, normfnew: f64, md: f64) -> f64 {
    let actual_reduction = 0.5 * normf.powi(2) - 0.5 * normfnew.powi(2);
    let predicted_reduction = 0.5 * normf.powi(2) - md;
    // also catches NaN
    if !(predicted_reduction > 0.) {
        return -1.;
    }
    let rho = actual_reduction / predicted_reduction;
    if rho.is_nan() {
        -1.
    } else {
        rho
    }
}

/// Update `$\Delta$` from the step quality `rho` and the last step length `w.normd`.
pub(crate) fn update_trust_region_radius(rho: f64, options: &NllsOptions, w: &mut Workspace) {
    let old = w.delta;
    match options.tr_update_strategy {
        TrUpdateStrategy::Classic => {
            if rho < options.eta_successful {
                w.delta *= options.radius_reduce.max(options.radius_reduce_max);
            } else if rho < options.eta_success_but_reduce {
                w.delta *= options.radius_reduce;
            } else if rho < options.eta_very_successful {
                // keep
            } else if rho < options.eta_too_successful {
                // only grow if the radius actually limited the step
                if w.normd >= BOUNDARY_FRACTION * w.delta {
                    w.delta = options
                        .maximum_radius
                        .min(options.radius_increase * w.delta);
                }
            }
        }
        TrUpdateStrategy::Continuous => {
            if rho >= options.eta_too_successful {
                // keep
            } else if rho >= options.eta_successful {
                let factor = (1.
                    - (options.radius_increase - 1.) * (1. - 2. * rho).powi(w.tr_p))
                .max(options.radius_reduce)
                .min(options.radius_increase);
                w.delta = options.maximum_radius.min(w.delta * factor);
                w.tr_nu = options.radius_increase;
            } else {
                w.delta /= w.tr_nu;
                w.tr_nu *= options.radius_increase;
            }
        }
    }
    trace!("rho = {:.3e}: radius {:.3e} -> {:.3e}", rho, old, w.delta);
}
