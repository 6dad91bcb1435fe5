//! Second-order information `$\mathbf{H}_f \approx \sum_i f_i\nabla^2 f_i$`.
#[cfg(test)]
use approx::assert_relative_eq;
use log::debug;
use nalgebra::DVector;

use crate::error::{Callback, NllsError};
use crate::inform::NllsInform;
use crate::linalg::norm2;
use crate::options::{Model, NllsOptions, SubproblemMethod};
use crate::problem::NllsProblem;
use crate::workspace::Workspace;

/// Evaluate the exact `$\mathbf{H}_f$` at `x` into `w.hf`.
pub(crate) fn evaluate_hessians<P: NllsProblem>(
    problem: &mut P,
    x: &DVector<f64>,
    w: &mut Workspace,
    inform: &mut NllsInform,
) -> Result<(), NllsError> {
    inform.h_eval += 1;
    problem
        .hessians(x, &w.f, &mut w.hf)
        .map_err(|status| NllsError::Evaluation {
            callback: Callback::Hessians,
            status,
        })
}

/// Whether the solve can ever build its model from `$\mathbf{H}_f$`.
pub(crate) fn needs_second_order(options: &NllsOptions) -> bool {
    options.model != Model::GaussNewton && options.nlls_method != SubproblemMethod::Dogleg
}

/// Refresh `w.hf` after a step was accepted and `w.f`, `w.j`, `w.g` were
/// evaluated at the new `x`.
///
/// Exact Hessians are only evaluated while the model uses them. The secant
/// approximation is updated on every step so it is ready when a hybrid
/// solve switches. Models that never use `$\mathbf{H}_f$` leave it alone.
pub(crate) fn apply_second_order_info<P: NllsProblem>(
    problem: &mut P,
    x: &DVector<f64>,
    options: &NllsOptions,
    w: &mut Workspace,
    inform: &mut NllsInform,
) -> Result<(), NllsError> {
    if !needs_second_order(options) {
        return Ok(());
    }
    if options.exact_second_derivatives {
        if w.use_second_derivatives {
            evaluate_hessians(problem, x, w, inform)?;
        }
    } else {
        w.y.copy_from(&w.g);
        w.y -= &w.g_old;
        w.y_sharp.copy_from(&w.g);
        w.y_sharp -= &w.g_mixed;
        rank_one_update(w);
    }
    Ok(())
}

/// Structured secant update of Dennis, Gay and Welsch (ACM TOMS 7, 1981).
///
/// Expects the step in `w.d`, `$\vec{y} = \vec{g}_{k+1} - \vec{g}_k$` in
/// `w.y` and `$\vec{y}^\sharp = (\mathbf{J}_{k+1} - \mathbf{J}_k)^\top\vec{f}_{k+1}$`
/// in `w.y_sharp`. Afterwards `$\mathbf{H}_f\vec{d} = \vec{y}^\sharp$`.
/// Skipped when `$\vec{y}^\top\vec{d}$` is too small to divide by.
pub(crate) fn rank_one_update(w: &mut Workspace) {
    let yts = w.y.dot(&w.d);
    if !(yts.abs() >= f64::EPSILON.sqrt() * norm2(&w.d) * norm2(&w.y)) || yts == 0. {
        return;
    }

    let mut s = w.arena.scratch();
    s.hd.gemv(1., &w.hf, &w.d, 0.);
    let dhd = w.d.dot(&s.hd);
    let alpha = if dhd == 0. {
        1.
    } else {
        (w.d.dot(&w.y_sharp) / dhd).abs().min(1.)
    };
    w.hf *= alpha;
    s.hd *= alpha;

    // ws = y_sharp - hf d
    w.y_sharp -= &s.hd;
    let ws = &w.y_sharp;
    let wstd = ws.dot(&w.d);
    w.hf.ger(yts.recip(), ws, &w.y, 1.);
    w.hf.ger(yts.recip(), &w.y, ws, 1.);
    w.hf.ger(-wstd / yts.powi(2), &w.y, &w.y, 1.);
}

/// Count iterations for [`Model::Hybrid`] and switch to second-order
/// information once the switch criterion held long enough. Returns whether
/// the switch happened now. The switch is never undone.
///
/// The dogleg has no second-order form, so it keeps the Gauss-Newton model.
pub(crate) fn hybrid_switch(options: &NllsOptions, w: &mut Workspace) -> bool {
    if options.model != Model::Hybrid
        || options.nlls_method == SubproblemMethod::Dogleg
        || w.use_second_derivatives
    {
        return false;
    }
    let ratio = w.norm_jf / (0.5 * w.norm_f.powi(2));
    if ratio < options.hybrid_switch {
        w.hybrid_count += 1;
    } else {
        w.hybrid_count = 0;
    }
    if w.hybrid_count >= options.hybrid_switch_its {
        debug!(
            "switching to second-order model, |J^T f| / (|f|^2 / 2) = {:.3e}",
            ratio
        );
        w.use_second_derivatives = true;
        true
    } else {
        false
    }
}
