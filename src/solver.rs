use log::{debug, info, warn};
use nalgebra::DVector;

use crate::error::{Callback, NllsError};
use crate::inform::{NllsInform, ProgressHistory};
use crate::linalg::{get_svd_j, mult_jt, norm2};
use crate::model::{calculate_rho, evaluate_model, update_trust_region_radius};
use crate::options::{Model, NllsOptions};
use crate::problem::NllsProblem;
use crate::second_order::{
    apply_second_order_info, evaluate_hessians, hybrid_switch, needs_second_order,
};
use crate::subproblem::calculate_step;
use crate::workspace::Workspace;

#[cfg(test)]
mod test_driver;
#[cfg(test)]
pub(crate) mod test_helpers;

/// Helper to keep the problem and the report about it together.
struct Run<'a, P> {
    problem: &'a mut P,
    inform: NllsInform,
}

impl<P: NllsProblem> Run<'_, P> {
    fn counted_residuals(&mut self, x: &DVector<f64>, f: &mut DVector<f64>) -> Result<(), NllsError> {
        self.inform.f_eval += 1;
        self.problem
            .residuals(x, f)
            .map_err(|status| NllsError::Evaluation {
                callback: Callback::Residuals,
                status,
            })
    }

    fn counted_jacobian(&mut self, x: &DVector<f64>, w: &mut Workspace) -> Result<(), NllsError> {
        self.inform.g_eval += 1;
        self.problem
            .jacobian(x, &mut w.j)
            .map_err(|status| NllsError::Evaluation {
                callback: Callback::Jacobian,
                status,
            })
    }

    /// Copy the norms of the current iterate into the report.
    fn update_report(&mut self, w: &Workspace, options: &NllsOptions) {
        self.inform.obj = 0.5 * w.norm_f.powi(2);
        self.inform.norm_g = w.norm_jf;
        self.inform.scaled_g = if w.norm_f > 0. {
            w.norm_jf / w.norm_f
        } else {
            0.
        };
        if self.inform.history.is_some() {
            let svd = if options.calculate_svd_j {
                get_svd_j(&w.j).ok()
            } else {
                None
            };
            self.inform.record(w.norm_f, w.norm_jf, svd);
        }
    }
}

/// Check the residual and gradient tests and flag the ones that hold.
pub(crate) fn test_convergence(options: &NllsOptions, w: &Workspace, inform: &mut NllsInform) -> bool {
    if w.norm_f <= options.stop_f_absolute.max(options.stop_f_relative * w.norm_f0) {
        inform.convergence_normf = true;
    }
    if w.norm_jf <= options.stop_g_absolute.max(options.stop_g_relative * w.norm_jf0) {
        inform.convergence_normg = true;
    }
    inform.convergence_normf || inform.convergence_normg
}

/// Initial trust-region radius.
fn initial_radius(options: &NllsOptions, w: &Workspace) -> f64 {
    if options.relative_tr_radius {
        // largest diagonal entry of J^T J
        let max_diag = w
            .j
            .column_iter()
            .map(|col| col.norm_squared())
            .fold(0., f64::max);
        options.initial_radius_scale * max_diag
    } else if options.initial_radius < 0. {
        w.norm_jf
    } else {
        options.initial_radius
    }
}

/// Trust-region solver for nonlinear least squares.
///
/// See the [module documentation](index.html) for a usage example.
///
/// The runtime and termination behavior is controlled by [`NllsOptions`].
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct NllsSolver {
    options: NllsOptions,
}

impl NllsSolver {
    /// Solver with [default options](NllsOptions::new).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: NllsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NllsOptions {
        &self.options
    }

    /// Try to solve the given least-squares problem with `m` residuals,
    /// starting from `x`.
    ///
    /// On return `x` holds the last accepted iterate, whether the solve
    /// converged or not.
    pub fn minimize<P: NllsProblem>(
        &self,
        x: &mut DVector<f64>,
        m: usize,
        problem: &mut P,
    ) -> NllsInform {
        let mut run = Run {
            problem,
            inform: NllsInform {
                history: self
                    .options
                    .output_progress_vectors
                    .then(ProgressHistory::default),
                ..NllsInform::default()
            },
        };
        match self.solve(x, m, &mut run) {
            Ok(()) => info!(
                "converged after {} iterations: |f| = {:.6e}, |J^T f| = {:.6e}",
                run.inform.iter,
                (2. * run.inform.obj).sqrt(),
                run.inform.norm_g
            ),
            Err(err) => {
                warn!("stopped after {} iterations: {}", run.inform.iter, err);
                run.inform.failure = Some(err);
            }
        }
        run.inform
    }

    fn solve<P: NllsProblem>(
        &self,
        x: &mut DVector<f64>,
        m: usize,
        run: &mut Run<'_, P>,
    ) -> Result<(), NllsError> {
        let options = &self.options;
        let n = x.nrows();
        if n > m {
            return Err(NllsError::NGtM { n, m });
        }
        if options.maxit == 0 {
            return Err(NllsError::Maxits { maxit: 0 });
        }
        let mut w = Workspace::new(n, m)?;

        // Evaluate at the start point
        run.counted_residuals(x, &mut w.f)?;
        run.counted_jacobian(x, &mut w)?;
        mult_jt(&w.j, &w.f, &mut w.g);
        w.norm_f = norm2(&w.f);
        w.norm_jf = norm2(&w.g);
        w.norm_f0 = w.norm_f;
        w.norm_jf0 = w.norm_jf;
        if options.model == Model::Newton {
            w.use_second_derivatives = true;
            if options.exact_second_derivatives {
                evaluate_hessians(&mut *run.problem, x, &mut w, &mut run.inform)?;
            }
        }
        run.update_report(&w, options);
        if test_convergence(options, &w, &mut run.inform) {
            return Ok(());
        }
        w.delta = initial_radius(options, &w);
        debug!(
            "start: |f| = {:.6e}, |J^T f| = {:.6e}, radius = {:.3e}",
            w.norm_f, w.norm_jf, w.delta
        );

        for iter in 1..=options.maxit {
            let mut reductions = 0;
            let rho = loop {
                calculate_step(options, &mut w)?;
                w.xnew.copy_from(x);
                w.xnew += &w.d;
                run.counted_residuals(&w.xnew, &mut w.fnew)?;
                let normfnew = norm2(&w.fnew);
                let md = {
                    let mut s = w.arena.scratch();
                    evaluate_model(
                        &w.f,
                        &w.j,
                        &w.hf,
                        &w.d,
                        w.use_second_derivatives,
                        &mut s.jd,
                        &mut s.hd,
                    )
                };
                let rho = calculate_rho(w.norm_f, normfnew, md);
                update_trust_region_radius(rho, options, &mut w);
                if rho >= options.eta_successful {
                    w.norm_f = normfnew;
                    break rho;
                }
                reductions += 1;
                debug!(
                    "iter {:>4}: rejected step, rho = {:.3e}, radius = {:.3e}",
                    iter, rho, w.delta
                );
                if reductions > options.max_tr_reductions {
                    return Err(NllsError::MaxTrReductions { reductions });
                }
            };

            if w.xnew == *x {
                return Err(NllsError::XNoProgress);
            }
            x.copy_from(&w.xnew);
            core::mem::swap(&mut w.f, &mut w.fnew);
            run.inform.iter = iter;

            if needs_second_order(options) {
                // J_old^T f_new for the secant update
                w.g_old.copy_from(&w.g);
                mult_jt(&w.j, &w.f, &mut w.g_mixed);
            }
            run.counted_jacobian(x, &mut w)?;
            mult_jt(&w.j, &w.f, &mut w.g);
            w.norm_jf = norm2(&w.g);

            apply_second_order_info(&mut *run.problem, x, options, &mut w, &mut run.inform)?;
            if hybrid_switch(options, &mut w) && options.exact_second_derivatives {
                evaluate_hessians(&mut *run.problem, x, &mut w, &mut run.inform)?;
            }

            run.update_report(&w, options);
            debug!(
                "iter {:>4}: |f| = {:.6e}, |J^T f| = {:.6e}, radius = {:.3e}, rho = {:.3e}",
                iter, w.norm_f, w.norm_jf, w.delta, rho
            );
            if test_convergence(options, &w, &mut run.inform) {
                return Ok(());
            }
        }
        Err(NllsError::Maxits {
            maxit: options.maxit,
        })
    }
}
