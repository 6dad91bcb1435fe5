//! Configuration of a solve.
use crate::error::NllsError;

/// Quadratic model used to build the trust-region subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// `$\mathbf{J}^\top\mathbf{J}$` as curvature, no second derivatives.
    GaussNewton,
    /// `$\mathbf{J}^\top\mathbf{J} + \sum_i f_i\nabla^2 f_i$`, exact or secant.
    Newton,
    /// Start with Gauss-Newton and switch to [`Model::Newton`] once near a solution.
    Hybrid,
}

impl TryFrom<i32> for Model {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self, NllsError> {
        match code {
            1 => Ok(Model::GaussNewton),
            2 => Ok(Model::Newton),
            3 => Ok(Model::Hybrid),
            _ => Err(NllsError::UnsupportedModel { code }),
        }
    }
}

/// Method used to solve the trust-region subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubproblemMethod {
    /// Powell's dogleg.
    Dogleg,
    /// The eigenvalue method of Adachi, Iwata, Nakatsukasa and Takeda.
    Aint,
    /// More-Sorensen shift iteration.
    MoreSorensen,
    /// Secular equation in the eigenbasis of the model Hessian.
    Dtrs,
}

impl TryFrom<i32> for SubproblemMethod {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self, NllsError> {
        match code {
            1 => Ok(SubproblemMethod::Dogleg),
            2 => Ok(SubproblemMethod::Aint),
            3 => Ok(SubproblemMethod::MoreSorensen),
            4 => Ok(SubproblemMethod::Dtrs),
            _ => Err(NllsError::UnsupportedMethod { code }),
        }
    }
}

/// How the trust-region radius reacts to `$\rho$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrUpdateStrategy {
    /// Step function on the `eta_*` thresholds.
    Classic,
    /// Continuous update of Nielsen (IMM-REP-1999-05).
    Continuous,
}

impl TryFrom<i32> for TrUpdateStrategy {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self, NllsError> {
        match code {
            1 => Ok(TrUpdateStrategy::Classic),
            2 => Ok(TrUpdateStrategy::Continuous),
            _ => Err(NllsError::BadTrStrategy { code }),
        }
    }
}

/// Variable scaling applied by the More-Sorensen and DTRS subproblem solvers.
///
/// The default is [`Scaling::Jacobian`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    None,
    /// `$W_{ii} = \|\mathbf{J}\vec{e}_i\|_2$`, the scaling used by GSL.
    Jacobian,
    /// `$W_{ii}$` is the 2-norm of row `$i$` of the model Hessian.
    Hessian,
}

impl TryFrom<i32> for Scaling {
    type Error = NllsError;

    fn try_from(code: i32) -> Result<Self, NllsError> {
        match code {
            0 => Ok(Scaling::None),
            1 => Ok(Scaling::Jacobian),
            2 => Ok(Scaling::Hessian),
            _ => Err(NllsError::BadScaling { code }),
        }
    }
}

/// Options of the trust-region solver.
///
/// Build with [`NllsOptions::new`] and the `with_*` methods. The options are
/// read-only during a solve.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NllsOptions {
    pub(crate) maxit: usize,
    pub(crate) model: Model,
    pub(crate) nlls_method: SubproblemMethod,
    pub(crate) stop_g_absolute: f64,
    pub(crate) stop_g_relative: f64,
    pub(crate) stop_f_absolute: f64,
    pub(crate) stop_f_relative: f64,
    pub(crate) relative_tr_radius: bool,
    pub(crate) initial_radius_scale: f64,
    pub(crate) initial_radius: f64,
    pub(crate) maximum_radius: f64,
    pub(crate) eta_successful: f64,
    pub(crate) eta_success_but_reduce: f64,
    pub(crate) eta_very_successful: f64,
    pub(crate) eta_too_successful: f64,
    pub(crate) radius_increase: f64,
    pub(crate) radius_reduce: f64,
    pub(crate) radius_reduce_max: f64,
    pub(crate) tr_update_strategy: TrUpdateStrategy,
    pub(crate) max_tr_reductions: usize,
    pub(crate) hybrid_switch: f64,
    pub(crate) hybrid_switch_its: usize,
    pub(crate) exact_second_derivatives: bool,
    pub(crate) scale: Scaling,
    pub(crate) scale_max: f64,
    pub(crate) scale_min: f64,
    pub(crate) scale_trim_max: bool,
    pub(crate) scale_trim_min: bool,
    pub(crate) scale_require_increase: bool,
    pub(crate) calculate_svd_j: bool,
    pub(crate) more_sorensen_maxits: usize,
    pub(crate) more_sorensen_shift: f64,
    pub(crate) more_sorensen_tiny: f64,
    pub(crate) more_sorensen_tol: f64,
    pub(crate) output_progress_vectors: bool,
}

impl NllsOptions {
    pub fn new() -> Self {
        Self {
            maxit: 100,
            model: Model::Hybrid,
            nlls_method: SubproblemMethod::Dtrs,
            stop_g_absolute: 1.0e-5,
            stop_g_relative: 1.0e-8,
            stop_f_absolute: 1.0e-8,
            stop_f_relative: 1.0e-8,
            relative_tr_radius: false,
            initial_radius_scale: 1.0,
            initial_radius: 100.0,
            maximum_radius: 1.0e8,
            eta_successful: 1.0e-8,
            eta_success_but_reduce: 1.0e-8,
            eta_very_successful: 0.9,
            eta_too_successful: 2.0,
            radius_increase: 2.0,
            radius_reduce: 0.5,
            radius_reduce_max: 0.0625,
            tr_update_strategy: TrUpdateStrategy::Classic,
            max_tr_reductions: 100,
            hybrid_switch: 2.0,
            hybrid_switch_its: 1,
            exact_second_derivatives: false,
            scale: Scaling::Jacobian,
            scale_max: 1.0e11,
            scale_min: 1.0e-11,
            scale_trim_max: true,
            scale_trim_min: true,
            scale_require_increase: false,
            calculate_svd_j: true,
            more_sorensen_maxits: 500,
            more_sorensen_shift: 1.0e-13,
            more_sorensen_tiny: 10.0 * f64::EPSILON,
            more_sorensen_tol: 1.0e-3,
            output_progress_vectors: false,
        }
    }

    /// Set the maximal number of iterations.
    ///
    /// Zero is allowed and makes the solve stop with
    /// [`NllsError::Maxits`] before evaluating anything.
    pub fn with_maxit(self, maxit: usize) -> Self {
        Self { maxit, ..self }
    }

    pub fn with_model(self, model: Model) -> Self {
        Self { model, ..self }
    }

    pub fn with_method(self, nlls_method: SubproblemMethod) -> Self {
        Self {
            nlls_method,
            ..self
        }
    }

    /// Set the gradient tolerances.
    ///
    /// The solve converges when
    /// ```math
    ///   \|\mathbf{J}^\top\vec{f}\| \leq \max(\mathtt{absolute}, \mathtt{relative}\cdot\|\mathbf{J}_0^\top\vec{f}_0\|).
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if a tolerance is negative.
    pub fn with_stop_g(self, absolute: f64, relative: f64) -> Self {
        assert!(absolute >= 0., "stop_g_absolute must be >= 0");
        assert!(relative >= 0., "stop_g_relative must be >= 0");
        Self {
            stop_g_absolute: absolute,
            stop_g_relative: relative,
            ..self
        }
    }

    /// Set the residual tolerances.
    ///
    /// The solve converges when
    /// `$\|\vec{f}\| \leq \max(\mathtt{absolute}, \mathtt{relative}\cdot\|\vec{f}_0\|)$`.
    ///
    /// # Panics
    ///
    /// Panics if a tolerance is negative.
    pub fn with_stop_f(self, absolute: f64, relative: f64) -> Self {
        assert!(absolute >= 0., "stop_f_absolute must be >= 0");
        assert!(relative >= 0., "stop_f_relative must be >= 0");
        Self {
            stop_f_absolute: absolute,
            stop_f_relative: relative,
            ..self
        }
    }

    /// Set the initial trust-region radius.
    ///
    /// A negative value means "use `$\|\mathbf{J}_0^\top\vec{f}_0\|$`".
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{radius} = 0$`.
    pub fn with_initial_radius(self, initial_radius: f64) -> Self {
        assert!(initial_radius != 0., "initial_radius must be non-zero");
        Self {
            initial_radius,
            relative_tr_radius: false,
            ..self
        }
    }

    /// Scale the initial radius from the initial Jacobian instead:
    /// `$\Delta_0 = \mathtt{scale}\cdot\max_i (\mathbf{J}_0^\top\mathbf{J}_0)_{ii}$`.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{scale} \leq 0$`.
    pub fn with_relative_radius(self, initial_radius_scale: f64) -> Self {
        assert!(
            initial_radius_scale > 0.,
            "initial_radius_scale must be > 0"
        );
        Self {
            initial_radius_scale,
            relative_tr_radius: true,
            ..self
        }
    }

    /// # Panics
    ///
    /// Panics if `$\mathtt{maximum\_radius} \leq 0$`.
    pub fn with_maximum_radius(self, maximum_radius: f64) -> Self {
        assert!(maximum_radius > 0., "maximum_radius must be > 0");
        Self {
            maximum_radius,
            ..self
        }
    }

    /// Set the thresholds on `$\rho$`.
    ///
    /// A step is accepted if `$\rho \geq \mathtt{successful}$`, accepted but the
    /// radius reduced below `success_but_reduce`, and the radius grows
    /// for `$\rho \in [\mathtt{very\_successful}, \mathtt{too\_successful})$`.
    ///
    /// # Panics
    ///
    /// Panics unless `$0 \leq \mathtt{successful} \leq \mathtt{success\_but\_reduce} \leq \mathtt{very\_successful} \leq \mathtt{too\_successful}$`.
    pub fn with_eta(
        self,
        successful: f64,
        success_but_reduce: f64,
        very_successful: f64,
        too_successful: f64,
    ) -> Self {
        assert!(
            0. <= successful
                && successful <= success_but_reduce
                && success_but_reduce <= very_successful
                && very_successful <= too_successful,
            "eta thresholds must be non-negative and ordered"
        );
        Self {
            eta_successful: successful,
            eta_success_but_reduce: success_but_reduce,
            eta_very_successful: very_successful,
            eta_too_successful: too_successful,
            ..self
        }
    }

    /// Set the radius growth and reduction factors.
    ///
    /// # Panics
    ///
    /// Panics unless `$\mathtt{increase} > 1$` and both reduction factors lie
    /// in `$(0, 1)$`.
    pub fn with_radius_factors(self, increase: f64, reduce: f64, reduce_max: f64) -> Self {
        assert!(increase > 1., "radius_increase must be > 1");
        assert!(reduce > 0. && reduce < 1., "radius_reduce must be in (0, 1)");
        assert!(
            reduce_max > 0. && reduce_max < 1.,
            "radius_reduce_max must be in (0, 1)"
        );
        Self {
            radius_increase: increase,
            radius_reduce: reduce,
            radius_reduce_max: reduce_max,
            ..self
        }
    }

    pub fn with_tr_update_strategy(self, tr_update_strategy: TrUpdateStrategy) -> Self {
        Self {
            tr_update_strategy,
            ..self
        }
    }

    /// Set the number of consecutive rejected steps allowed per iteration.
    pub fn with_max_tr_reductions(self, max_tr_reductions: usize) -> Self {
        Self {
            max_tr_reductions,
            ..self
        }
    }

    /// Configure the switch of [`Model::Hybrid`] to second-order information.
    ///
    /// The switch happens once `$\|\mathbf{J}^\top\vec{f}\| / (\frac12\|\vec{f}\|^2) < \mathtt{tol}$`
    /// held for `its` consecutive iterations.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{tol} \leq 0$` or `$\mathtt{its} = 0$`.
    pub fn with_hybrid_switch(self, tol: f64, its: usize) -> Self {
        assert!(tol > 0., "hybrid_switch must be > 0");
        assert!(its > 0, "hybrid_switch_its must be > 0");
        Self {
            hybrid_switch: tol,
            hybrid_switch_its: its,
            ..self
        }
    }

    /// Use the user supplied `hessians` callback instead of a secant approximation.
    pub fn with_exact_second_derivatives(self, exact_second_derivatives: bool) -> Self {
        Self {
            exact_second_derivatives,
            ..self
        }
    }

    pub fn with_scaling(self, scale: Scaling) -> Self {
        Self { scale, ..self }
    }

    /// Set the bounds applied to the squared scaling entries.
    ///
    /// Entries outside `$[\mathtt{min}, \mathtt{max}]$` are clamped when the
    /// matching `trim` flag is set and reset to one otherwise.
    ///
    /// # Panics
    ///
    /// Panics unless `$0 < \mathtt{min} \leq \mathtt{max}$`.
    pub fn with_scale_bounds(
        self,
        min: f64,
        max: f64,
        trim_min: bool,
        trim_max: bool,
    ) -> Self {
        assert!(min > 0. && min <= max, "scale bounds must satisfy 0 < min <= max");
        Self {
            scale_min: min,
            scale_max: max,
            scale_trim_min: trim_min,
            scale_trim_max: trim_max,
            ..self
        }
    }

    /// Only ever let the scaling entries grow between iterations.
    pub fn with_scale_require_increase(self, scale_require_increase: bool) -> Self {
        Self {
            scale_require_increase,
            ..self
        }
    }

    /// Record the extreme singular values of `$\mathbf{J}$` in the progress history.
    pub fn with_calculate_svd_j(self, calculate_svd_j: bool) -> Self {
        Self {
            calculate_svd_j,
            ..self
        }
    }

    /// Tune the More-Sorensen subproblem solver.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{maxits} = 0$` or a tolerance is negative.
    pub fn with_more_sorensen(self, maxits: usize, shift: f64, tiny: f64, tol: f64) -> Self {
        assert!(maxits > 0, "more_sorensen_maxits must be > 0");
        assert!(
            shift >= 0. && tiny >= 0. && tol > 0.,
            "More-Sorensen tolerances must be non-negative"
        );
        Self {
            more_sorensen_maxits: maxits,
            more_sorensen_shift: shift,
            more_sorensen_tiny: tiny,
            more_sorensen_tol: tol,
            ..self
        }
    }

    /// Keep per-iteration residual and gradient norms in [`NllsInform::history`](crate::NllsInform).
    pub fn with_progress_vectors(self, output_progress_vectors: bool) -> Self {
        Self {
            output_progress_vectors,
            ..self
        }
    }

    pub fn maxit(&self) -> usize {
        self.maxit
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn method(&self) -> SubproblemMethod {
        self.nlls_method
    }
}

impl Default for NllsOptions {
    fn default() -> Self {
        Self::new()
    }
}
