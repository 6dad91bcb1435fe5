use nalgebra::{DMatrix, DVector};

/// Outcome of a user evaluation. `Err` carries a non-zero status code that
/// is reported back in [`NllsError::Evaluation`](crate::NllsError::Evaluation).
pub type EvalStatus = Result<(), i32>;

/// A nonlinear least squares problem with `$n$` parameters and `$m \geq n$` residuals.
///
/// This is what [`NllsSolver`](crate::NllsSolver) needs to compute the
/// residuals, the Jacobian and, optionally, second derivatives. The output
/// buffers are allocated once per solve and handed in already sized
/// (`$m$` for the residuals, `$m\times n$` for the Jacobian, `$n\times n$` for
/// the Hessians). Any data the callbacks need lives in `self`.
///
/// Returning `Err(status)` aborts the solve, which is also how a caller can
/// stop a running solve early.
pub trait NllsProblem {
    /// Compute the residual vector `$\vec{f}(\vec{x})$`.
    fn residuals(&mut self, x: &DVector<f64>, f: &mut DVector<f64>) -> EvalStatus;

    /// Compute the Jacobian `$\mathbf{J}_{ij} = \partial f_i / \partial x_j$`.
    fn jacobian(&mut self, x: &DVector<f64>, j: &mut DMatrix<f64>) -> EvalStatus;

    /// Compute `$\sum_{i=1}^m f_i\nabla^2 f_i(\vec{x})$`.
    ///
    /// Only called when exact second derivatives are requested. The default
    /// implementation reports failure.
    fn hessians(
        &mut self,
        _x: &DVector<f64>,
        _f: &DVector<f64>,
        _h: &mut DMatrix<f64>,
    ) -> EvalStatus {
        Err(-1)
    }
}

/// A [`NllsProblem`] built from closures.
///
/// ```
/// # use nalgebra::DVector;
/// # use ral_nlls::{FnProblem, NllsSolver};
/// let mut problem = FnProblem::new(
///     |x: &DVector<f64>, f: &mut DVector<f64>| {
///         f[0] = x[0] - 2.;
///         f[1] = x[1] - 3.;
///         Ok(())
///     },
///     |_x: &DVector<f64>, j: &mut nalgebra::DMatrix<f64>| {
///         j.fill_with_identity();
///         Ok(())
///     },
/// );
/// let mut x = DVector::zeros(2);
/// let inform = NllsSolver::new().minimize(&mut x, 2, &mut problem);
/// assert!(inform.is_success());
/// ```
pub struct FnProblem<F, J, H = fn(&DVector<f64>, &DVector<f64>, &mut DMatrix<f64>) -> EvalStatus> {
    eval_f: F,
    eval_j: J,
    eval_hf: Option<H>,
}

impl<F, J> FnProblem<F, J>
where
    F: FnMut(&DVector<f64>, &mut DVector<f64>) -> EvalStatus,
    J: FnMut(&DVector<f64>, &mut DMatrix<f64>) -> EvalStatus,
{
    pub fn new(eval_f: F, eval_j: J) -> Self {
        Self {
            eval_f,
            eval_j,
            eval_hf: None,
        }
    }

    /// Attach the callback computing `$\sum_i f_i\nabla^2 f_i$`.
    pub fn with_hessians<H>(self, eval_hf: H) -> FnProblem<F, J, H>
    where
        H: FnMut(&DVector<f64>, &DVector<f64>, &mut DMatrix<f64>) -> EvalStatus,
    {
        FnProblem {
            eval_f: self.eval_f,
            eval_j: self.eval_j,
            eval_hf: Some(eval_hf),
        }
    }
}

impl<F, J, H> NllsProblem for FnProblem<F, J, H>
where
    F: FnMut(&DVector<f64>, &mut DVector<f64>) -> EvalStatus,
    J: FnMut(&DVector<f64>, &mut DMatrix<f64>) -> EvalStatus,
    H: FnMut(&DVector<f64>, &DVector<f64>, &mut DMatrix<f64>) -> EvalStatus,
{
    fn residuals(&mut self, x: &DVector<f64>, f: &mut DVector<f64>) -> EvalStatus {
        (self.eval_f)(x, f)
    }

    fn jacobian(&mut self, x: &DVector<f64>, j: &mut DMatrix<f64>) -> EvalStatus {
        (self.eval_j)(x, j)
    }

    fn hessians(&mut self, x: &DVector<f64>, f: &DVector<f64>, h: &mut DMatrix<f64>) -> EvalStatus {
        match self.eval_hf.as_mut() {
            Some(eval_hf) => eval_hf(x, f, h),
            None => Err(-1),
        }
    }
}
