//! Diagnostics returned by a solve.
use crate::error::NllsError;

/// Per-iteration history, kept when requested with
/// [`NllsOptions::with_progress_vectors`](crate::NllsOptions::with_progress_vectors).
///
/// Entry `$k$` belongs to iterate `$\vec{x}_k$`, entry 0 to the initial guess.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressHistory {
    /// `$\|\vec{f}(\vec{x}_k)\|$`
    pub resvec: Vec<f64>,
    /// `$\|\mathbf{J}^\top\vec{f}\|$` at `$\vec{x}_k$`
    pub gradvec: Vec<f64>,
    /// Smallest singular value of `$\mathbf{J}(\vec{x}_k)$`, if computed.
    pub smallest_sv: Vec<f64>,
    /// Largest singular value of `$\mathbf{J}(\vec{x}_k)$`, if computed.
    pub largest_sv: Vec<f64>,
}

/// Information about the minimization.
///
/// Use this to inspect the minimization process. Most importantly
/// you may want to check if there was a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct NllsInform {
    pub failure: Option<NllsError>,
    /// Number of accepted iterations.
    pub iter: usize,
    /// Residual evaluations.
    pub f_eval: usize,
    /// Jacobian evaluations.
    pub g_eval: usize,
    /// Evaluations of the Hessians of the residuals.
    pub h_eval: usize,
    /// The test on `$\|\vec{f}\|$` was satisfied.
    pub convergence_normf: bool,
    /// The test on `$\|\mathbf{J}^\top\vec{f}\|$` was satisfied.
    pub convergence_normg: bool,
    /// `$\frac12\|\vec{f}\|^2$` at the returned parameters.
    pub obj: f64,
    /// `$\|\mathbf{J}^\top\vec{f}\|$` at the returned parameters.
    pub norm_g: f64,
    /// `$\|\mathbf{J}^\top\vec{f}\| / \|\vec{f}\|$` at the returned parameters.
    pub scaled_g: f64,
    pub history: Option<ProgressHistory>,
}

impl NllsInform {
    /// `Ok` if the solve converged.
    pub fn status(&self) -> Result<(), &NllsError> {
        match &self.failure {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Human readable description of the failure, empty on success.
    pub fn error_message(&self) -> String {
        self.failure
            .as_ref()
            .map(|err| err.to_string())
            .unwrap_or_default()
    }

    pub(crate) fn record(&mut self, normf: f64, normg: f64, svd: Option<(f64, f64)>) {
        if let Some(history) = self.history.as_mut() {
            history.resvec.push(normf);
            history.gradvec.push(normg);
            if let Some((s1, sn)) = svd {
                history.largest_sv.push(s1);
                history.smallest_sv.push(sn);
            }
        }
    }
}

impl Default for NllsInform {
    fn default() -> Self {
        Self {
            failure: None,
            iter: 0,
            f_eval: 0,
            g_eval: 0,
            h_eval: 0,
            convergence_normf: false,
            convergence_normg: false,
            obj: f64::MAX,
            norm_g: f64::MAX,
            scaled_g: f64::MAX,
            history: None,
        }
    }
}
