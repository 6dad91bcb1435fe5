//! Failure reasons reported by the solver.
use std::fmt;

use thiserror::Error;

use crate::options::Model;

/// The user callback that reported a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Residuals,
    Jacobian,
    Hessians,
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Callback::Residuals => "residuals",
            Callback::Jacobian => "jacobian",
            Callback::Hessians => "hessians",
        })
    }
}

/// Reasons for failure of the minimization.
///
/// Every variant maps onto one of the RAL_NLLS integer status codes via
/// [`NllsError::code`], but carries the values that explain the failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NllsError {
    /// The iteration cap was reached before convergence.
    #[error("maximum number of iterations ({maxit}) reached")]
    Maxits { maxit: usize },
    /// Too many consecutive rejected steps within one iteration.
    #[error("trust region radius reduced {reductions} times without an acceptable step")]
    MaxTrReductions { reductions: usize },
    /// A user callback returned a non-zero status.
    #[error("error evaluating {callback} (status {status})")]
    Evaluation { callback: Callback, status: i32 },
    /// A linear-algebra routine failed.
    #[error("{routine} failed (code {code})")]
    FromExternal { routine: &'static str, code: i32 },
    #[error("unsupported model passed in options (code {code})")]
    UnsupportedModel { code: i32 },
    #[error("unsupported subproblem method passed in options (code {code})")]
    UnsupportedMethod { code: i32 },
    /// Over-determined problems only: `$n \leq m$`.
    #[error("n > m is not supported (n = {n}, m = {m})")]
    NGtM { n: usize, m: usize },
    #[error("unsupported trust region update strategy (code {code})")]
    BadTrStrategy { code: i32 },
    #[error("unsupported value of scale (code {code})")]
    BadScaling { code: i32 },
    /// The workspace could not be reserved.
    #[error("failed to allocate a workspace of {bytes} bytes")]
    Allocation { bytes: usize },
    /// An accepted step did not change the parameters.
    #[error("no progress made in x")]
    XNoProgress,
    #[error("unable to find beta on the dogleg path")]
    FindBeta,
    #[error("dogleg requires the Gauss-Newton model, got {model:?}")]
    DoglegModel { model: Model },
    #[error("all eigenvalues are imaginary")]
    AintEigImag,
    #[error("odd matrix dimension ({dim}) sent to the AINT eigensolver")]
    AintEigOdd { dim: usize },
    #[error("More-Sorensen failed to converge within {its} iterations")]
    MsMaxits { its: usize },
    #[error("More-Sorensen tried too many ({shifts}) shifts")]
    MsTooManyShifts { shifts: usize },
    #[error("More-Sorensen made no progress (sigma = {sigma:e})")]
    MsNoProgress { sigma: f64 },
}

impl NllsError {
    /// The RAL_NLLS integer status code.
    pub fn code(&self) -> i32 {
        match self {
            NllsError::Maxits { .. } => -1,
            NllsError::Evaluation { .. } => -2,
            NllsError::UnsupportedModel { .. } => -3,
            NllsError::FromExternal { .. } => -4,
            NllsError::UnsupportedMethod { .. } => -5,
            NllsError::Allocation { .. } => -6,
            NllsError::MaxTrReductions { .. } => -7,
            NllsError::XNoProgress => -8,
            NllsError::NGtM { .. } => -9,
            NllsError::BadTrStrategy { .. } => -10,
            NllsError::FindBeta => -11,
            NllsError::BadScaling { .. } => -12,
            NllsError::DoglegModel { .. } => -101,
            NllsError::AintEigImag => -201,
            NllsError::AintEigOdd { .. } => -202,
            NllsError::MsMaxits { .. } => -301,
            NllsError::MsTooManyShifts { .. } => -302,
            NllsError::MsNoProgress { .. } => -303,
        }
    }

    /// Whether the failure stems from the options or problem dimensions
    /// rather than from the iteration itself.
    ///
    /// Such failures are detected before or at the first step and retrying
    /// with the same configuration cannot succeed.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            NllsError::UnsupportedModel { .. }
                | NllsError::UnsupportedMethod { .. }
                | NllsError::NGtM { .. }
                | NllsError::BadTrStrategy { .. }
                | NllsError::BadScaling { .. }
                | NllsError::DoglegModel { .. }
        )
    }
}
