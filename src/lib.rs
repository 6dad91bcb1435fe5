//! Trust-region solver for nonlinear least squares (RAL_NLLS) using
//! [nalgebra](https://nalgebra.org).
//!
//! The solver tries to find a local minimizer of
//! ```math
//! \min_{\vec{x}\in\R^n}F(\vec{x})\quad\text{where}\quad
//!   F(\vec{x}) = \frac{1}{2}\sum_{i=1}^m \bigl(f_i(\vec{x})\bigr)^2
//! ```
//! for differentiable residual functions `$f_i\!:\R^n\to\R$` with `$m \geq n$`.
//!
//! Every iteration minimizes a quadratic model
//! ```math
//!   m(\vec{d}) = \frac12\|\vec{f} + \mathbf{J}\vec{d}\|^2 + \frac12\vec{d}^\top\mathbf{H}_f\vec{d}
//!   \quad\text{subject to}\quad\|\vec{d}\|\leq\Delta,
//! ```
//! accepts the step if the residuals shrink as predicted and adapts the
//! trust-region radius `$\Delta$`. The term `$\mathbf{H}_f \approx \sum_i f_i\nabla^2 f_i$`
//! is dropped for the Gauss-Newton model and is either evaluated exactly or
//! built from secant updates otherwise.
//!
//! # Inputs
//!
//! You must provide an implementation of [`NllsProblem`] computing
//!
//! - the residual vector `$\vec{x} \mapsto (f_1(\vec{x}), \ldots, f_m(\vec{x}))^\top\in\R^m$`,
//! - its Jacobian `$\mathbf{J} \in \R^{m\times n}$`, defined as
//!   ```math
//!   \mathbf{J} \coloneqq
//!   \begin{pmatrix}
//!   \frac{\partial f_1}{\partial x_1} & \cdots & \frac{\partial f_1}{\partial x_n} \\
//!   \vdots & \ddots & \vdots \\
//!   \frac{\partial f_m}{\partial x_1} & \cdots & \frac{\partial f_m}{\partial x_n}
//!   \end{pmatrix},
//!   ```
//! - and, only if exact second derivatives are requested, `$\sum_i f_i\nabla^2 f_i$`.
//!
//! For small problems [`FnProblem`] wraps plain closures.
//!
//! Finally, you have to provide an initial guess for `$\vec{x}$`. The result
//! typically depends crucially on a good initial value.
//!
//! The model, the subproblem solver and all tolerances are set with
//! [`NllsOptions`]. The defaults are a hybrid model (Gauss-Newton that
//! switches to a secant-updated second-order term close to a non-zero
//! residual solution) and an exact trust-region subproblem solver working
//! in variables scaled by the column norms of the Jacobian.
//!
//! # Usage Example
//!
//! We use `$F(x, y) \coloneqq \frac{1}{2}[(x^2 + y - 11)^2 + (x + y^2 - 7)^2]$` as a [test function](https://en.wikipedia.org/wiki/Himmelblau%27s_function)
//! for this example.
//! In this case we have `$n = 2$` and `$m = 2$` with
//!
//! ```math
//!   f_1(\vec{x}) \coloneqq x_1^2 + x_2 - 11\quad\text{and}\quad
//!   f_2(\vec{x}) \coloneqq x_1 + x_2^2 - 7.
//! ```
//!
//! ```
//! # use nalgebra::{DMatrix, DVector};
//! # use ral_nlls::{EvalStatus, NllsProblem, NllsSolver};
//! struct Himmelblau;
//!
//! impl NllsProblem for Himmelblau {
//!     fn residuals(&mut self, x: &DVector<f64>, f: &mut DVector<f64>) -> EvalStatus {
//!         f[0] = x[0] * x[0] + x[1] - 11.;
//!         f[1] = x[0] + x[1] * x[1] - 7.;
//!         Ok(())
//!     }
//!
//!     fn jacobian(&mut self, x: &DVector<f64>, j: &mut DMatrix<f64>) -> EvalStatus {
//!         j[(0, 0)] = 2. * x[0];
//!         j[(0, 1)] = 1.;
//!         j[(1, 0)] = 1.;
//!         j[(1, 1)] = 2. * x[1];
//!         Ok(())
//!     }
//! }
//!
//! let mut x = DVector::from_vec(vec![1., 1.]);
//! let inform = NllsSolver::new().minimize(&mut x, 2, &mut Himmelblau);
//! assert!(inform.failure.is_none());
//! assert!(inform.obj < 1e-10);
//! ```
//!
//! # Derivative checking
//!
//! Wrong Jacobians are the most common reason for poor convergence. You can
//! compare yours against a finite difference approximation with
//! [`differentiate_numerically`].
//!
//! # Logging
//!
//! The solver reports through the [`log`](https://docs.rs/log) facade: the
//! outcome at `info`/`warn`, one line per iteration at `debug` and the
//! subproblem details at `trace`.

mod error;
mod inform;
mod linalg;
mod model;
mod options;
mod problem;
mod second_order;
mod solver;
mod subproblem;
mod utils;
mod workspace;

pub use error::{Callback, NllsError};
pub use inform::{NllsInform, ProgressHistory};
pub use linalg::{get_svd_j, mult_j, mult_jt, norm2};
pub use options::{Model, NllsOptions, Scaling, SubproblemMethod, TrUpdateStrategy};
pub use problem::{EvalStatus, FnProblem, NllsProblem};
pub use solver::NllsSolver;

pub use utils::differentiate_numerically;
