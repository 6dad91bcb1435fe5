#[cfg(test)]
use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use crate::problem::NllsProblem;

/// Compute a [numerical approximation](https://en.wikipedia.org/wiki/Numerical_differentiation)
/// to the Jacobian for testing.
///
/// The function is intended to be used for debugging or testing.
/// You can try to check your derivative implementation of an
/// [`NllsProblem`] with this. Only the `residuals` callback is used.
///
/// Column `$j$` is a central difference quotient with step
/// `$h = \epsilon^{1/3}\max(1, |x_j|)$`, improved by one Richardson
/// extrapolation against step `$h/2$`. Computing derivatives numerically
/// is unstable and the precision is well below machine precision, so
/// compare with a tolerance of about `$10^{-8}$`.
///
/// Returns `None` if a residual evaluation fails.
///
/// # Example
///
/// ```
/// # use approx::assert_relative_eq;
/// # use nalgebra::{DMatrix, DVector};
/// # use ral_nlls::{differentiate_numerically, FnProblem, NllsProblem};
/// let mut problem = FnProblem::new(
///     |x: &DVector<f64>, f: &mut DVector<f64>| {
///         f[0] = x[0] * x[1];
///         f[1] = x[0].exp();
///         Ok(())
///     },
///     |x: &DVector<f64>, j: &mut DMatrix<f64>| {
///         j[(0, 0)] = x[1];
///         j[(0, 1)] = x[0];
///         j[(1, 0)] = x[0].exp();
///         j[(1, 1)] = 0.;
///         Ok(())
///     },
/// );
/// let x = DVector::from_vec(vec![0.5, -2.]);
/// let jacobian_numerical = differentiate_numerically(&mut problem, &x, 2).unwrap();
/// let mut jacobian = DMatrix::zeros(2, 2);
/// problem.jacobian(&x, &mut jacobian).unwrap();
/// assert_relative_eq!(jacobian, jacobian_numerical, epsilon = 1e-8);
/// ```
pub fn differentiate_numerically<P: NllsProblem>(
    problem: &mut P,
    x: &DVector<f64>,
    m: usize,
) -> Option<DMatrix<f64>> {
    let n = x.nrows();
    let mut jacobian = DMatrix::zeros(m, n);
    let mut xh = x.clone();
    let mut fp = DVector::zeros(m);
    let mut fm = DVector::zeros(m);
    let h0 = f64::EPSILON.cbrt();

    let mut quotient = |problem: &mut P, xh: &mut DVector<f64>, j: usize, h: f64| {
        xh[j] = x[j] + h;
        problem.residuals(xh, &mut fp).ok()?;
        xh[j] = x[j] - h;
        problem.residuals(xh, &mut fm).ok()?;
        xh[j] = x[j];
        Some((&fp - &fm) / (2. * h))
    };

    for j in 0..n {
        let h = h0 * x[j].abs().max(1.);
        let coarse = quotient(problem, &mut xh, j, h)?;
        let fine = quotient(problem, &mut xh, j, 0.5 * h)?;
        // the O(h^2) error terms cancel
        jacobian.set_column(j, &((4. * fine - coarse) / 3.));
    }
    Some(jacobian)
}
