#[cfg(test)]
use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector, DVectorViewMut};

use super::find_beta;
use crate::error::NllsError;
use crate::linalg::{mult_j, norm2, solve_lls};

/// Powell's dogleg for the Gauss-Newton model.
///
/// Takes the Gauss-Newton step if it fits, the truncated steepest descent
/// step if the Cauchy point lies outside the region, and the point where
/// the path between both crosses the boundary otherwise.
pub(super) fn solve(
    j: &DMatrix<f64>,
    f: &DVector<f64>,
    g: &DVector<f64>,
    delta: f64,
    jg: &mut DVectorViewMut<'_, f64>,
) -> Result<DVector<f64>, NllsError> {
    let d_gn = solve_lls(j, f)?;
    if norm2(&d_gn) <= delta {
        return Ok(d_gn);
    }

    let normg = norm2(g);
    mult_j(j, g, jg);
    let normjg = norm2(&*jg);
    if normg == 0. || normjg == 0. {
        return Ok(DVector::zeros(g.nrows()));
    }
    let alpha = (normg / normjg).powi(2);
    if alpha * normg >= delta {
        return Ok(g * (-delta / normg));
    }

    let d_sd = g * -alpha;
    let diff = &d_gn - &d_sd;
    let beta = find_beta(&d_sd, &diff, delta)?;
    if !(0. ..=1.).contains(&beta) {
        return Err(NllsError::FindBeta);
    }
    Ok(d_sd + diff * beta)
}
