//! Finite-difference gradient of the loss.
//!
//! Each coordinate uses a central difference when the box leaves room on
//! both sides, otherwise a one-sided difference into the box. Perturbed
//! points are fresh solutions sharing the solve's random-number discipline.

use crate::solver::Session;
use so_core::{
    errors::{Error, Result},
    Real, Size,
};
use so_math::{Array, LinearConstraints};
use so_models::Solution;

/// Difference scheme for one coordinate, with the step on each side used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Scheme {
    Central(Real),
    Forward(Real),
    Backward(Real),
    /// The box pins the coordinate; its partial derivative is taken as zero.
    Fixed,
}

/// Scheme for coordinate `i` of `x` given the box and the nominal step `h`.
pub(crate) fn scheme(constraints: &LinearConstraints, x: &Array, i: usize, h: Real) -> Scheme {
    let down = x[i] - constraints.lower()[i];
    let up = constraints.upper()[i] - x[i];
    let step = match (down < h, up < h) {
        (false, false) => return Scheme::Central(h),
        (true, false) => Scheme::Forward(h.min(up)),
        (false, true) => Scheme::Backward(h.min(down)),
        (true, true) if up >= down => Scheme::Forward(up),
        (true, true) => Scheme::Backward(down),
    };
    match step {
        Scheme::Forward(s) | Scheme::Backward(s) if s <= 0.0 => Scheme::Fixed,
        other => other,
    }
}

/// Estimate `∇loss` at `current` with `replications` per perturbed point.
///
/// Returns `Ok(None)` when the budget cannot pay for the next perturbed
/// point and [`Error::ZeroGradientEstimate`] when every partial is zero.
pub(crate) fn estimate(
    session: &mut Session<'_>,
    constraints: &LinearConstraints,
    current: &Solution,
    step: Real,
    replications: Size,
) -> Result<Option<Array>> {
    let x = current.x();
    let f_x = session.loss(current);
    let mut gradient = Array::zeros(x.size());

    for i in 0..x.size() {
        let (h_plus, h_minus) = match scheme(constraints, x, i, step) {
            Scheme::Central(h) => (h, h),
            Scheme::Forward(h) => (h, 0.0),
            Scheme::Backward(h) => (0.0, h),
            Scheme::Fixed => continue,
        };

        let Some(f_plus) = side_loss(session, x, i, h_plus, f_x, replications)? else {
            return Ok(None);
        };
        let Some(f_minus) = side_loss(session, x, i, -h_minus, f_x, replications)? else {
            return Ok(None);
        };
        gradient[i] = (f_plus - f_minus) / (h_plus + h_minus);
    }

    if gradient.iter().all(|&g| g == 0.0) {
        return Err(Error::ZeroGradientEstimate);
    }
    Ok(Some(gradient))
}

/// Loss at `x` with coordinate `i` shifted by `offset`; `None` when the
/// budget cannot pay for it.
fn side_loss(
    session: &mut Session<'_>,
    x: &Array,
    i: usize,
    offset: Real,
    f_x: Real,
    replications: Size,
) -> Result<Option<Real>> {
    if offset == 0.0 {
        return Ok(Some(f_x));
    }
    if !session.can_afford(replications) {
        return Ok(None);
    }
    let mut point = x.clone();
    point[i] += offset;
    let solution = session.evaluate(point, replications)?;
    Ok(Some(session.loss(&solution)))
}
