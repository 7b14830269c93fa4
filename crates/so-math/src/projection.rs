//! Euclidean projection onto a polyhedron.
//!
//! [`ProjectionQp`] finds the point of `{z : C_E z = d_E, C_I z ≤ d_I}`
//! nearest to a target `y`, i.e. it solves `min ½‖z − y‖²`. It is a primal
//! active-set method and must be started from a feasible point: each
//! iteration solves the equality-constrained subproblem on the working set
//! by least squares, then either steps (adding the first blocking row) or,
//! at a stationary point, drops the inequality with the most negative
//! multiplier.

use crate::{array::Array, comparison::argmin_first, constraints::StackedConstraints};
use nalgebra::{DMatrix, DVector};
use so_core::{
    errors::{Error, Result},
    Real,
};

/// Terminal status of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpStatus {
    /// KKT conditions hold within tolerance.
    Optimal,
    /// The iteration cap was hit first.
    IterationLimit,
}

/// Result of [`ProjectionQp::project`].
#[derive(Debug, Clone)]
pub struct QpSolution {
    /// Terminal status.
    pub status: QpStatus,
    /// Projected point.
    pub z: Array,
    /// Working-set rows at termination (indices into the stacked matrix).
    pub working_set: Vec<usize>,
    /// Iterations performed.
    pub iterations: usize,
}

/// Nearest-point solver over a stacked constraint set.
#[derive(Debug, Clone)]
pub struct ProjectionQp<'a> {
    constraints: &'a StackedConstraints,
    tol: Real,
    max_iterations: usize,
}

impl<'a> ProjectionQp<'a> {
    /// Projection onto `constraints` with the default tolerance `1e-10`.
    pub fn new(constraints: &'a StackedConstraints) -> Self {
        Self {
            constraints,
            tol: 1e-10,
            max_iterations: 500,
        }
    }

    /// Stationarity and blocking tolerance.
    pub fn tolerance(mut self, tol: Real) -> Self {
        self.tol = tol;
        self
    }

    /// Cap on active-set iterations.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Project `target`, starting from the feasible point `start`.
    pub fn project(&self, target: &Array, start: &Array) -> Result<QpSolution> {
        let cs = self.constraints;
        let n = target.size();
        if start.size() != n || cs.c.cols() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: if start.size() != n { start.size() } else { cs.c.cols() },
            });
        }

        let mut z = start.clone();
        let mut working: Vec<usize> = (0..cs.n_eq).collect();

        for iteration in 0..self.max_iterations {
            let g = &z - target;
            let (p, lambda) = self.subproblem(&working, &g)?;

            if p.norm() <= self.tol * (1.0 + g.norm()) {
                // μ = −λ are the KKT multipliers of the working rows.
                let inequality_mu = working
                    .iter()
                    .zip(lambda.iter())
                    .map(|(&row, l)| if cs.is_equality(row) { Real::INFINITY } else { -l });
                match argmin_first(inequality_mu) {
                    Some((pos, mu)) if mu < -self.tol => {
                        tracing::trace!(row = working[pos], mu, "projection drops row");
                        working.remove(pos);
                        continue;
                    }
                    _ => {
                        return Ok(QpSolution {
                            status: QpStatus::Optimal,
                            z,
                            working_set: working,
                            iterations: iteration,
                        })
                    }
                }
            }

            // Ratio test over rows outside the working set.
            let mut step = 1.0;
            let mut blocking = None;
            for row in cs.n_eq..cs.rows() {
                if working.contains(&row) {
                    continue;
                }
                let rate = cs.c.row_dot(row, &p);
                if rate <= self.tol {
                    continue;
                }
                let t = (cs.slack(row, &z) / rate).max(0.0);
                if t < step {
                    step = t;
                    blocking = Some(row);
                }
            }
            z = &z + &p.scale(step);
            if let Some(row) = blocking {
                working.push(row);
            }
        }

        Ok(QpSolution {
            status: QpStatus::IterationLimit,
            z,
            working_set: working,
            iterations: self.max_iterations,
        })
    }

    /// Minimum-norm `p = A_Wᵀλ − g` with `A_W p = 0`, where `λ` is the
    /// least-squares solution of `A_Wᵀλ = g`.
    fn subproblem(&self, working: &[usize], g: &Array) -> Result<(Array, Array)> {
        if working.is_empty() {
            return Ok((-g, Array::zeros(0)));
        }
        let a_w: DMatrix<Real> = self.constraints.c.select_rows(working).into();
        let a_wt = a_w.transpose();
        let rhs = DVector::from_column_slice(g.as_slice());
        let lambda = a_wt
            .clone()
            .svd(true, true)
            .solve(&rhs, 1e-12)
            .map_err(|e| Error::Runtime(format!("working-set least squares: {e}")))?;
        let p = &a_wt * &lambda - rhs;
        Ok((Array::from(p), Array::from(lambda)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constraints::LinearConstraints, matrix::Matrix};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn halfplane_and_box() -> StackedConstraints {
        // x + y ≤ 1, 0 ≤ x, y ≤ 2
        LinearConstraints::new(Array::zeros(2), Array::from_element(2, 2.0))
            .unwrap()
            .with_inequality(
                Matrix::from_row_slice(1, 2, &[1.0, 1.0]),
                Array::from_slice(&[1.0]),
            )
            .unwrap()
            .stacked()
    }

    #[test]
    fn feasible_target_is_fixed() {
        let cs = halfplane_and_box();
        let y = Array::from_slice(&[0.2, 0.3]);
        let sol = ProjectionQp::new(&cs).project(&y, &Array::zeros(2)).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert_abs_diff_eq!((&sol.z - &y).norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn projects_onto_facet() {
        let cs = halfplane_and_box();
        let sol = ProjectionQp::new(&cs)
            .project(&Array::from_slice(&[1.0, 1.0]), &Array::zeros(2))
            .unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert_abs_diff_eq!(sol.z[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(sol.z[1], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn projects_onto_vertex() {
        let cs = halfplane_and_box();
        let sol = ProjectionQp::new(&cs)
            .project(&Array::from_slice(&[3.0, -1.0]), &Array::zeros(2))
            .unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert_abs_diff_eq!(sol.z[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sol.z[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn equality_rows_stay_active() {
        let cs = LinearConstraints::unbounded(2)
            .with_equality(
                Matrix::from_row_slice(1, 2, &[1.0, 1.0]),
                Array::from_slice(&[1.0]),
            )
            .unwrap()
            .stacked();
        let sol = ProjectionQp::new(&cs)
            .project(&Array::from_slice(&[2.0, 0.0]), &Array::from_slice(&[0.0, 1.0]))
            .unwrap();
        assert_abs_diff_eq!(sol.z[0], 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(sol.z[1], -0.5, epsilon = 1e-9);
        assert_eq!(sol.working_set, vec![0]);
    }

    #[test]
    fn iteration_cap_reported() {
        let cs = halfplane_and_box();
        let sol = ProjectionQp::new(&cs)
            .max_iterations(0)
            .project(&Array::from_slice(&[3.0, 3.0]), &Array::zeros(2))
            .unwrap();
        assert_eq!(sol.status, QpStatus::IterationLimit);
    }

    proptest! {
        #[test]
        fn projection_is_feasible_and_no_farther_than_start(
            a in -5.0f64..5.0,
            b in -5.0f64..5.0,
        ) {
            let cs = halfplane_and_box();
            let y = Array::from_slice(&[a, b]);
            let start = Array::zeros(2);
            let sol = ProjectionQp::new(&cs).project(&y, &start).unwrap();
            prop_assert_eq!(sol.status, QpStatus::Optimal);
            for row in 0..cs.rows() {
                prop_assert!(cs.slack(row, &sol.z) >= -1e-9);
            }
            prop_assert!((&sol.z - &y).norm() <= (&start - &y).norm() + 1e-9);
        }
    }
}
