//! Feasibility services shared by the solvers.
//!
//! [`FeasibilityEngine`] wraps a problem's [`LinearConstraints`] and answers
//! three questions: is a point feasible, where is a feasible point (phase-one
//! LP), and what is the smallest correction that makes a point feasible
//! (Euclidean projection QP).

use so_core::{
    ensure,
    errors::{Error, Result},
    Real,
};
use so_math::{
    Array, LinearConstraints, LinearProgram, LpStatus, ProjectionQp, QpStatus, StackedConstraints,
};
use so_models::Problem;
use tracing::trace;

/// Phase-one search, feasibility test and projection over one constraint set.
#[derive(Debug, Clone)]
pub struct FeasibilityEngine {
    constraints: LinearConstraints,
    stacked: StackedConstraints,
    tol: Real,
}

impl FeasibilityEngine {
    /// Engine over `constraints` with feasibility tolerance `tol`.
    pub fn new(constraints: &LinearConstraints, tol: Real) -> Self {
        Self {
            constraints: constraints.clone(),
            stacked: constraints.stacked(),
            tol,
        }
    }

    /// Engine over the constraints of `problem`.
    pub fn from_problem(problem: &dyn Problem, tol: Real) -> Self {
        Self::new(problem.constraints(), tol)
    }

    /// Feasibility tolerance.
    pub fn tolerance(&self) -> Real {
        self.tol
    }

    /// The wrapped constraint set.
    pub fn constraints(&self) -> &LinearConstraints {
        &self.constraints
    }

    /// The stacked `(C, d, n_eq)` form.
    pub fn stacked(&self) -> &StackedConstraints {
        &self.stacked
    }

    /// Whether `x` satisfies every block and bound within the tolerance.
    pub fn is_feasible(&self, x: &Array) -> bool {
        self.constraints.is_feasible(x, self.tol)
    }

    /// `initial` if it is feasible, otherwise a vertex of the feasible region.
    pub fn find_feasible_point(&self, initial: &Array) -> Result<Array> {
        if self.constraints.is_unconstrained() || self.is_feasible(initial) {
            return Ok(initial.clone());
        }

        let n = self.constraints.dim();
        let mut lp = LinearProgram::new(Array::zeros(n)).bounds(
            self.constraints.lower().clone(),
            self.constraints.upper().clone(),
        )?;
        if let Some(eq) = self.constraints.equality() {
            lp = lp.equalities(eq.matrix.clone(), eq.rhs.clone())?;
        }
        if let Some(ineq) = self.constraints.inequality() {
            lp = lp.inequalities(ineq.matrix.clone(), ineq.rhs.clone())?;
        }

        let solution = lp.solve()?;
        trace!(status = ?solution.status, iterations = solution.iterations, "phase-one LP");
        if solution.status != LpStatus::Optimal {
            return Err(Error::InfeasibleRegion(format!(
                "phase-one LP ended with status {:?}",
                solution.status
            )));
        }
        if !self.is_feasible(&solution.x) {
            return Err(Error::InfeasibleRegion(
                "phase-one LP returned a point outside the constraints".into(),
            ));
        }
        Ok(solution.x)
    }

    /// Minimum-norm correction `d` making `x + d` feasible; zero when `x`
    /// is already feasible.
    pub fn project_direction(&self, x: &Array) -> Result<Array> {
        if self.is_feasible(x) {
            return Ok(Array::zeros(x.size()));
        }
        let start = self.find_feasible_point(x)?;
        self.project_direction_from(x, &start)
    }

    /// [`project_direction`](Self::project_direction) warm-started at the
    /// feasible point `start`.
    pub fn project_direction_from(&self, x: &Array, start: &Array) -> Result<Array> {
        if self.is_feasible(x) {
            return Ok(Array::zeros(x.size()));
        }
        ensure!(
            self.is_feasible(start),
            "projection must start from a feasible point"
        );
        let solution = ProjectionQp::new(&self.stacked).project(x, start)?;
        trace!(status = ?solution.status, iterations = solution.iterations, "projection QP");
        if solution.status != QpStatus::Optimal {
            return Err(Error::InfeasibleRegion(format!(
                "projection QP ended with status {:?}",
                solution.status
            )));
        }
        Ok(&solution.z - x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use so_math::Matrix;

    fn simplex_constraints() -> LinearConstraints {
        LinearConstraints::new(Array::zeros(2), Array::from_element(2, Real::INFINITY))
            .unwrap()
            .with_equality(Matrix::from_row_slice(1, 2, &[1.0, 1.0]), Array::from_slice(&[1.0]))
            .unwrap()
    }

    #[test]
    fn unconstrained_returns_initial_point() {
        let engine = FeasibilityEngine::new(&LinearConstraints::unbounded(3), 1e-7);
        let x = Array::from_slice(&[1.0, -2.0, 1e9]);
        assert_eq!(engine.find_feasible_point(&x).unwrap(), x);
        assert_eq!(engine.project_direction(&x).unwrap(), Array::zeros(3));
    }

    #[test]
    fn phase_one_finds_a_point_on_the_simplex() {
        let engine = FeasibilityEngine::new(&simplex_constraints(), 1e-7);
        let x0 = engine.find_feasible_point(&Array::zeros(2)).unwrap();
        assert!(engine.is_feasible(&x0));
        assert_abs_diff_eq!(x0.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn feasible_initial_point_is_kept() {
        let engine = FeasibilityEngine::new(&simplex_constraints(), 1e-7);
        let x = Array::from_slice(&[0.25, 0.75]);
        assert_eq!(engine.find_feasible_point(&x).unwrap(), x);
    }

    #[test]
    fn empty_region_is_reported() {
        let constraints = simplex_constraints()
            .with_inequality(Matrix::from_row_slice(1, 2, &[1.0, 1.0]), Array::from_slice(&[0.5]))
            .unwrap();
        let engine = FeasibilityEngine::new(&constraints, 1e-7);
        assert!(matches!(
            engine.find_feasible_point(&Array::zeros(2)),
            Err(Error::InfeasibleRegion(_))
        ));
    }

    #[test]
    fn projection_onto_the_simplex() {
        let engine = FeasibilityEngine::new(&simplex_constraints(), 1e-7);
        let x = Array::from_slice(&[1.0, 1.0]);
        let d = engine.project_direction(&x).unwrap();
        assert_abs_diff_eq!(d[0], -0.5, epsilon = 1e-8);
        assert_abs_diff_eq!(d[1], -0.5, epsilon = 1e-8);

        // Projection of (2, −1) onto {x0 + x1 = 1, x ≥ 0} is (1, 0).
        let start = Array::from_slice(&[0.5, 0.5]);
        let x = Array::from_slice(&[2.0, -1.0]);
        let d = engine.project_direction_from(&x, &start).unwrap();
        assert_abs_diff_eq!(d[0], -1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(d[1], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn infeasible_start_is_a_precondition_failure() {
        let engine = FeasibilityEngine::new(&simplex_constraints(), 1e-7);
        let x = Array::from_slice(&[3.0, 3.0]);
        assert!(matches!(
            engine.project_direction_from(&x, &Array::zeros(2)),
            Err(Error::Precondition(_))
        ));
    }
}
