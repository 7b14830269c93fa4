//! Optimization problems over simulation models.
//!
//! [`Problem`] is what solvers see: a decision space with linear
//! constraints, a replication budget, and [`Problem::simulate`], which
//! runs replications at a [`Solution`] and charges them to the budget.
//! [`SimulationProblem`] is the concrete implementation that adapts any
//! [`Model`] through a handful of mapping closures supplied to its
//! [`SimulationProblemBuilder`].

use crate::{budget::Budget, model::Model, model::Replication, solution::Solution};
use so_core::{
    errors::{Error, Result},
    validation::{self, Check, Validate},
    Real, Size,
};
use so_math::{Array, LinearConstraints, Matrix};

// ── Objective sign ────────────────────────────────────────────────────────────

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSign {
    /// Larger objective values are better.
    Maximize,
    /// Smaller objective values are better.
    Minimize,
}

impl ObjectiveSign {
    /// `+1` for maximization, `−1` for minimization.
    pub fn value(self) -> Real {
        match self {
            ObjectiveSign::Maximize => 1.0,
            ObjectiveSign::Minimize => -1.0,
        }
    }

    /// Minimization form of an objective value: `−sign · objective`.
    pub fn loss(self, objective: Real) -> Real {
        -self.value() * objective
    }
}

// ── Problem trait ─────────────────────────────────────────────────────────────

/// A budget-constrained stochastic optimization problem.
pub trait Problem: Send {
    /// Problem name.
    fn name(&self) -> &str;

    /// Dimension of the decision vector.
    fn dim(&self) -> usize;

    /// Number of objectives.
    fn n_objectives(&self) -> usize;

    /// Number of stochastic constraints.
    fn n_stochastic_constraints(&self) -> usize;

    /// Number of random streams one replication consumes.
    fn n_rngs(&self) -> usize;

    /// Direction of optimization.
    fn objective_sign(&self) -> ObjectiveSign;

    /// Linear constraints, bounds included.
    fn constraints(&self) -> &LinearConstraints;

    /// `(lower, upper)` bounds on the decision vector.
    fn bounds(&self) -> (&Array, &Array) {
        let c = self.constraints();
        (c.lower(), c.upper())
    }

    /// Suggested starting point (not necessarily feasible).
    fn initial_solution(&self) -> &Array;

    /// Whether replications report gradients of the objectives.
    fn gradient_available(&self) -> bool;

    /// Replication budget of this solve.
    fn budget(&self) -> &Budget;

    /// Run `n` more replications at `solution`.
    ///
    /// Every replication actually run is charged to the budget and recorded
    /// in `solution`. Fails with [`Error::BudgetExceeded`] when the budget
    /// is already exhausted, or after running the remaining replications
    /// when fewer than `n` were left.
    fn simulate(&mut self, solution: &mut Solution, n: Size) -> Result<()>;

    /// Loss of the primary objective at `solution` (smaller is better).
    fn loss(&self, solution: &Solution) -> Real {
        self.objective_sign().loss(solution.objectives_mean()[0])
    }
}

// ── Mapping closures ──────────────────────────────────────────────────────────

/// Decision vector → model factors, given the model's current factors.
pub type VectorToFactors<F> = Box<dyn Fn(&Array, &F) -> F + Send>;
/// Model factors → decision vector.
pub type FactorsToVector<F> = Box<dyn Fn(&F) -> Array + Send>;
/// Replication → one value per objective / stochastic constraint.
pub type ResponseMap = Box<dyn Fn(&Replication) -> Result<Array> + Send>;
/// Replication → gradient (w.r.t. the decision vector) per objective.
pub type GradientMap = Box<dyn Fn(&Replication) -> Result<Vec<Array>> + Send>;
/// Decision vector → deterministic objective terms and their gradients.
pub type DeterministicObjectives = Box<dyn Fn(&Array) -> (Array, Vec<Array>) + Send>;

// ── SimulationProblem ─────────────────────────────────────────────────────────

/// A [`Problem`] backed by a simulation [`Model`].
pub struct SimulationProblem<M: Model> {
    name: String,
    model: M,
    constraints: LinearConstraints,
    sign: ObjectiveSign,
    budget: Budget,
    initial: Array,
    n_objectives: usize,
    n_stochastic_constraints: usize,
    vector_to_factors: VectorToFactors<M::Factors>,
    responses_to_objectives: ResponseMap,
    responses_to_gradients: Option<GradientMap>,
    responses_to_stochastic_constraints: Option<ResponseMap>,
    deterministic_objectives: Option<DeterministicObjectives>,
}

impl<M: Model> std::fmt::Debug for SimulationProblem<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationProblem")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("dim", &self.constraints.dim())
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl<M: Model> SimulationProblem<M> {
    /// Start building a problem over `model`.
    pub fn builder(model: M) -> SimulationProblemBuilder<M> {
        SimulationProblemBuilder::new(model)
    }

    /// The underlying model.
    pub fn model(&self) -> &M {
        &self.model
    }

    fn deterministic_terms(&self, x: &Array) -> Result<Option<(Array, Vec<Array>)>> {
        let Some(det) = &self.deterministic_objectives else {
            return Ok(None);
        };
        let (values, grads) = det(x);
        if values.size() != self.n_objectives || grads.len() != self.n_objectives {
            return Err(Error::DimensionMismatch {
                expected: self.n_objectives,
                found: values.size(),
            });
        }
        Ok(Some((values, grads)))
    }

    fn run_one(
        &mut self,
        solution: &mut Solution,
        deterministic: Option<&(Array, Vec<Array>)>,
    ) -> Result<()> {
        let rep = self.model.replicate(solution.rngs_mut())?;
        solution
            .rngs_mut()
            .iter_mut()
            .for_each(|s| s.advance_subsubstream());

        let mut objectives = (self.responses_to_objectives)(&rep)?;
        let stochastic = match &self.responses_to_stochastic_constraints {
            Some(map) => map(&rep)?,
            None => Array::zeros(0),
        };
        let mut gradients = match &self.responses_to_gradients {
            Some(map) => Some(map(&rep)?),
            None => None,
        };
        if let Some((values, det_grads)) = deterministic {
            objectives = &objectives + values;
            if let Some(gs) = gradients.as_mut() {
                for (g, dg) in gs.iter_mut().zip(det_grads) {
                    *g = &*g + dg;
                }
            }
        }
        solution.record(&objectives, &stochastic, gradients.as_deref())?;
        self.budget.charge(1)
    }
}

impl<M: Model> Problem for SimulationProblem<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.constraints.dim()
    }

    fn n_objectives(&self) -> usize {
        self.n_objectives
    }

    fn n_stochastic_constraints(&self) -> usize {
        self.n_stochastic_constraints
    }

    fn n_rngs(&self) -> usize {
        self.model.n_rngs()
    }

    fn objective_sign(&self) -> ObjectiveSign {
        self.sign
    }

    fn constraints(&self) -> &LinearConstraints {
        &self.constraints
    }

    fn initial_solution(&self) -> &Array {
        &self.initial
    }

    fn gradient_available(&self) -> bool {
        self.responses_to_gradients.is_some()
    }

    fn budget(&self) -> &Budget {
        &self.budget
    }

    fn simulate(&mut self, solution: &mut Solution, n: Size) -> Result<()> {
        if solution.dim() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                found: solution.dim(),
            });
        }
        if n == 0 {
            return Ok(());
        }
        let remaining = self.budget.remaining();
        if remaining == 0 {
            return Err(Error::BudgetExceeded {
                requested: n,
                remaining,
            });
        }

        let factors = (self.vector_to_factors)(solution.x(), self.model.factors());
        self.model.set_factors(factors)?;
        let deterministic = self.deterministic_terms(solution.x())?;

        let runs = n.min(remaining);
        for _ in 0..runs {
            self.run_one(solution, deterministic.as_ref())?;
        }
        tracing::trace!(
            problem = %self.name,
            runs,
            expended = self.budget.expended(),
            "simulated"
        );
        if runs < n {
            return Err(Error::BudgetExceeded {
                requested: n,
                remaining,
            });
        }
        Ok(())
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Scalar settings of a problem, checked declaratively at build time.
#[derive(Debug, Clone)]
struct ProblemSettings {
    name: String,
    dim: usize,
    n_objectives: usize,
    budget: Size,
}

impl Validate for ProblemSettings {
    const CHECKS: &'static [Check<Self>] = &[
        ("name", |s| validation::require(!s.name.is_empty(), "must not be empty")),
        ("dim", |s| validation::at_least(s.dim, 1)),
        ("n_objectives", |s| validation::at_least(s.n_objectives, 1)),
        ("budget", |s| validation::at_least(s.budget, 1)),
    ];
}

/// Builder for [`SimulationProblem`].
pub struct SimulationProblemBuilder<M: Model> {
    model: M,
    name: String,
    dim: Option<usize>,
    lower: Option<Array>,
    upper: Option<Array>,
    equality: Option<(Matrix, Array)>,
    inequality: Option<(Matrix, Array)>,
    sign: ObjectiveSign,
    budget: Size,
    initial: Option<Array>,
    n_objectives: usize,
    n_stochastic_constraints: usize,
    vector_to_factors: Option<VectorToFactors<M::Factors>>,
    factors_to_vector: Option<FactorsToVector<M::Factors>>,
    responses_to_objectives: Option<ResponseMap>,
    responses_to_gradients: Option<GradientMap>,
    responses_to_stochastic_constraints: Option<ResponseMap>,
    deterministic_objectives: Option<DeterministicObjectives>,
}

impl<M: Model> SimulationProblemBuilder<M> {
    fn new(model: M) -> Self {
        Self {
            name: model.name().to_string(),
            model,
            dim: None,
            lower: None,
            upper: None,
            equality: None,
            inequality: None,
            sign: ObjectiveSign::Minimize,
            budget: 1000,
            initial: None,
            n_objectives: 1,
            n_stochastic_constraints: 0,
            vector_to_factors: None,
            factors_to_vector: None,
            responses_to_objectives: None,
            responses_to_gradients: None,
            responses_to_stochastic_constraints: None,
            deterministic_objectives: None,
        }
    }

    /// Problem name (defaults to the model name).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Decision-vector dimension.
    pub fn dim(mut self, dim: usize) -> Self {
        self.dim = Some(dim);
        self
    }

    /// Box bounds (default: unbounded).
    pub fn bounds(mut self, lower: Array, upper: Array) -> Self {
        self.lower = Some(lower);
        self.upper = Some(upper);
        self
    }

    /// Equality block `ce·x = de`.
    pub fn equality_constraints(mut self, ce: Matrix, de: Array) -> Self {
        self.equality = Some((ce, de));
        self
    }

    /// Inequality block `ci·x ≤ di`.
    pub fn inequality_constraints(mut self, ci: Matrix, di: Array) -> Self {
        self.inequality = Some((ci, di));
        self
    }

    /// Direction of optimization (default: minimize).
    pub fn objective_sign(mut self, sign: ObjectiveSign) -> Self {
        self.sign = sign;
        self
    }

    /// Replication budget (default: 1000).
    pub fn budget(mut self, total: Size) -> Self {
        self.budget = total;
        self
    }

    /// Starting point (default: the origin).
    pub fn initial_solution(mut self, x0: Array) -> Self {
        self.initial = Some(x0);
        self
    }

    /// Number of objectives (default: 1).
    pub fn n_objectives(mut self, n: usize) -> Self {
        self.n_objectives = n;
        self
    }

    /// Required: how a decision vector sets the model's factors.
    pub fn vector_to_factors(
        mut self,
        f: impl Fn(&Array, &M::Factors) -> M::Factors + Send + 'static,
    ) -> Self {
        self.vector_to_factors = Some(Box::new(f));
        self
    }

    /// Inverse of [`Self::vector_to_factors`]; enables the round-trip check.
    pub fn factors_to_vector(mut self, f: impl Fn(&M::Factors) -> Array + Send + 'static) -> Self {
        self.factors_to_vector = Some(Box::new(f));
        self
    }

    /// Required: replication → objective values.
    pub fn responses_to_objectives(
        mut self,
        f: impl Fn(&Replication) -> Result<Array> + Send + 'static,
    ) -> Self {
        self.responses_to_objectives = Some(Box::new(f));
        self
    }

    /// Replication → objective gradients w.r.t. the decision vector.
    pub fn responses_to_gradients(
        mut self,
        f: impl Fn(&Replication) -> Result<Vec<Array>> + Send + 'static,
    ) -> Self {
        self.responses_to_gradients = Some(Box::new(f));
        self
    }

    /// Replication → stochastic-constraint values (`n` of them).
    pub fn responses_to_stochastic_constraints(
        mut self,
        n: usize,
        f: impl Fn(&Replication) -> Result<Array> + Send + 'static,
    ) -> Self {
        self.n_stochastic_constraints = n;
        self.responses_to_stochastic_constraints = Some(Box::new(f));
        self
    }

    /// Deterministic objective terms added to every replication.
    pub fn deterministic_objectives(
        mut self,
        f: impl Fn(&Array) -> (Array, Vec<Array>) + Send + 'static,
    ) -> Self {
        self.deterministic_objectives = Some(Box::new(f));
        self
    }

    /// Validate everything and build the problem.
    pub fn build(mut self) -> Result<SimulationProblem<M>> {
        let dim = self
            .dim
            .or_else(|| self.initial.as_ref().map(Array::size))
            .or_else(|| self.lower.as_ref().map(Array::size))
            .unwrap_or(0);
        ProblemSettings {
            name: self.name.clone(),
            dim,
            n_objectives: self.n_objectives,
            budget: self.budget,
        }
        .validate()?;

        let vector_to_factors = self.vector_to_factors.take().ok_or(Error::InvalidFactor {
            factor: "vector_to_factors",
            reason: "is required".into(),
        })?;
        let responses_to_objectives =
            self.responses_to_objectives
                .take()
                .ok_or(Error::InvalidFactor {
                    factor: "responses_to_objectives",
                    reason: "is required".into(),
                })?;

        let lower = self
            .lower
            .take()
            .unwrap_or_else(|| Array::from_element(dim, Real::NEG_INFINITY));
        let upper = self
            .upper
            .take()
            .unwrap_or_else(|| Array::from_element(dim, Real::INFINITY));
        if lower.size() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: lower.size(),
            });
        }
        let mut constraints = LinearConstraints::new(lower, upper)?;
        if let Some((ce, de)) = self.equality.take() {
            constraints = constraints.with_equality(ce, de)?;
        }
        if let Some((ci, di)) = self.inequality.take() {
            constraints = constraints.with_inequality(ci, di)?;
        }

        let initial = self.initial.take().unwrap_or_else(|| Array::zeros(dim));
        if initial.size() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: initial.size(),
            });
        }
        if !initial.is_finite() {
            return Err(Error::InvalidFactor {
                factor: "initial_solution",
                reason: "must be finite".into(),
            });
        }

        // The starting point must map to a valid factor setting.
        let mut model = self.model;
        let factors = vector_to_factors(&initial, model.factors());
        if let Some(back) = &self.factors_to_vector {
            let round_trip = back(&factors);
            let same = round_trip.size() == dim
                && round_trip
                    .iter()
                    .zip(initial.iter())
                    .all(|(a, b)| (a - b).abs() <= 1e-12 * (1.0 + b.abs()));
            if !same {
                return Err(Error::InvalidFactor {
                    factor: "factors_to_vector",
                    reason: format!("does not invert vector_to_factors at {initial}"),
                });
            }
        }
        model.set_factors(factors)?;

        tracing::debug!(
            problem = %self.name,
            model = model.name(),
            dim,
            budget = self.budget,
            "problem built"
        );
        Ok(SimulationProblem {
            name: self.name,
            model,
            constraints,
            sign: self.sign,
            budget: Budget::new(self.budget)?,
            initial,
            n_objectives: self.n_objectives,
            n_stochastic_constraints: self.n_stochastic_constraints,
            vector_to_factors,
            responses_to_objectives,
            responses_to_gradients: self.responses_to_gradients,
            responses_to_stochastic_constraints: self.responses_to_stochastic_constraints,
            deterministic_objectives: self.deterministic_objectives,
        })
    }
}
