//! Active-set method for linearly constrained stochastic problems.
//!
//! The solver keeps a working set of constraint rows held at equality. Each
//! iteration estimates the loss gradient `g`, finds the steepest `ℓ₁`-unit
//! descent direction inside the working set by linear programming, and
//! either
//!
//! * drops an inequality whose multiplier shows the loss would decrease by
//!   leaving it,
//! * stops, when no descent direction exists and every multiplier has the
//!   right sign, or
//! * moves along the direction by backtracking line search, adding the
//!   first row that blocks the step.
//!
//! The gradient is the model's own estimate when it provides one and a
//! finite difference otherwise.

mod finite_difference;
mod line_search;

use crate::{
    feasibility::FeasibilityEngine,
    solver::{Session, Solver, SolverEvent, Termination, Trail},
};
use line_search::{Backtracking, Outcome};
use so_core::{
    errors::{Error, Result},
    validation::{self, Check, Validate},
    Real, Size,
};
use so_math::{comparison::argmin_first, Array, LinearProgram, Matrix, StackedConstraints};
use so_models::{Problem, Solution};
use tracing::{debug, info, warn};

/// Factors of [`ActiveSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSetConfig {
    /// Use common random numbers across solutions.
    pub crn_across_solutions: bool,
    /// Replications per evaluated point.
    pub r: Size,
    /// Armijo fraction of the predicted decrease.
    pub alpha: Real,
    /// Backtracking contraction factor.
    pub beta: Real,
    /// Initial largest step.
    pub alpha_0: Real,
    /// Growth factor of finite-difference replications after a zero estimate.
    pub lambda: Real,
    /// Optimality, blocking and smallest-step tolerance.
    pub tol: Real,
    /// Nominal finite-difference step.
    pub fd_step: Real,
    /// Re-estimates allowed after an identically zero finite difference.
    pub max_zero_gradient_retries: Size,
    /// Seed of the model streams.
    pub seed: u64,
}

impl Default for ActiveSetConfig {
    fn default() -> Self {
        Self {
            crn_across_solutions: true,
            r: 30,
            alpha: 0.2,
            beta: 0.9,
            alpha_0: 10.0,
            lambda: 2.0,
            tol: 1e-7,
            fd_step: 1e-5,
            max_zero_gradient_retries: 5,
            seed: 0,
        }
    }
}

impl Validate for ActiveSetConfig {
    const CHECKS: &'static [Check<Self>] = &[
        ("r", |c| validation::at_least(c.r, 1)),
        ("alpha", |c| validation::open_unit_interval(c.alpha)),
        ("beta", |c| validation::open_unit_interval(c.beta)),
        ("alpha_0", |c| validation::positive(c.alpha_0)),
        ("lambda", |c| {
            validation::require(c.lambda >= 2.0 && c.lambda.is_finite(), "must be at least 2")
        }),
        ("tol", |c| validation::positive(c.tol)),
        ("fd_step", |c| validation::positive(c.fd_step)),
    ];
}

/// The active-set solver.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    config: ActiveSetConfig,
}

impl ActiveSet {
    /// Solver with validated factors.
    pub fn new(config: ActiveSetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Factors in use.
    pub fn config(&self) -> &ActiveSetConfig {
        &self.config
    }

    /// Gradient of the loss at `current`, or `None` when the budget ran out
    /// part-way through a finite difference. `r_fd` grows on every retry
    /// after an identically zero estimate; once the retries are spent the
    /// zero estimate is taken at face value.
    fn loss_gradient(
        &self,
        session: &mut Session<'_>,
        engine: &FeasibilityEngine,
        current: &Solution,
        r_fd: &mut Size,
    ) -> Result<Option<Array>> {
        let problem = session.problem();
        if problem.gradient_available() {
            let sign = problem.objective_sign().value();
            if let Some(g) = current.objectives_gradients_mean() {
                if g[0].is_finite() {
                    return Ok(Some(&g[0] * -sign));
                }
            }
        }

        let cfg = &self.config;
        let mut retries = 0;
        loop {
            match finite_difference::estimate(session, engine.constraints(), current, cfg.fd_step, *r_fd) {
                Err(Error::ZeroGradientEstimate) if retries < cfg.max_zero_gradient_retries => {
                    retries += 1;
                    let grown = (*r_fd as Real * cfg.lambda).ceil() as Size;
                    *r_fd = grown.min(session.remaining()).max(1);
                    warn!(retries, replications = *r_fd, "zero finite-difference gradient");
                    session.event(SolverEvent::ZeroGradientRetry {
                        replications: *r_fd,
                    });
                }
                Err(Error::ZeroGradientEstimate) => return Ok(Some(Array::zeros(current.dim()))),
                other => return other,
            }
        }
    }
}

/// Steepest `ℓ₁`-unit descent direction that keeps the rows in `active`
/// tight, with one multiplier per active row.
///
/// Variables are `(d, t)` with `d` free and `t ≥ 0`:
/// `min gᵀd` s.t. `C_A d = 0`, `d − t ≤ 0`, `−d − t ≤ 0`, `Σt ≤ 1`.
/// The multipliers solve `g + C_Aᵀλ = 0` at a stationary point.
fn direction_lp(stacked: &StackedConstraints, active: &[usize], g: &Array) -> Result<(Array, Array)> {
    let n = g.size();
    let width = 2 * n;

    let mut objective = g.to_vec();
    objective.resize(width, 0.0);

    let c_active = stacked.c.select_rows(active);
    let mut eq = vec![0.0; active.len() * width];
    for k in 0..active.len() {
        for j in 0..n {
            eq[k * width + j] = c_active[(k, j)];
        }
    }

    let rows = 2 * n + 1;
    let mut ub = vec![0.0; rows * width];
    for i in 0..n {
        ub[(2 * i) * width + i] = 1.0;
        ub[(2 * i) * width + n + i] = -1.0;
        ub[(2 * i + 1) * width + i] = -1.0;
        ub[(2 * i + 1) * width + n + i] = -1.0;
        ub[(rows - 1) * width + n + i] = 1.0;
    }
    let mut b_ub = vec![0.0; rows];
    b_ub[rows - 1] = 1.0;

    let mut lower = vec![Real::NEG_INFINITY; n];
    lower.resize(width, 0.0);

    let solution = LinearProgram::new(Array::from_vec(objective))
        .equalities(
            Matrix::from_row_slice(active.len(), width, &eq),
            Array::zeros(active.len()),
        )?
        .inequalities(Matrix::from_row_slice(rows, width, &ub), Array::from_vec(b_ub))?
        .bounds(Array::from_vec(lower), Array::from_element(width, Real::INFINITY))?
        .solve()?;
    if !solution.is_optimal() {
        return Err(Error::InfeasibleRegion(format!(
            "direction-finding LP ended with status {:?}",
            solution.status
        )));
    }

    let d = Array::from_vec(solution.x.as_slice()[..n].to_vec());
    Ok((d, -&solution.eq_duals))
}

/// First inactive row blocking a move along `d`, with the largest step
/// that keeps it satisfied. Ties go to the lowest row index.
fn ratio_test(
    stacked: &StackedConstraints,
    active: &[usize],
    x: &Array,
    d: &Array,
    tol: Real,
) -> Option<(usize, Real)> {
    let mut blocking: Option<(usize, Real)> = None;
    for row in (stacked.n_eq..stacked.rows()).filter(|row| !active.contains(row)) {
        let rate = stacked.c.row_dot(row, d);
        if rate <= tol {
            continue;
        }
        let step = stacked.slack(row, x).max(0.0) / rate;
        if blocking.map_or(true, |(_, best)| step < best) {
            blocking = Some((row, step));
        }
    }
    blocking
}

impl Solver for ActiveSet {
    fn name(&self) -> &str {
        "ACTIVESET"
    }

    fn solve(&mut self, problem: &mut dyn Problem) -> Result<Trail> {
        let cfg = self.config.clone();
        info!(
            solver = self.name(),
            problem = problem.name(),
            budget = problem.budget().total(),
            "solve started"
        );

        let engine = FeasibilityEngine::from_problem(problem, cfg.tol);
        let stacked = engine.stacked().clone();
        let x0 = engine.find_feasible_point(problem.initial_solution())?;

        let mut active: Vec<usize> = (0..stacked.rows())
            .filter(|&row| stacked.is_equality(row) || stacked.slack(row, &x0).abs() <= cfg.tol)
            .collect();

        let mut session = Session::new(problem, cfg.seed, cfg.crn_across_solutions);
        let first_reps = session.first_replications(cfg.r)?;
        let mut current = session.evaluate(x0, first_reps)?;
        let mut current_loss = session.loss(&current);
        session.offer(&current);

        let search = Backtracking {
            alpha: cfg.alpha,
            beta: cfg.beta,
            tol: cfg.tol,
            replications: cfg.r,
        };
        let mut max_step = cfg.alpha_0;
        let mut r_fd = cfg.r;
        let mut gradient: Option<Array> = None;
        let mut stalled = 0usize;
        let mut iteration = 0usize;

        let termination = 'solve: loop {
            if !session.can_afford(cfg.r) {
                break Termination::BudgetExhausted;
            }
            iteration += 1;

            let g = match gradient.take() {
                Some(g) => g,
                None => match self.loss_gradient(&mut session, &engine, &current, &mut r_fd)? {
                    Some(g) => g,
                    None => break Termination::BudgetExhausted,
                },
            };

            let d = loop {
                let (d, multipliers) = direction_lp(&stacked, &active, &g)?;
                if g.dot(&d) < -cfg.tol {
                    break d;
                }
                let inequality_multipliers = active.iter().zip(multipliers.iter()).map(|(&row, &m)| {
                    if stacked.is_equality(row) {
                        Real::NAN
                    } else {
                        m
                    }
                });
                match argmin_first(inequality_multipliers) {
                    Some((k, multiplier)) if multiplier < -cfg.tol => {
                        let row = active.remove(k);
                        debug!(row, multiplier, "dropping constraint");
                        session.event(SolverEvent::ConstraintDropped { row, multiplier });
                    }
                    _ => {
                        session.event(SolverEvent::Optimal {
                            multipliers: multipliers.to_vec(),
                        });
                        break 'solve Termination::Optimal;
                    }
                }
            };

            let slope = g.dot(&d);
            let blocking = ratio_test(&stacked, &active, current.x(), &d, cfg.tol);
            debug!(iteration, loss = current_loss, max_step, ?active, ?blocking, "direction found");

            let start = match blocking {
                Some((row, s_star)) if s_star <= cfg.tol => {
                    // Zero-length step: the row is already tight.
                    stalled += 1;
                    if stalled > stacked.rows() {
                        warn!(row, "active set keeps cycling without moving");
                        break Termination::Degenerate;
                    }
                    active.push(row);
                    session.event(SolverEvent::ConstraintAdded { row });
                    gradient = Some(g);
                    continue;
                }
                Some((_, s_star)) => s_star,
                None => max_step,
            };

            let outcome = search.search(&mut session, current.x(), current_loss, slope, &d, start)?;
            let (step, trial, trial_loss, first_try) = match outcome {
                Outcome::Accepted {
                    step,
                    trial,
                    trial_loss,
                    first_try,
                } => (step, trial, trial_loss, first_try),
                Outcome::Failed { step } => {
                    warn!(step, "line search found no acceptable step");
                    session.event(SolverEvent::LineSearchFailed { step });
                    continue;
                }
                Outcome::OutOfBudget => break Termination::BudgetExhausted,
            };

            let (mut next, mut next_loss, mut next_step) = (trial, trial_loss, step);
            match blocking {
                Some((row, s_star)) => {
                    if (s_star - step).abs() <= cfg.tol {
                        active.push(row);
                        session.event(SolverEvent::ConstraintAdded { row });
                    }
                }
                None if first_try && session.can_afford(cfg.r) => {
                    let enlarged = step / cfg.beta;
                    let candidate = session.evaluate(current.x() + &(&d * enlarged), cfg.r)?;
                    let candidate_loss = session.loss(&candidate);
                    if candidate_loss <= next_loss {
                        next = candidate;
                        next_loss = candidate_loss;
                        next_step = enlarged;
                    }
                }
                None => {}
            }
            if next_step > 0.0 {
                max_step = next_step;
            }

            session.event(SolverEvent::StepAccepted {
                alpha: next_step,
                incumbent_loss: current_loss,
                candidate_loss: next_loss,
                budget: session.expended(),
            });
            current = next;
            current_loss = next_loss;
            stalled = 0;
            session.offer(&current);
        };

        let expended = session.expended();
        let trail = session.finish(termination);
        info!(
            solver = self.name(),
            ?termination,
            expended,
            recommendations = trail.solutions().len(),
            "solve finished"
        );
        Ok(trail)
    }
}
