//! Randomized direct search with sufficient decrease.
//!
//! Each iteration polls up to `set_size` random unit directions from the
//! incumbent at step size `α`. Directions are projected so the poll stays
//! inside the feasible region; the first candidate that improves the loss
//! by at least `c·α^q` becomes the incumbent and `α` expands by `γ`,
//! otherwise `α` contracts by `θ`.

use crate::{
    feasibility::FeasibilityEngine,
    solver::{Session, Solver, SolverEvent, Termination, Trail},
};
use rand::seq::SliceRandom;
use so_core::{
    errors::{Error, Result},
    validation::{self, Check, Validate},
    Real, Size,
};
use so_math::{Array, RandomStream, StreamIndex};
use so_models::Problem;
use tracing::{debug, info, warn};

/// Factors of [`DirectSearch`].
#[derive(Debug, Clone, PartialEq)]
pub struct DirectSearchConfig {
    /// Use common random numbers across solutions.
    pub crn_across_solutions: bool,
    /// Replications per evaluated point.
    pub r: Size,
    /// Step contraction factor.
    pub theta: Real,
    /// Step expansion factor.
    pub gamma: Real,
    /// Largest step size.
    pub alpha_max: Real,
    /// Initial step size.
    pub alpha_0: Real,
    /// Sufficient-decrease coefficient.
    pub c: Real,
    /// Sufficient-decrease exponent.
    pub q: Real,
    /// Directions drawn per poll.
    pub set_size: Size,
    /// Feasibility and zero-direction tolerance.
    pub tol: Real,
    /// Seed of the solver and model streams.
    pub seed: u64,
    /// Consecutive degenerate polls tolerated before giving up. A safety
    /// stop: degenerate polls spend no budget, so exhaustion alone never ends them.
    pub max_degenerate_polls: Size,
}

impl Default for DirectSearchConfig {
    fn default() -> Self {
        Self {
            crn_across_solutions: true,
            r: 50,
            theta: 0.2,
            gamma: 2.0,
            alpha_max: 10.0,
            alpha_0: 1.0,
            c: 1e-4,
            q: 2.0,
            set_size: 10,
            tol: 1e-7,
            seed: 0,
            max_degenerate_polls: 50,
        }
    }
}

impl Validate for DirectSearchConfig {
    const CHECKS: &'static [Check<Self>] = &[
        ("r", |c| validation::at_least(c.r, 1)),
        ("theta", |c| validation::open_unit_interval(c.theta)),
        ("gamma", |c| validation::greater_than(c.gamma, 1.0)),
        ("alpha_max", |c| validation::positive(c.alpha_max)),
        ("alpha_0", |c| {
            validation::positive(c.alpha_0)?;
            validation::require(c.alpha_0 <= c.alpha_max, "must not exceed alpha_max")
        }),
        ("c", |c| validation::positive(c.c)),
        ("q", |c| validation::greater_than(c.q, 1.0)),
        ("set_size", |c| validation::at_least(c.set_size, 1)),
        ("tol", |c| validation::positive(c.tol)),
        ("max_degenerate_polls", |c| {
            validation::at_least(c.max_degenerate_polls, 1)
        }),
    ];
}

/// The direct-search solver.
#[derive(Debug, Clone, Default)]
pub struct DirectSearch {
    config: DirectSearchConfig,
}

impl DirectSearch {
    /// Solver with validated factors.
    pub fn new(config: DirectSearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Factors in use.
    pub fn config(&self) -> &DirectSearchConfig {
        &self.config
    }

    /// Up to `set_size` distinct feasible polling directions from `x`.
    ///
    /// Fails with [`Error::DegenerateDirection`] when every draw collapses
    /// to zero after projection.
    fn poll_directions(
        &self,
        engine: &FeasibilityEngine,
        x: &Array,
        rng: &mut RandomStream,
    ) -> Result<Vec<Array>> {
        let tol = self.config.tol;
        let mut directions: Vec<Array> = Vec::with_capacity(self.config.set_size);
        for _ in 0..self.config.set_size {
            let w = Array::from_vec((0..x.size()).map(|_| rng.uniform(-1.0, 1.0)).collect());
            let norm = w.norm();
            if norm <= tol {
                continue;
            }
            let w = &w / norm;
            let correction = engine.project_direction_from(&(x + &w), x)?;
            let d = &w + &correction;
            if d.norm() <= tol || directions.iter().any(|e| (&d - e).norm() <= tol) {
                continue;
            }
            directions.push(d);
        }
        if directions.is_empty() {
            return Err(Error::DegenerateDirection);
        }
        Ok(directions)
    }
}

impl Solver for DirectSearch {
    fn name(&self) -> &str {
        "DIRECTSEARCH"
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
        let x0 = engine.find_feasible_point(problem.initial_solution())?;

        let mut direction_rng = RandomStream::new(cfg.seed, StreamIndex::new(0, 0, 0));
        let mut order_rng = RandomStream::new(cfg.seed, StreamIndex::new(0, 1, 0));

        let mut session = Session::new(problem, cfg.seed, cfg.crn_across_solutions);
        let first_reps = session.first_replications(cfg.r)?;
        let mut incumbent = session.evaluate(x0, first_reps)?;
        let mut incumbent_loss = session.loss(&incumbent);
        session.offer(&incumbent);

        let mut alpha = cfg.alpha_0;
        let mut degenerate_polls = 0;
        let mut iteration = 0usize;

        let termination = 'search: loop {
            if !session.can_afford(cfg.r) {
                break Termination::BudgetExhausted;
            }
            iteration += 1;
            debug!(iteration, alpha, loss = incumbent_loss, "poll");

            let mut directions =
                match self.poll_directions(&engine, incumbent.x(), &mut direction_rng) {
                    Ok(directions) => directions,
                    Err(Error::DegenerateDirection) => {
                        degenerate_polls += 1;
                        alpha *= cfg.theta;
                        warn!(alpha, degenerate_polls, "every polling direction collapsed");
                        session.event(SolverEvent::DegeneratePoll { alpha });
                        if degenerate_polls >= cfg.max_degenerate_polls {
                            break Termination::Degenerate;
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                };
            degenerate_polls = 0;
            directions.shuffle(&mut order_rng);

            let threshold = incumbent_loss - cfg.c * alpha.powf(cfg.q);
            let mut accepted = false;
            for d in &directions {
                if !session.can_afford(cfg.r) {
                    break 'search Termination::BudgetExhausted;
                }
                let mut x_c = incumbent.x() + &(d * alpha);
                if !engine.is_feasible(&x_c) {
                    let correction = engine.project_direction_from(&x_c, incumbent.x())?;
                    x_c = &x_c + &correction;
                }
                let candidate = session.evaluate(x_c, cfg.r)?;
                let candidate_loss = session.loss(&candidate);
                if candidate_loss <= threshold {
                    session.event(SolverEvent::StepAccepted {
                        alpha,
                        incumbent_loss,
                        candidate_loss,
                        budget: session.expended(),
                    });
                    incumbent = candidate;
                    incumbent_loss = candidate_loss;
                    session.offer(&incumbent);
                    alpha = (alpha * cfg.gamma).min(cfg.alpha_max);
                    accepted = true;
                    break;
                }
            }
            if !accepted {
                alpha *= cfg.theta;
                session.event(SolverEvent::PollFailed { alpha });
            }
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
