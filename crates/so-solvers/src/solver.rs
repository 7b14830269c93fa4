//! The solver contract and the record a solve leaves behind.
//!
//! A [`Solver`] consumes a [`Problem`]'s budget and returns a [`Trail`]: the
//! sequence of recommended solutions, the budget spent when each was
//! recommended, why the solve stopped, and a log of [`SolverEvent`]s.

use so_core::{
    errors::{Error, Result},
    Real, Size,
};
use so_math::Array;
use so_models::{Problem, Solution, StreamProgenitor};

// ── Outcome types ─────────────────────────────────────────────────────────────

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Not enough budget left for another iteration.
    BudgetExhausted,
    /// The first-order optimality test passed.
    Optimal,
    /// The search stalled: repeated polls or steps made no progress.
    Degenerate,
}

/// Notable steps of a solve, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverEvent {
    /// A candidate replaced the incumbent.
    StepAccepted {
        /// Step size in force.
        alpha: Real,
        /// Loss of the incumbent before the step.
        incumbent_loss: Real,
        /// Loss of the accepted candidate.
        candidate_loss: Real,
        /// Budget expended once the candidate was simulated.
        budget: Size,
    },
    /// No polled candidate passed the acceptance test.
    PollFailed {
        /// Step size in force.
        alpha: Real,
    },
    /// Every polling direction collapsed after projection.
    DegeneratePoll {
        /// Step size after shrinking.
        alpha: Real,
    },
    /// A blocking constraint row joined the active set.
    ConstraintAdded {
        /// Row index in the stacked constraint matrix.
        row: usize,
    },
    /// An inequality row with a negative multiplier left the active set.
    ConstraintDropped {
        /// Row index in the stacked constraint matrix.
        row: usize,
        /// Its multiplier.
        multiplier: Real,
    },
    /// A finite-difference gradient came out zero and is being re-estimated.
    ZeroGradientRetry {
        /// Replications per perturbed point for the retry.
        replications: Size,
    },
    /// Backtracking found no acceptable step.
    LineSearchFailed {
        /// Step size tried last.
        step: Real,
    },
    /// The optimality test passed.
    Optimal {
        /// Multipliers of the active rows, in active-set order.
        multipliers: Vec<Real>,
    },
}

/// Recommended solutions of one solve.
///
/// `solutions[k]` was recommended once `intermediate_budgets[k]`
/// replications had been spent; budgets are strictly increasing.
#[derive(Debug, Clone)]
pub struct Trail {
    solutions: Vec<Solution>,
    intermediate_budgets: Vec<Size>,
    termination: Termination,
    events: Vec<SolverEvent>,
}

impl Default for Trail {
    fn default() -> Self {
        Self::new()
    }
}

impl Trail {
    /// An empty trail.
    pub fn new() -> Self {
        Self {
            solutions: Vec::new(),
            intermediate_budgets: Vec::new(),
            termination: Termination::BudgetExhausted,
            events: Vec::new(),
        }
    }

    /// Append a recommendation. A recommendation made at the same budget as
    /// the previous one replaces it.
    pub fn record(&mut self, solution: Solution, budget: Size) {
        if self.intermediate_budgets.last() == Some(&budget) {
            self.solutions.pop();
            self.intermediate_budgets.pop();
        }
        self.solutions.push(solution);
        self.intermediate_budgets.push(budget);
    }

    /// Recommended solutions, oldest first.
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    /// Budget spent at each recommendation.
    pub fn intermediate_budgets(&self) -> &[Size] {
        &self.intermediate_budgets
    }

    /// Final recommendation.
    pub fn best(&self) -> Option<&Solution> {
        self.solutions.last()
    }

    /// Why the solve stopped.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Events in the order they happened.
    pub fn events(&self) -> &[SolverEvent] {
        &self.events
    }

    /// Split into `(solutions, intermediate_budgets)`.
    pub fn into_parts(self) -> (Vec<Solution>, Vec<Size>) {
        (self.solutions, self.intermediate_budgets)
    }
}

// ── Solver trait ──────────────────────────────────────────────────────────────

/// A budget-constrained stochastic optimizer.
pub trait Solver {
    /// Solver name.
    fn name(&self) -> &str;

    /// Run one solve, spending at most `problem.budget()`.
    fn solve(&mut self, problem: &mut dyn Problem) -> Result<Trail>;
}

// ── Shared solve state ────────────────────────────────────────────────────────

/// Bookkeeping common to every solve: the problem, per-solution streams,
/// the trail, and the best loss recommended so far.
pub(crate) struct Session<'p> {
    problem: &'p mut dyn Problem,
    progenitor: StreamProgenitor,
    trail: Trail,
    best_loss: Real,
}

impl<'p> Session<'p> {
    pub(crate) fn new(problem: &'p mut dyn Problem, seed: u64, crn_across_solutions: bool) -> Self {
        let progenitor = StreamProgenitor::new(seed, problem.n_rngs(), crn_across_solutions);
        Self {
            problem,
            progenitor,
            trail: Trail::new(),
            best_loss: Real::INFINITY,
        }
    }

    pub(crate) fn problem(&self) -> &dyn Problem {
        &*self.problem
    }

    pub(crate) fn remaining(&self) -> Size {
        self.problem.budget().remaining()
    }

    pub(crate) fn expended(&self) -> Size {
        self.problem.budget().expended()
    }

    pub(crate) fn can_afford(&self, n: Size) -> bool {
        self.problem.budget().can_afford(n)
    }

    /// Replications for the starting point: `r`, or whatever is left when
    /// less. Fails when nothing is left, since a recommendation must carry
    /// at least one replication.
    pub(crate) fn first_replications(&self, r: Size) -> Result<Size> {
        match self.remaining() {
            0 => Err(Error::BudgetExceeded {
                requested: r,
                remaining: 0,
            }),
            remaining => Ok(r.min(remaining)),
        }
    }

    /// A new solution at `x`, simulated `n` times.
    pub(crate) fn evaluate(&mut self, x: Array, n: Size) -> Result<Solution> {
        let mut solution = self.progenitor.create_solution(x, &*self.problem)?;
        self.problem.simulate(&mut solution, n)?;
        Ok(solution)
    }

    pub(crate) fn loss(&self, solution: &Solution) -> Real {
        self.problem.loss(solution)
    }

    /// Recommend `solution` if it beats every earlier recommendation.
    pub(crate) fn offer(&mut self, solution: &Solution) {
        let loss = self.loss(solution);
        if self.trail.solutions.is_empty() || loss < self.best_loss {
            self.best_loss = loss;
            let budget = self.expended();
            self.trail.record(solution.clone(), budget);
        }
    }

    pub(crate) fn event(&mut self, event: SolverEvent) {
        self.trail.events.push(event);
    }

    pub(crate) fn finish(mut self, termination: Termination) -> Trail {
        self.trail.termination = termination;
        self.trail
    }
}
