//! Backtracking line search with the Armijo condition.

use crate::solver::Session;
use so_core::{errors::Result, Real, Size};
use so_math::Array;
use so_models::Solution;
use tracing::trace;

/// Result of one backtracking search.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// `trial` at `x + step·d` passed the Armijo test.
    Accepted {
        step: Real,
        trial: Solution,
        trial_loss: Real,
        /// The very first step tried passed.
        first_try: bool,
    },
    /// The step shrank below the tolerance without passing.
    Failed { step: Real },
    /// The budget cannot pay for the next trial.
    OutOfBudget,
}

/// Armijo backtracking parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backtracking {
    /// Fraction of the predicted decrease that must be realized.
    pub alpha: Real,
    /// Contraction factor.
    pub beta: Real,
    /// Smallest step worth trying.
    pub tol: Real,
    /// Replications per trial point.
    pub replications: Size,
}

impl Backtracking {
    /// Search along `d` from `x` (loss `f_x`, directional slope `slope`),
    /// starting at `max_step`.
    pub(crate) fn search(
        &self,
        session: &mut Session<'_>,
        x: &Array,
        f_x: Real,
        slope: Real,
        d: &Array,
        max_step: Real,
    ) -> Result<Outcome> {
        let mut step = max_step;
        let mut first_try = true;
        loop {
            if step < self.tol {
                return Ok(Outcome::Failed { step });
            }
            if !session.can_afford(self.replications) {
                return Ok(Outcome::OutOfBudget);
            }
            let trial = session.evaluate(x + &(d * step), self.replications)?;
            let trial_loss = session.loss(&trial);
            trace!(step, trial_loss, "line-search trial");
            if trial_loss < f_x + self.alpha * step * slope {
                return Ok(Outcome::Accepted {
                    step,
                    trial,
                    trial_loss,
                    first_try,
                });
            }
            step *= self.beta;
            first_try = false;
        }
    }
}
