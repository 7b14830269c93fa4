//! A candidate decision vector and everything observed at it.

use so_core::{
    errors::{Error, Result},
    Real, Size,
};
use so_math::{Array, MeanVector, RandomStream, Statistics};

/// A decision vector plus its accumulated replication results.
///
/// Means and variances are updated incrementally as replications arrive;
/// the only way to add observations is [`Problem::simulate`], which owns
/// the translation from model responses to objectives.
///
/// [`Problem::simulate`]: crate::problem::Problem::simulate
#[derive(Debug, Clone)]
pub struct Solution {
    x: Array,
    n_reps: Size,
    objectives: Vec<Statistics>,
    stochastic_constraints: Vec<Statistics>,
    gradients: Vec<MeanVector>,
    gradients_finite: bool,
    rngs: Vec<RandomStream>,
}

impl Solution {
    /// A solution at `x` with no replications yet, simulated on `rngs`.
    pub fn new(
        x: Array,
        rngs: Vec<RandomStream>,
        n_objectives: usize,
        n_stochastic_constraints: usize,
    ) -> Self {
        let dim = x.size();
        Self {
            x,
            n_reps: 0,
            objectives: vec![Statistics::new(); n_objectives],
            stochastic_constraints: vec![Statistics::new(); n_stochastic_constraints],
            gradients: vec![MeanVector::new(dim); n_objectives],
            gradients_finite: true,
            rngs,
        }
    }

    /// Decision vector.
    pub fn x(&self) -> &Array {
        &self.x
    }

    /// Dimension of the decision vector.
    pub fn dim(&self) -> usize {
        self.x.size()
    }

    /// Replications recorded so far.
    pub fn n_reps(&self) -> Size {
        self.n_reps
    }

    /// The solution's own model streams.
    pub fn rngs(&self) -> &[RandomStream] {
        &self.rngs
    }

    pub(crate) fn rngs_mut(&mut self) -> &mut [RandomStream] {
        &mut self.rngs
    }

    /// Mean of each objective; NaN before the first replication.
    pub fn objectives_mean(&self) -> Array {
        Array::from_vec(
            self.objectives
                .iter()
                .map(|s| s.mean().unwrap_or(Real::NAN))
                .collect(),
        )
    }

    /// Sample variance of each objective; NaN below two replications.
    pub fn objectives_var(&self) -> Array {
        Array::from_vec(
            self.objectives
                .iter()
                .map(|s| s.variance().unwrap_or(Real::NAN))
                .collect(),
        )
    }

    /// Standard error of each objective mean; NaN below two replications.
    pub fn objectives_std_error(&self) -> Array {
        Array::from_vec(
            self.objectives
                .iter()
                .map(|s| s.std_error().unwrap_or(Real::NAN))
                .collect(),
        )
    }

    /// Student-t confidence half-width of objective `i` at `confidence`.
    pub fn objective_half_width(&self, i: usize, confidence: Real) -> Result<Option<Real>> {
        let stats = self.objectives.get(i).ok_or(Error::DimensionMismatch {
            expected: self.objectives.len(),
            found: i,
        })?;
        stats.confidence_half_width(confidence)
    }

    /// Mean of each stochastic-constraint response.
    pub fn stochastic_constraints_mean(&self) -> Array {
        Array::from_vec(
            self.stochastic_constraints
                .iter()
                .map(|s| s.mean().unwrap_or(Real::NAN))
                .collect(),
        )
    }

    /// Sample variance of each stochastic-constraint response.
    pub fn stochastic_constraints_var(&self) -> Array {
        Array::from_vec(
            self.stochastic_constraints
                .iter()
                .map(|s| s.variance().unwrap_or(Real::NAN))
                .collect(),
        )
    }

    /// Mean gradient of each objective with respect to `x`, present only
    /// when every replication reported a finite gradient.
    pub fn objectives_gradients_mean(&self) -> Option<Vec<Array>> {
        if !self.gradients_finite || self.n_reps == 0 {
            return None;
        }
        self.gradients
            .iter()
            .map(|g| g.mean().cloned())
            .collect()
    }

    /// Fold one replication in.
    pub(crate) fn record(
        &mut self,
        objectives: &Array,
        stochastic_constraints: &Array,
        gradients: Option<&[Array]>,
    ) -> Result<()> {
        check_len(self.objectives.len(), objectives.size())?;
        check_len(self.stochastic_constraints.len(), stochastic_constraints.size())?;
        if let Some(grads) = gradients {
            check_len(self.gradients.len(), grads.len())?;
        }

        for (s, v) in self.objectives.iter_mut().zip(objectives.iter()) {
            s.add(*v);
        }
        for (s, v) in self
            .stochastic_constraints
            .iter_mut()
            .zip(stochastic_constraints.iter())
        {
            s.add(*v);
        }
        match gradients {
            Some(grads) if self.gradients_finite && grads.iter().all(Array::is_finite) => {
                for (acc, g) in self.gradients.iter_mut().zip(grads) {
                    acc.add(g)?;
                }
            }
            _ => self.gradients_finite = false,
        }
        self.n_reps += 1;
        Ok(())
    }
}

fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::DimensionMismatch { expected, found });
    }
    Ok(())
}
