//! The simulation-model contract.
//!
//! A [`Model`] maps a strongly typed factor setting and a set of random
//! streams to one [`Replication`]: named responses plus, optionally, the
//! gradient of each response with respect to each named factor. Gradients
//! the model cannot estimate are reported as NaN, never as an error.

use so_core::{
    errors::{Error, Result},
    Real,
};
use so_math::RandomStream;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Value of one response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A single number.
    Scalar(Real),
    /// A vector of numbers (e.g. per-period measures).
    Vector(Vec<Real>),
}

impl Response {
    /// The scalar value, if this is a scalar response.
    pub fn as_scalar(&self) -> Option<Real> {
        match self {
            Response::Scalar(v) => Some(*v),
            Response::Vector(_) => None,
        }
    }

    /// All values as a slice (one element for a scalar).
    pub fn values(&self) -> &[Real] {
        match self {
            Response::Scalar(v) => std::slice::from_ref(v),
            Response::Vector(v) => v,
        }
    }
}

/// Output of a single replication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replication {
    /// Response name → value.
    pub responses: BTreeMap<String, Response>,
    /// Response name → factor name → partial derivative (NaN if unknown).
    pub gradients: BTreeMap<String, BTreeMap<String, Real>>,
}

impl Replication {
    /// An empty replication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a scalar response.
    pub fn with_scalar(mut self, name: impl Into<String>, value: Real) -> Self {
        self.responses.insert(name.into(), Response::Scalar(value));
        self
    }

    /// Add (or replace) a vector response.
    pub fn with_vector(mut self, name: impl Into<String>, values: Vec<Real>) -> Self {
        self.responses.insert(name.into(), Response::Vector(values));
        self
    }

    /// Record `∂response/∂factor`.
    pub fn with_gradient(
        mut self,
        response: impl Into<String>,
        factor: impl Into<String>,
        value: Real,
    ) -> Self {
        self.gradients
            .entry(response.into())
            .or_default()
            .insert(factor.into(), value);
        self
    }

    /// Look up a response by name.
    pub fn response(&self, name: &str) -> Result<&Response> {
        self.responses
            .get(name)
            .ok_or_else(|| Error::InvalidArgument(format!("model has no response `{name}`")))
    }

    /// Look up a scalar response by name.
    pub fn scalar(&self, name: &str) -> Result<Real> {
        self.response(name)?
            .as_scalar()
            .ok_or_else(|| Error::InvalidArgument(format!("response `{name}` is not a scalar")))
    }

    /// `∂response/∂factor`, NaN when the model did not report it.
    pub fn gradient(&self, response: &str, factor: &str) -> Real {
        self.gradients
            .get(response)
            .and_then(|g| g.get(factor))
            .copied()
            .unwrap_or(Real::NAN)
    }
}

/// A stochastic simulation model.
pub trait Model: Send {
    /// Strongly typed factor setting.
    type Factors: Clone + Debug + Send;

    /// Model name.
    fn name(&self) -> &str;

    /// Number of random streams one replication consumes.
    fn n_rngs(&self) -> usize;

    /// Number of responses one replication reports.
    fn n_responses(&self) -> usize;

    /// Current factor setting.
    fn factors(&self) -> &Self::Factors;

    /// Replace the factor setting, validating it first. On error the
    /// previous setting is kept.
    fn set_factors(&mut self, factors: Self::Factors) -> Result<()>;

    /// Run one replication on `rngs` (exactly [`Model::n_rngs`] streams).
    fn replicate(&self, rngs: &mut [RandomStream]) -> Result<Replication>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups() {
        let rep = Replication::new()
            .with_scalar("cost", 4.0)
            .with_vector("queue", vec![1.0, 2.0])
            .with_gradient("cost", "mu", -0.5);
        assert_eq!(rep.scalar("cost").unwrap(), 4.0);
        assert_eq!(rep.response("queue").unwrap().values(), &[1.0, 2.0]);
        assert!(rep.scalar("queue").is_err());
        assert!(rep.scalar("missing").is_err());
        assert_eq!(rep.gradient("cost", "mu"), -0.5);
        assert!(rep.gradient("cost", "lambda").is_nan());
        assert!(rep.gradient("queue", "mu").is_nan());
    }
}
