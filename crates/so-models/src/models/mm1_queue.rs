//! M/M/1 queue with an infinitesimal-perturbation-analysis gradient.
//!
//! Customers arrive with Exponential(`lambda`) interarrival times and are
//! served first-come first-served with Exponential(`mu`) service times.
//! After `warmup` customers, the next `people` customers are averaged into
//! the responses `avg_sojourn_time`, `avg_waiting_time` and
//! `frac_cust_wait`.
//!
//! A service time `S = E / mu` scales as `∂S/∂mu = −S/mu`, and a customer's
//! departure time is the start of its busy period plus the service times of
//! everyone served in that busy period so far. Summing those derivatives
//! gives the IPA estimates with respect to `mu`; derivatives with respect
//! to `lambda` are not estimated and reported as NaN.

use crate::model::{Model, Replication};
use crate::problem::{ObjectiveSign, SimulationProblem};
use so_core::{
    errors::Result,
    validation::{self, Check, Validate},
    Real, Size,
};
use so_math::{Array, RandomStream};

/// Factors of [`Mm1QueueModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mm1Factors {
    /// Arrival rate.
    pub lambda: Real,
    /// Service rate.
    pub mu: Real,
    /// Customers discarded before statistics are collected.
    pub warmup: Size,
    /// Customers averaged into the responses.
    pub people: Size,
}

impl Default for Mm1Factors {
    fn default() -> Self {
        Self {
            lambda: 1.5,
            mu: 3.0,
            warmup: 20,
            people: 50,
        }
    }
}

impl Validate for Mm1Factors {
    const CHECKS: &'static [Check<Self>] = &[
        ("lambda", |f| validation::positive(f.lambda)),
        ("mu", |f| validation::positive(f.mu)),
        ("warmup", |f| validation::at_least(f.warmup, 1)),
        ("people", |f| validation::at_least(f.people, 1)),
    ];
}

/// Single-server FIFO queue.
#[derive(Debug, Clone, Default)]
pub struct Mm1QueueModel {
    factors: Mm1Factors,
}

impl Mm1QueueModel {
    /// Model with the given factors, validated.
    pub fn new(factors: Mm1Factors) -> Result<Self> {
        factors.validate()?;
        Ok(Self { factors })
    }
}

impl Model for Mm1QueueModel {
    type Factors = Mm1Factors;

    fn name(&self) -> &str {
        "MM1"
    }

    fn n_rngs(&self) -> usize {
        2
    }

    fn n_responses(&self) -> usize {
        3
    }

    fn factors(&self) -> &Mm1Factors {
        &self.factors
    }

    fn set_factors(&mut self, factors: Mm1Factors) -> Result<()> {
        factors.validate()?;
        self.factors = factors;
        Ok(())
    }

    fn replicate(&self, rngs: &mut [RandomStream]) -> Result<Replication> {
        let Mm1Factors {
            lambda,
            mu,
            warmup,
            people,
        } = self.factors;
        let total = warmup + people;
        let found = rngs.len();
        let [arrival_rng, service_rng, ..] = rngs else {
            return Err(so_core::Error::DimensionMismatch { expected: 2, found });
        };

        // Draw everything up front so each stream's usage is fixed.
        let interarrivals: Vec<Real> = (0..total).map(|_| arrival_rng.exponential(lambda)).collect();
        let services: Vec<Real> = (0..total).map(|_| service_rng.exponential(mu)).collect();

        let mut arrival = 0.0;
        let mut departure: Real = 0.0;
        let mut busy_service_sum = 0.0;

        let (mut sojourn_sum, mut waiting_sum, mut waited) = (0.0, 0.0, 0usize);
        let (mut d_sojourn_sum, mut d_waiting_sum) = (0.0, 0.0);

        for i in 0..total {
            arrival += interarrivals[i];
            let service = services[i];
            let waits = arrival < departure;
            if !waits {
                busy_service_sum = 0.0;
            }
            let d_wait = -busy_service_sum / mu;
            busy_service_sum += service;
            let d_sojourn = -busy_service_sum / mu;

            departure = departure.max(arrival) + service;
            let sojourn = departure - arrival;

            if i >= warmup {
                sojourn_sum += sojourn;
                waiting_sum += sojourn - service;
                waited += usize::from(waits);
                d_sojourn_sum += d_sojourn;
                d_waiting_sum += d_wait;
            }
        }

        let n = people as Real;
        Ok(Replication::new()
            .with_scalar("avg_sojourn_time", sojourn_sum / n)
            .with_scalar("avg_waiting_time", waiting_sum / n)
            .with_scalar("frac_cust_wait", waited as Real / n)
            .with_gradient("avg_sojourn_time", "mu", d_sojourn_sum / n)
            .with_gradient("avg_sojourn_time", "lambda", Real::NAN)
            .with_gradient("avg_waiting_time", "mu", d_waiting_sum / n)
            .with_gradient("avg_waiting_time", "lambda", Real::NAN)
            .with_gradient("frac_cust_wait", "mu", Real::NAN)
            .with_gradient("frac_cust_wait", "lambda", Real::NAN))
    }
}

/// Cost per unit of squared service rate in [`mm1_problem`].
pub const SERVICE_COST: Real = 0.1;

/// Choose `mu` to minimize `avg_sojourn_time + 0.1·mu²`.
///
/// One decision variable (`mu`, bounded below by `1e-3` so the service
/// rate stays positive), starting at `mu = 5`; the service cost enters as a
/// deterministic objective term with gradient `0.2·mu`.
pub fn mm1_problem(budget: Size) -> Result<SimulationProblem<Mm1QueueModel>> {
    SimulationProblem::builder(Mm1QueueModel::default())
        .name("MM1-1")
        .dim(1)
        .objective_sign(ObjectiveSign::Minimize)
        .bounds(
            Array::from_slice(&[1e-3]),
            Array::from_slice(&[Real::INFINITY]),
        )
        .budget(budget)
        .initial_solution(Array::from_slice(&[5.0]))
        .vector_to_factors(|x, f: &Mm1Factors| Mm1Factors { mu: x[0], ..f.clone() })
        .factors_to_vector(|f: &Mm1Factors| Array::from_slice(&[f.mu]))
        .responses_to_objectives(|r| Ok(Array::from_slice(&[r.scalar("avg_sojourn_time")?])))
        .responses_to_gradients(|r| {
            Ok(vec![Array::from_slice(&[r.gradient("avg_sojourn_time", "mu")])])
        })
        .deterministic_objectives(|x| {
            (
                Array::from_slice(&[SERVICE_COST * x[0] * x[0]]),
                vec![Array::from_slice(&[2.0 * SERVICE_COST * x[0]])],
            )
        })
        .build()
}
