//! Noisy separable quadratic.
//!
//! `value = Σ wᵢ (xᵢ − cᵢ)² + σ·Z`, `Z ~ N(0, 1)`, with the exact gradient
//! `2 wᵢ (xᵢ − cᵢ)` reported per coordinate factor `x0, x1, …` when
//! enabled. A deterministic problem is obtained with `σ = 0`.

use crate::model::{Model, Replication};
use crate::problem::{ObjectiveSign, SimulationProblem, SimulationProblemBuilder};
use so_core::{
    errors::Result,
    validation::{self, Check, Validate},
    Real,
};
use so_math::{Array, RandomStream};

/// Factors of [`QuadraticModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticFactors {
    /// Evaluation point.
    pub x: Vec<Real>,
    /// Minimizer.
    pub center: Vec<Real>,
    /// Per-coordinate curvature weights.
    pub weights: Vec<Real>,
    /// Standard deviation of the additive noise.
    pub noise_sd: Real,
    /// Report the exact gradient (NaN otherwise).
    pub analytic_gradient: bool,
}

impl Validate for QuadraticFactors {
    const CHECKS: &'static [Check<Self>] = &[
        ("x", |f| {
            validation::require(f.x.iter().all(|v| v.is_finite()), "must be finite")
        }),
        ("center", |f| {
            validation::require(f.center.len() == f.x.len(), "must match the length of x")
        }),
        ("weights", |f| {
            validation::require(
                f.weights.len() == f.x.len() && f.weights.iter().all(|w| w.is_finite()),
                "must be finite and match the length of x",
            )
        }),
        ("noise_sd", |f| {
            validation::require(
                f.noise_sd >= 0.0 && f.noise_sd.is_finite(),
                "must be non-negative and finite",
            )
        }),
    ];
}

/// A quadratic bowl with additive Gaussian noise.
#[derive(Debug, Clone)]
pub struct QuadraticModel {
    factors: QuadraticFactors,
}

impl QuadraticModel {
    /// Unit-weight, noise-free bowl centred at the origin in `dim` dimensions.
    pub fn new(dim: usize) -> Self {
        Self {
            factors: QuadraticFactors {
                x: vec![0.0; dim],
                center: vec![0.0; dim],
                weights: vec![1.0; dim],
                noise_sd: 0.0,
                analytic_gradient: true,
            },
        }
    }

    /// Model with the given factors, validated.
    pub fn with_factors(factors: QuadraticFactors) -> Result<Self> {
        factors.validate()?;
        Ok(Self { factors })
    }
}

impl Model for QuadraticModel {
    type Factors = QuadraticFactors;

    fn name(&self) -> &str {
        "QUADRATIC"
    }

    fn n_rngs(&self) -> usize {
        1
    }

    fn n_responses(&self) -> usize {
        1
    }

    fn factors(&self) -> &QuadraticFactors {
        &self.factors
    }

    fn set_factors(&mut self, factors: QuadraticFactors) -> Result<()> {
        factors.validate()?;
        self.factors = factors;
        Ok(())
    }

    fn replicate(&self, rngs: &mut [RandomStream]) -> Result<Replication> {
        let f = &self.factors;
        let noise = rngs[0].normal(0.0, 1.0);
        let value = f
            .x
            .iter()
            .zip(&f.center)
            .zip(&f.weights)
            .map(|((x, c), w)| w * (x - c).powi(2))
            .sum::<Real>()
            + f.noise_sd * noise;

        let mut rep = Replication::new().with_scalar("value", value);
        for (i, ((x, c), w)) in f.x.iter().zip(&f.center).zip(&f.weights).enumerate() {
            let g = if f.analytic_gradient {
                2.0 * w * (x - c)
            } else {
                Real::NAN
            };
            rep = rep.with_gradient("value", format!("x{i}"), g);
        }
        Ok(rep)
    }
}

/// A minimization problem over [`QuadraticModel`] centred at `center`.
///
/// Unbounded, budget 1000, starting at the origin; chain further builder
/// calls to add constraints or change the budget.
pub fn quadratic_problem(
    center: Vec<Real>,
    noise_sd: Real,
) -> SimulationProblemBuilder<QuadraticModel> {
    let dim = center.len();
    let mut model = QuadraticModel::new(dim);
    model.factors.center = center;
    model.factors.noise_sd = noise_sd;
    SimulationProblem::builder(model)
        .name("QUADRATIC-1")
        .dim(dim)
        .objective_sign(ObjectiveSign::Minimize)
        .initial_solution(Array::zeros(dim))
        .vector_to_factors(|x, f: &QuadraticFactors| QuadraticFactors {
            x: x.to_vec(),
            ..f.clone()
        })
        .factors_to_vector(|f: &QuadraticFactors| Array::from_slice(&f.x))
        .responses_to_objectives(|r| Ok(Array::from_slice(&[r.scalar("value")?])))
        .responses_to_gradients(move |r| {
            let g = (0..dim).map(|i| r.gradient("value", &format!("x{i}"))).collect();
            Ok(vec![Array::from_vec(g)])
        })
}
