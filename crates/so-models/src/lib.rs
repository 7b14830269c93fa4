//! # so-models
//!
//! Everything between a simulation model and a solver: the [`Model`]
//! contract, per-point [`Solution`] records, the replication [`Budget`],
//! the [`Problem`] abstraction with its builder-configured
//! [`SimulationProblem`], and common-random-number stream management.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Replication budget.
pub mod budget;

/// Common random numbers across solutions.
pub mod crn;

/// The simulation-model contract.
pub mod model;

/// Reference models.
pub mod models;

/// Problems over simulation models.
pub mod problem;

/// Candidate points and their observations.
pub mod solution;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use budget::Budget;
pub use crn::StreamProgenitor;
pub use model::{Model, Replication, Response};
pub use problem::{ObjectiveSign, Problem, SimulationProblem, SimulationProblemBuilder};
pub use solution::Solution;
