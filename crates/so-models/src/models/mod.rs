//! Reference simulation models.
//!
//! Small, fully specified models used to exercise the solvers end to end.

/// M/M/1 queue with an IPA gradient in the service rate.
pub mod mm1_queue;

/// Noisy separable quadratic.
pub mod quadratic;

pub use mm1_queue::{mm1_problem, Mm1Factors, Mm1QueueModel};
pub use quadratic::{quadratic_problem, QuadraticFactors, QuadraticModel};
