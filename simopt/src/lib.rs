//! # simopt
//!
//! Budget-constrained optimization of stochastic simulation models under
//! linear constraints.
//!
//! This crate is a **façade** that re-exports the workspace crates.
//! Application code should depend on this crate rather than the individual
//! `so-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use simopt::models::models::quadratic_problem;
//! use simopt::solvers::{DirectSearch, DirectSearchConfig, Solver};
//!
//! let mut problem = quadratic_problem(vec![3.0], 0.0).budget(500).build()?;
//! let mut solver = DirectSearch::new(DirectSearchConfig { r: 1, ..Default::default() })?;
//! let trail = solver.solve(&mut problem)?;
//!
//! let best = trail.best().expect("at least one recommendation");
//! assert!((best.x()[0] - 3.0).abs() < 0.1);
//! # Ok::<(), simopt::core::Error>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core aliases, errors and declarative validation.
pub use so_core as core;

/// Arrays, statistics, random streams, LP and projection solvers.
pub use so_math as math;

/// Model contract, problems, solutions, budgets and reference models.
pub use so_models as models;

/// Feasibility engine and solvers.
pub use so_solvers as solvers;

