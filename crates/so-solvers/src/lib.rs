//! # so-solvers
//!
//! Budget-constrained solvers over [`so_models::Problem`]: the [`Solver`]
//! contract and its [`Trail`], the shared [`FeasibilityEngine`], a
//! randomized [`DirectSearch`] and a gradient-based [`ActiveSet`] method.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Active-set method with finite-difference gradients and line search.
pub mod active_set;

/// Randomized direct search with sufficient decrease.
pub mod direct_search;

/// Phase-one search, projection and feasibility tests.
pub mod feasibility;

/// Solver contract, trails and events.
pub mod solver;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use active_set::{ActiveSet, ActiveSetConfig};
pub use direct_search::{DirectSearch, DirectSearchConfig};
pub use feasibility::FeasibilityEngine;
pub use solver::{Solver, SolverEvent, Termination, Trail};
