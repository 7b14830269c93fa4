//! # so-math
//!
//! Numerical building blocks for the optimization engine: array/matrix
//! newtypes (over nalgebra), running statistics (with Student-t intervals
//! via statrs), addressable random streams (MT19937-64), linear constraint
//! sets, a dense simplex LP solver and a Euclidean projection QP.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// `Array` newtype over `nalgebra::DVector`.
pub mod array;

/// Tie-breaking helpers.
pub mod comparison;

/// Box bounds plus equality / inequality blocks.
pub mod constraints;

/// Two-phase simplex.
pub mod linear_programming;

/// `Matrix` newtype over `nalgebra::DMatrix`.
pub mod matrix;

/// Nearest-point projection onto a polyhedron.
pub mod projection;

/// Addressable random streams.
pub mod random_numbers;

/// Statistics accumulators.
pub mod statistics;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::Array;
pub use comparison::argmin_first;
pub use constraints::{LinearConstraints, StackedConstraints};
pub use linear_programming::{LinearProgram, LpSolution, LpStatus};
pub use matrix::Matrix;
pub use projection::{ProjectionQp, QpSolution, QpStatus};
pub use random_numbers::{RandomStream, StreamIndex};
pub use statistics::{MeanVector, Statistics};
