//! Error types for simopt-rs.
//!
//! Every fallible operation in the workspace returns [`Result`], whose error
//! is the single `thiserror`-derived [`Error`] enum below. The `ensure!`
//! macro covers the common precondition shape.

use thiserror::Error;

/// The top-level error type used throughout simopt-rs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error.
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated.
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two objects that must agree in size do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The size that was required.
        expected: usize,
        /// The size that was supplied.
        found: usize,
    },

    /// A configuration factor failed its validation predicate.
    #[error("invalid factor `{factor}`: {reason}")]
    InvalidFactor {
        /// Name of the offending factor.
        factor: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The feasible region could not be reached: a phase-one, projection or
    /// direction-finding program did not terminate with optimal status.
    #[error("infeasible region: {0}")]
    InfeasibleRegion(String),

    /// `simulate` was asked for replications the budget cannot pay for.
    #[error("budget exceeded: requested {requested} replications, {remaining} remaining")]
    BudgetExceeded {
        /// Replications requested by the caller.
        requested: usize,
        /// Replications that were still available when the call was made.
        remaining: usize,
    },

    /// Every candidate search direction collapsed to zero after projection.
    #[error("all search directions collapsed to zero after projection")]
    DegenerateDirection,

    /// A finite-difference gradient estimate came out identically zero.
    #[error("finite-difference gradient estimate is identically zero")]
    ZeroGradientEstimate,
}

/// Shorthand `Result` type used throughout simopt-rs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use so_core::{ensure, errors::Error};
/// fn positive(x: f64) -> so_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_message_names_both_counts() {
        let e = Error::BudgetExceeded {
            requested: 30,
            remaining: 4,
        };
        assert_eq!(
            e.to_string(),
            "budget exceeded: requested 30 replications, 4 remaining"
        );
    }

    fn checked_sqrt(x: f64) -> Result<f64> {
        crate::ensure!(x >= 0.0, "cannot take the root of {x}");
        Ok(x.sqrt())
    }

    #[test]
    fn ensure_returns_a_precondition_error() {
        assert_eq!(checked_sqrt(4.0), Ok(2.0));
        assert_eq!(
            checked_sqrt(-1.0),
            Err(Error::Precondition("cannot take the root of -1".into()))
        );
    }

    #[test]
    fn invalid_factor_message() {
        let e = Error::InvalidFactor {
            factor: "theta",
            reason: "must lie in (0, 1)".into(),
        };
        assert_eq!(e.to_string(), "invalid factor `theta`: must lie in (0, 1)");
    }
}
