//! Declarative factor validation.
//!
//! Configuration structs (solver factors, model factors, problem settings)
//! describe their constraints as a static list of `(name, predicate)` pairs.
//! [`validate`] runs every predicate in order and turns the first failure
//! into an [`Error::InvalidFactor`] naming the offending factor.
//!
//! ```
//! use so_core::validation::{self, Check, Validate};
//!
//! struct Step {
//!     size: f64,
//! }
//!
//! impl Validate for Step {
//!     const CHECKS: &'static [Check<Self>] = &[("size", |s| validation::positive(s.size))];
//! }
//!
//! assert!(Step { size: 1.0 }.validate().is_ok());
//! assert!(Step { size: 0.0 }.validate().is_err());
//! ```

use crate::errors::{Error, Result};
use crate::Real;

/// Outcome of a single predicate: `Err` carries the human-readable reason.
pub type Verdict = std::result::Result<(), String>;

/// A named validation predicate over `T`.
pub type Check<T> = (&'static str, fn(&T) -> Verdict);

/// Run `checks` against `subject`, stopping at the first failure.
pub fn validate<T>(subject: &T, checks: &[Check<T>]) -> Result<()> {
    for &(factor, predicate) in checks {
        predicate(subject).map_err(|reason| Error::InvalidFactor {
            factor,
            reason,
        })?;
    }
    Ok(())
}

/// Types whose invariants are expressed as a declarative check list.
pub trait Validate: Sized + 'static {
    /// The `(name, predicate)` pairs describing every factor constraint.
    const CHECKS: &'static [Check<Self>];

    /// Evaluate [`Validate::CHECKS`] against `self`.
    fn validate(&self) -> Result<()> {
        validate(self, Self::CHECKS)
    }
}

/// Pass when `condition` holds, fail with `reason` otherwise.
pub fn require(condition: bool, reason: impl Into<String>) -> Verdict {
    if condition {
        Ok(())
    } else {
        Err(reason.into())
    }
}

/// `value > 0` and finite.
pub fn positive(value: Real) -> Verdict {
    require(
        value > 0.0 && value.is_finite(),
        format!("must be positive and finite, got {value}"),
    )
}

/// `value > bound`.
pub fn greater_than(value: Real, bound: Real) -> Verdict {
    require(value > bound, format!("must exceed {bound}, got {value}"))
}

/// `0 < value < 1`.
pub fn open_unit_interval(value: Real) -> Verdict {
    require(
        value > 0.0 && value < 1.0,
        format!("must lie in (0, 1), got {value}"),
    )
}

/// `count >= minimum`.
pub fn at_least(count: usize, minimum: usize) -> Verdict {
    require(
        count >= minimum,
        format!("must be at least {minimum}, got {count}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Factors {
        theta: Real,
        gamma: Real,
        set_size: usize,
    }

    impl Validate for Factors {
        const CHECKS: &'static [Check<Self>] = &[
            ("theta", |f| open_unit_interval(f.theta)),
            ("gamma", |f| greater_than(f.gamma, 1.0)),
            ("set_size", |f| at_least(f.set_size, 1)),
        ];
    }

    #[test]
    fn valid_factors_pass() {
        let f = Factors {
            theta: 0.2,
            gamma: 2.0,
            set_size: 10,
        };
        assert!(f.validate().is_ok());
    }

    #[test]
    fn first_failure_is_reported_by_name() {
        let f = Factors {
            theta: 0.2,
            gamma: 1.0,
            set_size: 0,
        };
        match f.validate() {
            Err(Error::InvalidFactor { factor, .. }) => assert_eq!(factor, "gamma"),
            other => panic!("expected gamma to fail, got {other:?}"),
        }
    }

    #[test]
    fn positive_rejects_infinity_and_nan() {
        assert!(positive(Real::INFINITY).is_err());
        assert!(positive(Real::NAN).is_err());
        assert!(positive(1e-12).is_ok());
    }
}
