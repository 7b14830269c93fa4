//! Replication budget accounting.

use so_core::{
    errors::{Error, Result},
    Size,
};

/// A fixed ceiling on replications and a monotone counter of those spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    total: Size,
    expended: Size,
}

impl Budget {
    /// A fresh budget of `total` replications (`total > 0`).
    pub fn new(total: Size) -> Result<Self> {
        if total == 0 {
            return Err(Error::InvalidFactor {
                factor: "budget",
                reason: "must be at least 1".into(),
            });
        }
        Ok(Self { total, expended: 0 })
    }

    /// The ceiling.
    pub fn total(&self) -> Size {
        self.total
    }

    /// Replications consumed so far.
    pub fn expended(&self) -> Size {
        self.expended
    }

    /// Replications still available.
    pub fn remaining(&self) -> Size {
        self.total - self.expended
    }

    /// `true` once nothing remains.
    pub fn is_exhausted(&self) -> bool {
        self.expended >= self.total
    }

    /// Whether `n` more replications fit.
    pub fn can_afford(&self, n: Size) -> bool {
        n <= self.remaining()
    }

    /// Consume `n` replications. Fails without consuming anything when
    /// fewer than `n` remain.
    pub fn charge(&mut self, n: Size) -> Result<()> {
        if !self.can_afford(n) {
            return Err(Error::BudgetExceeded {
                requested: n,
                remaining: self.remaining(),
            });
        }
        self.expended += n;
        Ok(())
    }
}
