//! Running sample statistics over replications.
//!
//! [`Statistics`] is a Welford accumulator for scalar responses; it keeps
//! mean and variance numerically stable over long replication runs and
//! reports a Student-t confidence half-width through `statrs`.
//! [`MeanVector`] averages vector-valued samples (objective vectors,
//! gradient estimates) component-wise.

use crate::array::Array;
use so_core::{
    errors::{Error, Result},
    Real,
};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Incremental scalar statistics accumulator.
#[derive(Debug, Clone)]
pub struct Statistics {
    count: usize,
    mean: Real,
    m2: Real,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Add a single sample.
    pub fn add(&mut self, x: Real) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as Real;
        self.m2 += delta * (x - self.mean);
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.count
    }

    /// Sample mean.  Returns `None` if no samples have been added.
    pub fn mean(&self) -> Option<Real> {
        (self.count > 0).then_some(self.mean)
    }

    /// Unbiased (Bessel-corrected) variance.  Returns `None` for fewer
    /// than 2 samples.
    pub fn variance(&self) -> Option<Real> {
        (self.count >= 2).then(|| self.m2 / (self.count as Real - 1.0))
    }

    /// Standard deviation.  Returns `None` for fewer than 2 samples.
    pub fn std_dev(&self) -> Option<Real> {
        self.variance().map(Real::sqrt)
    }

    /// Standard error of the mean.
    pub fn std_error(&self) -> Option<Real> {
        self.std_dev().map(|s| s / (self.count as Real).sqrt())
    }

    /// Half-width of the two-sided Student-t confidence interval on the
    /// mean at the given `confidence` level (e.g. `0.95`).
    ///
    /// Returns `Ok(None)` for fewer than 2 samples.
    pub fn confidence_half_width(&self, confidence: Real) -> Result<Option<Real>> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(Error::InvalidArgument(format!(
                "confidence level must lie in (0, 1), got {confidence}"
            )));
        }
        let Some(se) = self.std_error() else {
            return Ok(None);
        };
        let dof = (self.count - 1) as Real;
        let t = StudentsT::new(0.0, 1.0, dof)
            .map_err(|e| Error::Runtime(format!("Student-t with {dof} dof: {e}")))?;
        let q = t.inverse_cdf(0.5 + confidence / 2.0);
        Ok(Some(q * se))
    }

    /// Reset the accumulator to its initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// ── Vector means ─────────────────────────────────────────────────────────────

/// Component-wise running mean of fixed-length vectors.
#[derive(Debug, Clone)]
pub struct MeanVector {
    count: usize,
    mean: Array,
}

impl MeanVector {
    /// Empty accumulator for vectors of length `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: Array::zeros(dim),
        }
    }

    /// Fold `sample` into the running mean.
    pub fn add(&mut self, sample: &Array) -> Result<()> {
        if sample.size() != self.mean.size() {
            return Err(Error::DimensionMismatch {
                expected: self.mean.size(),
                found: sample.size(),
            });
        }
        self.count += 1;
        let n = self.count as Real;
        for (m, x) in self.mean.as_mut_slice().iter_mut().zip(sample.iter()) {
            *m += (x - *m) / n;
        }
        Ok(())
    }

    /// Number of vectors folded in.
    pub fn samples(&self) -> usize {
        self.count
    }

    /// Current mean, `None` before the first sample.
    pub fn mean(&self) -> Option<&Array> {
        (self.count > 0).then_some(&self.mean)
    }
}
