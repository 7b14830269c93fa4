//! Linear constraint sets on a decision vector.
//!
//! A [`LinearConstraints`] holds box bounds plus an optional equality block
//! `Ce·x = de` and an optional inequality block `Ci·x ≤ di`. Shapes are
//! validated once at construction; afterwards the set is immutable.

use crate::{array::Array, matrix::Matrix};
use so_core::{
    errors::{Error, Result},
    Real,
};

/// A linear block `A·x (rel) b`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearBlock {
    /// Coefficient matrix, one row per constraint.
    pub matrix: Matrix,
    /// Right-hand side.
    pub rhs: Array,
}

/// Constraints stacked into the single form `C·x ≤ d` / `C·x = d`.
///
/// `C = [Ce; Ci; −I_L; I_U]`, `d = [de; di; −lower_L; upper_U]`, where `L`
/// and `U` index the coordinates with a finite lower / upper bound. The
/// first `n_eq` rows are equalities.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedConstraints {
    /// Stacked coefficient matrix.
    pub c: Matrix,
    /// Stacked right-hand side.
    pub d: Array,
    /// Number of leading equality rows.
    pub n_eq: usize,
}

impl StackedConstraints {
    /// Total number of rows.
    pub fn rows(&self) -> usize {
        self.c.rows()
    }

    /// Whether row `i` is an equality row.
    pub fn is_equality(&self, i: usize) -> bool {
        i < self.n_eq
    }

    /// Slack `d_i − C_i·x` of row `i`.
    pub fn slack(&self, i: usize, x: &Array) -> Real {
        self.d[i] - self.c.row_dot(i, x)
    }
}

/// Box bounds plus optional equality and inequality blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraints {
    lower: Array,
    upper: Array,
    equality: Option<LinearBlock>,
    inequality: Option<LinearBlock>,
}

impl LinearConstraints {
    /// Box-only constraint set. Bounds may be infinite but must not be NaN,
    /// and `lower ≤ upper` component-wise.
    pub fn new(lower: Array, upper: Array) -> Result<Self> {
        if lower.size() != upper.size() {
            return Err(Error::DimensionMismatch {
                expected: lower.size(),
                found: upper.size(),
            });
        }
        for (i, (l, u)) in lower.iter().zip(upper.iter()).enumerate() {
            if l.is_nan() || u.is_nan() {
                return Err(Error::InvalidArgument(format!("bound {i} is NaN")));
            }
            if l > u {
                return Err(Error::InvalidArgument(format!(
                    "lower bound {l} exceeds upper bound {u} at coordinate {i}"
                )));
            }
        }
        Ok(Self {
            lower,
            upper,
            equality: None,
            inequality: None,
        })
    }

    /// No bounds, no blocks.
    pub fn unbounded(dim: usize) -> Self {
        Self {
            lower: Array::from_element(dim, Real::NEG_INFINITY),
            upper: Array::from_element(dim, Real::INFINITY),
            equality: None,
            inequality: None,
        }
    }

    fn block(&self, matrix: Matrix, rhs: Array, what: &str) -> Result<LinearBlock> {
        if matrix.cols() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                found: matrix.cols(),
            });
        }
        if matrix.rows() != rhs.size() {
            return Err(Error::DimensionMismatch {
                expected: matrix.rows(),
                found: rhs.size(),
            });
        }
        if !rhs.is_finite() || matrix.inner().iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "{what} block contains non-finite entries"
            )));
        }
        Ok(LinearBlock { matrix, rhs })
    }

    /// Attach the equality block `ce·x = de`. An empty block is dropped.
    pub fn with_equality(mut self, ce: Matrix, de: Array) -> Result<Self> {
        let block = self.block(ce, de, "equality")?;
        self.equality = (block.rhs.size() > 0).then_some(block);
        Ok(self)
    }

    /// Attach the inequality block `ci·x ≤ di`. An empty block is dropped.
    pub fn with_inequality(mut self, ci: Matrix, di: Array) -> Result<Self> {
        let block = self.block(ci, di, "inequality")?;
        self.inequality = (block.rhs.size() > 0).then_some(block);
        Ok(self)
    }

    /// Decision-vector dimension.
    pub fn dim(&self) -> usize {
        self.lower.size()
    }

    /// Lower bounds.
    pub fn lower(&self) -> &Array {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &Array {
        &self.upper
    }

    /// Equality block, if any.
    pub fn equality(&self) -> Option<&LinearBlock> {
        self.equality.as_ref()
    }

    /// Inequality block, if any.
    pub fn inequality(&self) -> Option<&LinearBlock> {
        self.inequality.as_ref()
    }

    /// Number of equality rows.
    pub fn n_eq(&self) -> usize {
        self.equality.as_ref().map_or(0, |b| b.rhs.size())
    }

    /// `true` when there are no blocks and every bound is infinite.
    pub fn is_unconstrained(&self) -> bool {
        self.equality.is_none()
            && self.inequality.is_none()
            && self.lower.iter().all(|l| *l == Real::NEG_INFINITY)
            && self.upper.iter().all(|u| *u == Real::INFINITY)
    }

    /// Whether `x` satisfies every block and bound within `tol`.
    pub fn is_feasible(&self, x: &Array, tol: Real) -> bool {
        if x.size() != self.dim() || !x.is_finite() {
            return false;
        }
        let within_bounds = x
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(v, (l, u))| *v >= l - tol && *v <= u + tol);
        if !within_bounds {
            return false;
        }
        if let Some(eq) = &self.equality {
            let r = eq.matrix.mul_vec(x);
            if r.iter().zip(eq.rhs.iter()).any(|(a, b)| (a - b).abs() > tol) {
                return false;
            }
        }
        if let Some(ineq) = &self.inequality {
            let r = ineq.matrix.mul_vec(x);
            if r.iter().zip(ineq.rhs.iter()).any(|(a, b)| *a > b + tol) {
                return false;
            }
        }
        true
    }

    /// The stacked `(C, d, n_eq)` form.
    pub fn stacked(&self) -> StackedConstraints {
        let n = self.dim();
        let mut rows: Vec<Vec<Real>> = Vec::new();
        let mut rhs: Vec<Real> = Vec::new();
        for block in [&self.equality, &self.inequality].into_iter().flatten() {
            for i in 0..block.matrix.rows() {
                rows.push(block.matrix.row(i).to_vec());
                rhs.push(block.rhs[i]);
            }
        }
        for (j, l) in self.lower.iter().enumerate() {
            if l.is_finite() {
                let mut row = vec![0.0; n];
                row[j] = -1.0;
                rows.push(row);
                rhs.push(-l);
            }
        }
        for (j, u) in self.upper.iter().enumerate() {
            if u.is_finite() {
                let mut row = vec![0.0; n];
                row[j] = 1.0;
                rows.push(row);
                rhs.push(*u);
            }
        }
        let data: Vec<Real> = rows.into_iter().flatten().collect();
        StackedConstraints {
            c: Matrix::from_row_slice(rhs.len(), n, &data),
            d: Array::from_vec(rhs),
            n_eq: self.n_eq(),
        }
    }
}
