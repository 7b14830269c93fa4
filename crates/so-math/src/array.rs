//! `Array`: a one-dimensional vector of reals.
//!
//! Decision vectors, gradients, constraint right-hand sides and response
//! means are all `Array`s. The newtype wraps `nalgebra::DVector<f64>`;
//! arithmetic is defined for owned and borrowed operands alike.

use nalgebra::DVector;
use so_core::Real;
use std::fmt;
use std::ops::{Add, Div, Index, IndexMut, Mul, Neg, Sub};

/// A dynamically-sized 1D vector of `Real` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Array(DVector<Real>);

impl Array {
    /// Create a zero-filled array of length `n`.
    pub fn zeros(n: usize) -> Self {
        Self(DVector::zeros(n))
    }

    /// Create an array filled with `value`.
    pub fn from_element(n: usize, value: Real) -> Self {
        Self(DVector::from_element(n, value))
    }

    /// Create an array from a slice.
    pub fn from_slice(data: &[Real]) -> Self {
        Self(DVector::from_column_slice(data))
    }

    /// Create an array from a `Vec`.
    pub fn from_vec(data: Vec<Real>) -> Self {
        Self(DVector::from_vec(data))
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the elements as a slice.
    pub fn as_slice(&self) -> &[Real] {
        self.0.as_slice()
    }

    /// Return the elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        self.0.as_mut_slice()
    }

    /// Borrow the inner `DVector`.
    pub fn inner(&self) -> &DVector<Real> {
        &self.0
    }

    /// Dot product with another array.
    pub fn dot(&self, other: &Array) -> Real {
        self.0.dot(&other.0)
    }

    /// Euclidean (L2) norm.
    pub fn norm(&self) -> Real {
        self.0.norm()
    }

    /// Manhattan (L1) norm.
    pub fn norm_l1(&self) -> Real {
        self.0.lp_norm(1)
    }

    /// `true` when every element is finite (no NaN, no infinity).
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Sum of all elements.
    pub fn sum(&self) -> Real {
        self.0.sum()
    }

    /// Multiply every element by `scalar`.
    pub fn scale(&self, scalar: Real) -> Self {
        Self(&self.0 * scalar)
    }

    /// Iterator over elements.
    pub fn iter(&self) -> impl Iterator<Item = &Real> {
        self.0.iter()
    }

    /// Copy the elements into a `Vec`.
    pub fn to_vec(&self) -> Vec<Real> {
        self.0.iter().copied().collect()
    }
}

impl From<DVector<Real>> for Array {
    fn from(v: DVector<Real>) -> Self {
        Self(v)
    }
}

impl From<Vec<Real>> for Array {
    fn from(v: Vec<Real>) -> Self {
        Self::from_vec(v)
    }
}

impl Index<usize> for Array {
    type Output = Real;
    fn index(&self, i: usize) -> &Real {
        &self.0[i]
    }
}

impl IndexMut<usize> for Array {
    fn index_mut(&mut self, i: usize) -> &mut Real {
        &mut self.0[i]
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

macro_rules! elementwise {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&Array> for &Array {
            type Output = Array;
            fn $method(self, rhs: &Array) -> Array {
                Array(&self.0 $op &rhs.0)
            }
        }

        impl $trait<&Array> for Array {
            type Output = Array;
            fn $method(self, rhs: &Array) -> Array {
                Array(self.0 $op &rhs.0)
            }
        }

        impl $trait<Array> for Array {
            type Output = Array;
            fn $method(self, rhs: Array) -> Array {
                Array(self.0 $op rhs.0)
            }
        }
    };
}

macro_rules! scalar {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<Real> for &Array {
            type Output = Array;
            fn $method(self, rhs: Real) -> Array {
                Array(&self.0 $op rhs)
            }
        }

        impl $trait<Real> for Array {
            type Output = Array;
            fn $method(self, rhs: Real) -> Array {
                Array(self.0 $op rhs)
            }
        }
    };
}

elementwise!(Add, add, +);
elementwise!(Sub, sub, -);
scalar!(Mul, mul, *);
scalar!(Div, div, /);

impl Neg for &Array {
    type Output = Array;
    fn neg(self) -> Array {
        Array(-&self.0)
    }
}

impl Neg for Array {
    type Output = Array;
    fn neg(self) -> Array {
        Array(-self.0)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        assert_eq!(Array::zeros(3).to_vec(), vec![0.0; 3]);
        assert_eq!(Array::from_element(2, 1.5).to_vec(), vec![1.5, 1.5]);
        assert_eq!(Array::from(vec![1.0, 2.0]), Array::from_slice(&[1.0, 2.0]));
    }

    #[test]
    fn norms_and_sums() {
        let a = Array::from_slice(&[3.0, -4.0]);
        assert!((a.norm() - 5.0).abs() < 1e-12);
        assert!((a.norm_l1() - 7.0).abs() < 1e-12);
        assert!((a.sum() + 1.0).abs() < 1e-12);
        assert!((a.dot(&a) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn owned_and_borrowed_arithmetic_agree() {
        let a = Array::from_slice(&[1.0, 2.0]);
        let b = Array::from_slice(&[0.5, -1.0]);
        assert_eq!(&a + &b, a.clone() + &b);
        assert_eq!(&a - &b, a.clone() - b.clone());
        assert_eq!((&a * 2.0).to_vec(), vec![2.0, 4.0]);
        assert_eq!((a.clone() / 2.0).to_vec(), vec![0.5, 1.0]);
        assert_eq!(-&a, a.scale(-1.0));
    }

    #[test]
    fn finiteness() {
        assert!(Array::from_slice(&[1.0, 2.0]).is_finite());
        assert!(!Array::from_slice(&[1.0, Real::NAN]).is_finite());
    }

    #[test]
    fn display_lists_elements() {
        assert_eq!(Array::from_slice(&[1.0, 2.5]).to_string(), "[1, 2.5]");
    }
}
