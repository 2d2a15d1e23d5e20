//! Numeric representations the residual graphs are instantiated over.
//!
//! Every equation set is generic over a [`Scalar`]. The Residual computation
//! mode uses plain `f64`; the Jacobian mode uses [`Dual`], a forward-mode dual
//! number whose infinitesimal part carries the derivative with respect to a
//! single seeded solution coefficient.
//!
//! Graph evaluation only forms sums of products of field values with constant
//! basis weights, so the arithmetic a scalar needs is `zero`, `+` and `*`.

use num_traits::Zero;
use std::fmt::Debug;
use std::ops::{Add, Mul};

/// A trait for types that can be used as field values in a residual graph.
pub trait Scalar: Copy + Debug + Zero + Add<Output = Self> + Mul<Output = Self> + 'static {
    /// Lifts a constant (no derivative information) into the representation.
    fn constant(value: f64) -> Self;

    /// The plain value, dropping any derivative information.
    fn value(&self) -> f64;
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self {
        value
    }

    fn value(&self) -> f64 {
        *self
    }
}

/// Forward-mode dual number.
/// val: real part
/// eps: derivative part
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    /// A dual number seeded as the independent variable.
    pub fn variable(val: f64) -> Self {
        Self::new(val, 1.0)
    }
}

impl Scalar for Dual {
    fn constant(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    fn value(&self) -> f64 {
        self.val
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}
