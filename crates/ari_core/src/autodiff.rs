use crate::traits::{Objective, Scalar};
use num_traits::{One, Zero};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Dual number for forward-mode differentiation.
/// val: real part
/// eps: infinitesimal part
///
/// Only the field operations and `sqrt` are implemented: the mixing-law
/// residuals are rational in (Csh, Rs) and the norms add one square root, so
/// `Scalar` asks for nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    /// A variable seeded with unit derivative.
    pub fn variable(val: f64) -> Self {
        Self::new(val, 1.0)
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

impl One for Dual {
    fn one() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.val * rhs.val;
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / denom,
        )
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl Scalar for Dual {
    fn constant(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    fn value(self) -> f64 {
        self.val
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        Self::new(s, self.eps / (2.0 * s))
    }
}

/// Evaluates the objective and its gradient at x.
///
/// One dual pass per coordinate: coordinate j carries eps = 1, the rest 0.
/// Returns the objective value; the gradient is written into `out`.
pub fn gradient<O: Objective>(objective: &O, x: &[f64], out: &mut [f64]) -> f64 {
    let dim = x.len();
    let mut dual_x = vec![Dual::zero(); dim];
    let value = objective.evaluate(x);

    for j in 0..dim {
        for i in 0..dim {
            dual_x[i] = if i == j {
                Dual::variable(x[i])
            } else {
                Dual::constant(x[i])
            };
        }
        let result = objective.evaluate(&dual_x);
        out[j] = result.eps;
    }

    value
}
