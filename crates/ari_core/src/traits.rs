use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A trait for types the mixing-law equations can be evaluated on.
/// Implemented for `f64` and for `Dual`, so one generic expression yields both
/// the objective value and its exact derivative.
pub trait Scalar:
    Copy
    + Debug
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Lifts a constant into the scalar type (zero derivative).
    fn constant(value: f64) -> Self;

    /// The real part.
    fn value(self) -> f64;

    fn sqrt(self) -> Self;
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self {
        value
    }

    fn value(self) -> f64 {
        self
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

/// A scalar objective over a fixed-dimension parameter vector.
pub trait Objective {
    /// Returns the number of free parameters.
    fn dimension(&self) -> usize;

    /// Evaluates the objective at x.
    fn evaluate<T: Scalar>(&self, x: &[T]) -> T;
}
