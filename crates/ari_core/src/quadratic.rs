//! Closed-form alternative: eliminate Rs and solve a quadratic in Csh.
//!
//! From eq1, Rs = (Rv − Csh·Rvsh) / (1 − Csh). Substituting into eq2 and
//! clearing denominators gives a·Csh² + b·Csh + c = 0 with
//!
//!   a = Rh·Rvsh − Rh·Rhsh
//!   b = 2·Rh·Rhsh − Rv·Rh − Rvsh·Rhsh
//!   c = Rv·Rhsh − Rh·Rhsh
//!
//! Roots are returned unclamped and may be negative, above one or complex.

use crate::error::Result;
use crate::parallel::map_slots;
use crate::types::{validate_samples, QuadraticResult, Sample, ShaleEndMember};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Leading coefficients below this fraction of the largest one are dropped.
const LEADING_ZERO_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl QuadraticCoefficients {
    pub fn for_sample(rv: f64, rh: f64, end_member: &ShaleEndMember) -> Self {
        let ShaleEndMember { rvsh, rhsh } = *end_member;
        Self {
            a: rh * rvsh - rh * rhsh,
            b: 2.0 * rh * rhsh - rv * rh - rvsh * rhsh,
            c: rv * rhsh - rh * rhsh,
        }
    }

    pub fn evaluate(&self, csh: Complex<f64>) -> Complex<f64> {
        csh * csh * self.a + csh * self.b + self.c
    }

    pub fn roots(&self) -> Vec<Complex<f64>> {
        polynomial_roots(&[self.a, self.b, self.c])
    }
}

/// Roots of a polynomial given highest-degree coefficient first.
///
/// Negligible leading coefficients are stripped (reducing the degree),
/// trailing zeros contribute roots at the origin, and the rest come from the
/// eigenvalues of the companion matrix.
pub fn polynomial_roots(coefficients: &[f64]) -> Vec<Complex<f64>> {
    let scale = coefficients
        .iter()
        .fold(0.0f64, |acc, c| acc.max(c.abs()));
    if !(scale > 0.0) || !scale.is_finite() {
        return Vec::new();
    }

    let Some(leading) = coefficients
        .iter()
        .position(|c| c.abs() > LEADING_ZERO_TOLERANCE * scale)
    else {
        return Vec::new();
    };
    let trailing = coefficients.iter().rev().take_while(|&&c| c == 0.0).count();
    let core = &coefficients[leading..coefficients.len() - trailing];

    let mut roots = match core.len() {
        0 | 1 => Vec::new(),
        2 => vec![Complex::new(-core[1] / core[0], 0.0)],
        n => {
            let degree = n - 1;
            let mut companion = DMatrix::<f64>::zeros(degree, degree);
            for j in 0..degree {
                companion[(0, j)] = -core[j + 1] / core[0];
            }
            for i in 1..degree {
                companion[(i, i - 1)] = 1.0;
            }
            companion.complex_eigenvalues().iter().copied().collect()
        }
    };
    roots.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(trailing));
    roots
}

/// Packs root-finder output into the two-slot result.
pub fn roots_to_result(roots: &[Complex<f64>]) -> QuadraticResult {
    match roots {
        [] => QuadraticResult {
            root1: QuadraticResult::absent(),
            root2: QuadraticResult::absent(),
        },
        [only] => QuadraticResult {
            root1: *only,
            root2: QuadraticResult::absent(),
        },
        [first, second, ..] => QuadraticResult {
            root1: *first,
            root2: *second,
        },
    }
}

pub fn quadratic_pair(rv: f64, rh: f64, end_member: &ShaleEndMember) -> QuadraticResult {
    roots_to_result(&QuadraticCoefficients::for_sample(rv, rh, end_member).roots())
}

/// Solves every sample independently. The batch is validated first.
pub fn quadratic_inversion(
    samples: &[Sample],
    end_member: ShaleEndMember,
) -> Result<Vec<QuadraticResult>> {
    validate_samples(samples)?;
    let results = map_slots(samples, |_, sample| {
        quadratic_pair(sample.rv, sample.rh, &end_member)
    });
    let real = results
        .iter()
        .filter(|r| {
            let (r1, r2) = r.real_roots();
            r1.is_finite() || r2.is_finite()
        })
        .count();
    debug!(
        samples = results.len(),
        with_real_root = real,
        "quadratic inversion pass complete"
    );
    Ok(results)
}
