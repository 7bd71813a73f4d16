//! Per-sample records flowing through an inversion run.

use crate::error::{InversionError, Result, SampleField};
use crate::minimize::Convergence;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// One depth sample of the well log.
///
/// The induction curves (AT10..AT90) and GR are carried through for
/// reporting; only `rv`, `rh` (and `gr` for end-member picking) enter the
/// numerics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub depth: f64,
    pub at10: f64,
    pub at30: f64,
    pub at60: f64,
    pub at90: f64,
    pub gr: f64,
    pub rv: f64,
    pub rh: f64,
}

impl Sample {
    /// A sample carrying only the curves the inversion reads.
    pub fn new(depth: f64, gr: f64, rv: f64, rh: f64) -> Self {
        Self {
            depth,
            at10: f64::NAN,
            at30: f64::NAN,
            at60: f64::NAN,
            at90: f64::NAN,
            gr,
            rv,
            rh,
        }
    }

    /// Copy of this sample with the anisotropic pair replaced.
    pub fn with_resistivities(&self, rv: f64, rh: f64) -> Self {
        Self { rv, rh, ..*self }
    }

    /// Returns the first non-positive (or NaN) field of the anisotropic pair.
    pub fn invalid_field(&self) -> Option<(SampleField, f64)> {
        if !(self.rv > 0.0) {
            return Some((SampleField::Rv, self.rv));
        }
        if !(self.rh > 0.0) {
            return Some((SampleField::Rh, self.rh));
        }
        None
    }
}

/// Checks every sample before any solve; the first offender fails the batch.
/// Rv and Rh must be positive and depth strictly increasing.
pub fn validate_samples(samples: &[Sample]) -> Result<()> {
    if samples.is_empty() {
        return Err(InversionError::configuration(
            "samples",
            "at least one sample is required",
        ));
    }
    for (index, sample) in samples.iter().enumerate() {
        if let Some((field, value)) = sample.invalid_field() {
            return Err(InversionError::InvalidSample {
                index,
                depth: sample.depth,
                field,
                value,
            });
        }
        if index > 0 {
            let previous = samples[index - 1].depth;
            if !(sample.depth > previous) {
                return Err(InversionError::UnorderedDepth {
                    index,
                    depth: sample.depth,
                    previous,
                });
            }
        }
    }
    Ok(())
}

/// Reference resistivities of the pure-shale end member.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShaleEndMember {
    pub rvsh: f64,
    pub rhsh: f64,
}

impl ShaleEndMember {
    pub fn new(rvsh: f64, rhsh: f64) -> Result<Self> {
        if !(rvsh > 0.0) || !rvsh.is_finite() {
            return Err(InversionError::configuration(
                "Rvsh",
                format!("shale vertical resistivity must be positive and finite, got {rvsh}"),
            ));
        }
        if !(rhsh > 0.0) || !rhsh.is_finite() {
            return Err(InversionError::configuration(
                "Rhsh",
                format!("shale horizontal resistivity must be positive and finite, got {rhsh}"),
            ));
        }
        Ok(Self { rvsh, rhsh })
    }
}

/// Outcome of the bounded nonlinear solve for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NonlinearResult {
    pub csh: f64,
    pub rs: f64,
    /// Objective value at the returned point.
    pub objective: f64,
    /// Gradient of the objective at the returned point.
    pub jacobian: [f64; 2],
    pub jacobian_norm: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub convergence: Convergence,
    pub rv: f64,
    pub rh: f64,
}

impl NonlinearResult {
    /// Placeholder for a pair the model cannot be solved on (Rv or Rh not
    /// positive). Keeps the slot so results stay aligned with the samples.
    pub fn invalid_input(rv: f64, rh: f64) -> Self {
        Self {
            csh: f64::NAN,
            rs: f64::NAN,
            objective: f64::NAN,
            jacobian: [f64::NAN; 2],
            jacobian_norm: f64::NAN,
            iterations: 0,
            evaluations: 0,
            convergence: Convergence::InvalidInput,
            rv,
            rh,
        }
    }
}

/// Up to two roots of the eliminated quadratic in Csh.
///
/// Roots are kept as complex numbers; an absent root is `NaN + NaN i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticResult {
    pub root1: Complex<f64>,
    pub root2: Complex<f64>,
}

/// Imaginary parts below this (relative to the modulus) count as real.
const REAL_ROOT_TOLERANCE: f64 = 1e-12;

impl QuadraticResult {
    pub fn absent() -> Complex<f64> {
        Complex::new(f64::NAN, f64::NAN)
    }

    /// Real-valued view: complex or absent roots become NaN.
    pub fn real_roots(&self) -> (f64, f64) {
        (real_part(self.root1), real_part(self.root2))
    }
}

fn real_part(root: Complex<f64>) -> f64 {
    if root.re.is_nan() || root.im.is_nan() {
        return f64::NAN;
    }
    if root.im.abs() <= REAL_ROOT_TOLERANCE * root.norm().max(1.0) {
        root.re
    } else {
        f64::NAN
    }
}

/// Resistivities reconstructed from a solution via the forward model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub rv_sim: f64,
    pub rh_sim: f64,
}

/// Absolute relative percent error between simulated and measured values.
/// A zero measurement yields a non-finite entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetric {
    pub rv_err_pct: f64,
    pub rh_err_pct: f64,
}
