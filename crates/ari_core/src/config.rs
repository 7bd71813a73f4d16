//! Immutable run configuration.
//!
//! Every component receives the settings it needs by reference; nothing is
//! read from ambient state. Partial documents fill in from `Default`.

use crate::error::{InversionError, Result};
use serde::{Deserialize, Serialize};

/// Solver algorithm identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMethod {
    /// Limited-memory BFGS with box constraints.
    #[default]
    #[serde(rename = "L-BFGS-B")]
    LBfgsB,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub method: SolverMethod,
    /// Coefficient of the L2 penalty on (Csh, Rs).
    pub lambda_reg: f64,
    pub tolerance: f64,
    pub maxiter: usize,
    /// Initial guess (Csh, Rs), shared by every sample.
    pub x0: [f64; 2],
    /// Scale eq1 by 1/Rv and eq2 by Rh.
    pub use_weighting: bool,
    /// Number of curvature pairs kept by the quasi-Newton update.
    pub history: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            method: SolverMethod::LBfgsB,
            lambda_reg: 1e-4,
            tolerance: 1e-3,
            maxiter: 100,
            x0: [0.5, 1.5],
            use_weighting: true,
            history: 10,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.lambda_reg.is_finite() || self.lambda_reg < 0.0 {
            return Err(InversionError::configuration(
                "lambda_reg",
                format!("must be finite and non-negative, got {}", self.lambda_reg),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(InversionError::configuration(
                "tolerance",
                format!("must be finite and positive, got {}", self.tolerance),
            ));
        }
        if self.maxiter == 0 {
            return Err(InversionError::configuration(
                "maxiter",
                "must be greater than zero",
            ));
        }
        if self.history == 0 {
            return Err(InversionError::configuration(
                "history",
                "must keep at least one curvature pair",
            ));
        }
        let [csh, rs] = self.x0;
        if !csh.is_finite() || !rs.is_finite() {
            return Err(InversionError::configuration(
                "x0",
                format!("initial guess must be finite, got ({csh}, {rs})"),
            ));
        }
        if !(0.0..=1.0).contains(&csh) {
            return Err(InversionError::configuration(
                "x0",
                format!("initial Csh {csh} lies outside the bounds [0, 1]"),
            ));
        }
        if rs == 0.0 {
            return Err(InversionError::configuration(
                "x0",
                "initial Rs must be non-zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintySettings {
    /// Number of noisy realizations.
    pub n_ensemble: usize,
    /// Noise amplitude as a percentage of each curve's standard deviation.
    pub noise_lvl: f64,
    /// Seed of the noise generator. Drawn from OS entropy (and recorded in
    /// the ensemble) when absent.
    pub rng_seed: Option<u64>,
}

impl Default for UncertaintySettings {
    fn default() -> Self {
        Self {
            n_ensemble: 100,
            noise_lvl: 10.0,
            rng_seed: None,
        }
    }
}

impl UncertaintySettings {
    pub fn validate(&self) -> Result<()> {
        if self.n_ensemble == 0 {
            return Err(InversionError::configuration(
                "n_ensemble",
                "ensemble must hold at least one realization",
            ));
        }
        if !self.noise_lvl.is_finite() || self.noise_lvl < 0.0 {
            return Err(InversionError::configuration(
                "noise_lvl",
                format!("must be finite and non-negative, got {}", self.noise_lvl),
            ));
        }
        Ok(())
    }
}

/// User-supplied shale resistivities that bypass the max-GR pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndMemberOverrides {
    pub rvsh: Option<f64>,
    pub rhsh: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InversionConfig {
    pub solver: SolverSettings,
    pub uncertainty: UncertaintySettings,
    pub end_member: EndMemberOverrides,
}

impl InversionConfig {
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        self.uncertainty.validate()
    }

    /// Parses and validates a TOML settings document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|err| InversionError::configuration("config", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
