pub mod autodiff;
pub mod config;
pub mod end_member;
pub mod error;
pub mod forward;
pub mod inversion;
pub mod minimize;
pub mod model;
mod parallel;
pub mod quadratic;
/// The `ari_core` crate estimates shale volume fraction (Csh) and sand
/// resistivity (Rs) at every depth sample from measured vertical and
/// horizontal resistivities, using a two-equation laminated mixing law.
///
/// Key components:
/// - **Traits**: `Scalar` (f64 or dual numbers) and `Objective`.
/// - **Minimize**: bounded limited-memory BFGS with exact dual-number gradients.
/// - **Inversion**: per-sample nonlinear solve and the joined report table.
/// - **Quadratic**: closed-form roots after eliminating Rs.
/// - **Uncertainty**: seeded Monte Carlo ensembles of the nonlinear solve.
pub mod traits;
pub mod types;
pub mod uncertainty;

pub use config::{
    EndMemberOverrides, InversionConfig, SolverMethod, SolverSettings, UncertaintySettings,
};
pub use error::{InversionError, Result, SampleField};
pub use inversion::{
    nonlinear_inversion, resistivity_inversion, InversionReport, NonlinearInverter,
};
pub use quadratic::quadratic_inversion;
pub use types::{
    ErrorMetric, NonlinearResult, QuadraticResult, Sample, ShaleEndMember, SimulationResult,
};
pub use uncertainty::{inversion_uq, run_uncertainty, Ensemble, EnsembleRealization};
