//! Per-sample nonlinear inversion and the joined report table.

use crate::config::{InversionConfig, SolverSettings};
use crate::end_member::{estimate_end_member, gamma_ray_index};
use crate::error::Result;
use crate::forward::{error_metric, simulate};
use crate::minimize::{BoundedQuasiNewton, Bounds, QuasiNewtonSettings};
use crate::model::{MixingModel, SampleObjective, Weights};
use crate::parallel::map_slots;
use crate::types::{
    validate_samples, ErrorMetric, NonlinearResult, Sample, ShaleEndMember, SimulationResult,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Csh is a volume fraction.
pub const CSH_BOUNDS: Bounds = Bounds::new(0.0, 1.0);
/// Rs is left free; steps that cross Rs = 0 are rejected by the line search.
pub const RS_BOUNDS: Bounds = Bounds::UNBOUNDED;

/// Solves each sample independently against a fixed end member.
///
/// Every call starts from the same x0 and shares nothing mutable, so the
/// inverter can be used from many threads at once.
#[derive(Debug, Clone)]
pub struct NonlinearInverter {
    model: MixingModel,
    settings: SolverSettings,
    solver: BoundedQuasiNewton,
}

impl NonlinearInverter {
    pub fn new(end_member: ShaleEndMember, settings: SolverSettings) -> Result<Self> {
        settings.validate()?;
        let solver = BoundedQuasiNewton::new(
            vec![CSH_BOUNDS, RS_BOUNDS],
            QuasiNewtonSettings {
                max_iterations: settings.maxiter,
                tolerance: settings.tolerance,
                history: settings.history,
            },
        )?;
        solver.check_start(&settings.x0)?;
        Ok(Self {
            model: MixingModel::new(end_member),
            settings,
            solver,
        })
    }

    pub fn model(&self) -> &MixingModel {
        &self.model
    }

    pub fn objective(&self, rv: f64, rh: f64) -> SampleObjective {
        SampleObjective {
            model: self.model,
            rv,
            rh,
            weights: Weights::for_sample(rv, rh, self.settings.use_weighting),
            lambda_reg: self.settings.lambda_reg,
        }
    }

    /// Inverts one (Rv, Rh) pair. The pair must already be validated.
    pub fn invert_pair(&self, rv: f64, rh: f64) -> NonlinearResult {
        let objective = self.objective(rv, rh);
        let minimum = self.solver.descend(&objective, &self.settings.x0);
        let jacobian = [minimum.gradient[0], minimum.gradient[1]];
        NonlinearResult {
            csh: minimum.x[0],
            rs: minimum.x[1],
            objective: minimum.value,
            jacobian,
            jacobian_norm: jacobian[0].hypot(jacobian[1]),
            iterations: minimum.iterations,
            evaluations: minimum.evaluations,
            convergence: minimum.convergence,
            rv,
            rh,
        }
    }

    /// Validates the whole batch, then solves every sample into its own slot.
    pub fn invert(&self, samples: &[Sample]) -> Result<Vec<NonlinearResult>> {
        validate_samples(samples)?;
        Ok(self.invert_validated(samples))
    }

    pub(crate) fn invert_validated(&self, samples: &[Sample]) -> Vec<NonlinearResult> {
        let results = map_slots(samples, |_, sample| self.invert_pair(sample.rv, sample.rh));
        log_pass(&results);
        results
    }

    /// Solves every sample whose pair is valid and marks the rest with
    /// `Convergence::InvalidInput`. Used for perturbed datasets, where one bad
    /// draw must not cost the other samples their solutions.
    pub fn invert_marking_invalid(&self, samples: &[Sample]) -> Vec<NonlinearResult> {
        let results = map_slots(samples, |_, sample| match sample.invalid_field() {
            Some(_) => NonlinearResult::invalid_input(sample.rv, sample.rh),
            None => self.invert_pair(sample.rv, sample.rh),
        });
        log_pass(&results);
        results
    }
}

fn log_pass(results: &[NonlinearResult]) {
    let unconverged = results
        .iter()
        .filter(|r| !r.convergence.is_converged())
        .count();
    if unconverged > 0 {
        warn!(
            unconverged,
            samples = results.len(),
            "samples stopped before meeting the tolerance"
        );
    }
    debug!(samples = results.len(), "nonlinear inversion pass complete");
}

/// Convenience wrapper over `NonlinearInverter` for a single pass.
pub fn nonlinear_inversion(
    samples: &[Sample],
    end_member: ShaleEndMember,
    settings: &SolverSettings,
) -> Result<Vec<NonlinearResult>> {
    NonlinearInverter::new(end_member, *settings)?.invert(samples)
}

/// One depth row of the joined report: carried curves, GR index, solution,
/// reconstruction and error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportRow {
    pub depth: f64,
    pub at10: f64,
    pub at30: f64,
    pub at60: f64,
    pub at90: f64,
    pub gr: f64,
    pub csh_lin: f64,
    #[serde(flatten)]
    pub result: NonlinearResult,
    #[serde(flatten)]
    pub simulation: SimulationResult,
    #[serde(flatten)]
    pub error: ErrorMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InversionReport {
    pub end_member: ShaleEndMember,
    pub rows: Vec<ReportRow>,
}

impl InversionReport {
    pub fn results(&self) -> Vec<NonlinearResult> {
        self.rows.iter().map(|row| row.result).collect()
    }

    pub fn converged_fraction(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let converged = self
            .rows
            .iter()
            .filter(|row| row.result.convergence.is_converged())
            .count();
        converged as f64 / self.rows.len() as f64
    }
}

/// Full single-run pipeline: end member, inversion, forward simulation and
/// error metrics, joined row by row with the input samples.
pub fn resistivity_inversion(
    samples: &[Sample],
    config: &InversionConfig,
) -> Result<InversionReport> {
    config.solver.validate()?;
    validate_samples(samples)?;
    let end_member = estimate_end_member(samples, config.end_member)?;
    let inverter = NonlinearInverter::new(end_member, config.solver)?;
    let results = inverter.invert_validated(samples);
    let csh_lin = gamma_ray_index(samples);

    let rows: Vec<ReportRow> = samples
        .iter()
        .zip(results)
        .zip(csh_lin)
        .map(|((sample, result), csh_lin)| {
            let simulation = simulate(inverter.model(), &result);
            ReportRow {
                depth: sample.depth,
                at10: sample.at10,
                at30: sample.at30,
                at60: sample.at60,
                at90: sample.at90,
                gr: sample.gr,
                csh_lin,
                result,
                simulation,
                error: error_metric(&result, &simulation),
            }
        })
        .collect();

    let report = InversionReport { end_member, rows };
    info!(
        samples = report.rows.len(),
        rvsh = end_member.rvsh,
        rhsh = end_member.rhsh,
        converged_fraction = report.converged_fraction(),
        "resistivity inversion complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{nonlinear_inversion, resistivity_inversion, NonlinearInverter};
    use crate::config::{InversionConfig, SolverSettings};
    use crate::error::{InversionError, SampleField};
    use crate::minimize::Convergence;
    use crate::types::{Sample, ShaleEndMember};

    fn synthetic_rh() -> f64 {
        1.0 / (0.3 / 20.0 + 0.7 / 5.0)
    }

    #[test]
    fn recovers_synthetic_shale_fraction() {
        let end_member = ShaleEndMember::new(50.0, 20.0).expect("valid");
        let inverter =
            NonlinearInverter::new(end_member, SolverSettings::default()).expect("valid settings");
        let result = inverter.invert_pair(18.5, synthetic_rh());

        assert!((result.csh - 0.3).abs() < 1e-2, "csh = {}", result.csh);
        assert!((result.rs - 5.0).abs() < 0.1, "rs = {}", result.rs);
        assert!(result.iterations > 0);
        assert!(result.evaluations > result.iterations);
        assert!((result.jacobian_norm - result.jacobian[0].hypot(result.jacobian[1])).abs() < 1e-15);
    }

    #[test]
    fn homogeneous_medium_fits_exactly_without_penalty() {
        let end_member = ShaleEndMember::new(10.0, 10.0).expect("valid");
        let settings = SolverSettings {
            lambda_reg: 0.0,
            ..SolverSettings::default()
        };
        let inverter = NonlinearInverter::new(end_member, settings).expect("valid settings");
        let result = inverter.invert_pair(10.0, 10.0);

        assert!(result.objective < 1e-6, "objective = {}", result.objective);
        assert!((0.0..=1.0).contains(&result.csh));
    }

    #[test]
    fn penalty_raises_the_floor_of_the_objective() {
        let end_member = ShaleEndMember::new(10.0, 10.0).expect("valid");
        let inverter =
            NonlinearInverter::new(end_member, SolverSettings::default()).expect("valid settings");
        let result = inverter.invert_pair(10.0, 10.0);
        let floor = 1e-4 * result.csh.hypot(result.rs);

        assert!(result.objective >= floor - 1e-15);
        assert!(result.objective < 1e-2);
    }

    #[test]
    fn unweighted_objective_still_recovers_truth() {
        let end_member = ShaleEndMember::new(50.0, 20.0).expect("valid");
        let settings = SolverSettings {
            use_weighting: false,
            tolerance: 1e-10,
            maxiter: 500,
            ..SolverSettings::default()
        };
        let inverter = NonlinearInverter::new(end_member, settings).expect("valid settings");
        let result = inverter.invert_pair(18.5, synthetic_rh());
        assert!((result.csh - 0.3).abs() < 1e-2, "csh = {}", result.csh);
    }

    #[test]
    fn invalid_sample_fails_the_whole_batch() {
        let end_member = ShaleEndMember::new(50.0, 20.0).expect("valid");
        let samples = vec![
            Sample::new(1.0, 10.0, 18.5, 6.0),
            Sample::new(2.0, 10.0, 18.5, -6.0),
        ];
        let err = nonlinear_inversion(&samples, end_member, &SolverSettings::default())
            .expect_err("negative Rh must fail");
        assert!(matches!(
            err,
            InversionError::InvalidSample {
                index: 1,
                field: SampleField::Rh,
                ..
            }
        ));
    }

    #[test]
    fn invalid_start_is_rejected_before_solving() {
        let end_member = ShaleEndMember::new(50.0, 20.0).expect("valid");
        let settings = SolverSettings {
            x0: [-0.1, 1.5],
            ..SolverSettings::default()
        };
        let err = NonlinearInverter::new(end_member, settings).expect_err("x0 outside bounds");
        assert!(err.to_string().contains("x0"));
    }

    #[test]
    fn report_joins_curves_with_results() {
        let mut samples = vec![
            Sample::new(1000.0, 30.0, 18.5, synthetic_rh()),
            Sample::new(1000.5, 150.0, 50.0, 20.0),
            Sample::new(1001.0, 90.0, 12.0, 5.0),
        ];
        samples[0].at90 = 7.25;
        let report =
            resistivity_inversion(&samples, &InversionConfig::default()).expect("valid run");

        assert_eq!(report.end_member, ShaleEndMember::new(50.0, 20.0).expect("valid"));
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].at90, 7.25);
        assert_eq!(report.rows[0].csh_lin, 0.0);
        assert_eq!(report.rows[1].csh_lin, 1.0);
        for (row, sample) in report.rows.iter().zip(&samples) {
            assert_eq!(row.depth, sample.depth);
            assert_eq!(row.result.rv, sample.rv);
            assert_eq!(row.result.rh, sample.rh);
            assert!((0.0..=1.0).contains(&row.result.csh));
        }
        assert!(report.rows[0].error.rv_err_pct < 1.0);
        assert!(report.rows[0].error.rh_err_pct < 1.0);
        assert_eq!(report.results().len(), 3);
    }

    #[test]
    fn marking_pass_keeps_every_slot() {
        let end_member = ShaleEndMember::new(50.0, 20.0).expect("valid");
        let inverter =
            NonlinearInverter::new(end_member, SolverSettings::default()).expect("valid settings");
        let samples = vec![
            Sample::new(1.0, 10.0, 18.5, synthetic_rh()),
            Sample::new(2.0, 10.0, -3.0, 6.0),
            Sample::new(3.0, 10.0, 18.5, 0.0),
            Sample::new(4.0, 10.0, 18.5, synthetic_rh()),
        ];
        let results = inverter.invert_marking_invalid(&samples);

        assert_eq!(results.len(), 4);
        for i in [1, 2] {
            assert_eq!(results[i].convergence, Convergence::InvalidInput);
            assert!(results[i].csh.is_nan());
        }
        assert_eq!(results[2].rh, 0.0);
        for i in [0, 3] {
            assert_eq!(results[i], inverter.invert_pair(18.5, synthetic_rh()));
            assert!((results[i].csh - 0.3).abs() < 1e-2);
        }
    }

    #[test]
    fn first_step_from_default_start_stays_off_the_shale_face() {
        // Truth (Csh, Rs) = (0.9, 20) against a (3, 1) end member.
        let end_member = ShaleEndMember::new(3.0, 1.0).expect("valid");
        let rv = 0.9 * 3.0 + 0.1 * 20.0;
        let rh = 1.0 / (0.9 / 1.0 + 0.1 / 20.0);

        let one_step = SolverSettings {
            maxiter: 1,
            ..SolverSettings::default()
        };
        let inverter = NonlinearInverter::new(end_member, one_step).expect("valid settings");
        let result = inverter.invert_pair(rv, rh);
        assert_eq!(result.iterations, 1);
        assert!(result.csh > 0.5 && result.csh < 1.0, "csh = {}", result.csh);

        let tight = SolverSettings {
            tolerance: 1e-10,
            maxiter: 500,
            ..SolverSettings::default()
        };
        let inverter = NonlinearInverter::new(end_member, tight).expect("valid settings");
        let result = inverter.invert_pair(rv, rh);
        assert!((result.csh - 0.9).abs() < 1e-2, "csh = {}", result.csh);
        assert!((result.rs - 20.0).abs() < 0.5, "rs = {}", result.rs);
    }
}
