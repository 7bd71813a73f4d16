//! Forward reconstruction of (Rv, Rh) and the relative-error report.

use crate::model::MixingModel;
use crate::types::{ErrorMetric, NonlinearResult, SimulationResult};

pub fn simulate(model: &MixingModel, result: &NonlinearResult) -> SimulationResult {
    SimulationResult {
        rv_sim: model.vertical_resistivity(result.csh, result.rs),
        rh_sim: 1.0 / model.horizontal_conductivity(result.csh, result.rs),
    }
}

/// |(sim − true) / true| × 100. A zero measurement gives ±inf or NaN.
pub fn percent_error(simulated: f64, measured: f64) -> f64 {
    ((simulated - measured) / measured).abs() * 100.0
}

pub fn error_metric(result: &NonlinearResult, simulation: &SimulationResult) -> ErrorMetric {
    ErrorMetric {
        rv_err_pct: percent_error(simulation.rv_sim, result.rv),
        rh_err_pct: percent_error(simulation.rh_sim, result.rh),
    }
}

pub fn simulate_all(model: &MixingModel, results: &[NonlinearResult]) -> Vec<SimulationResult> {
    results.iter().map(|r| simulate(model, r)).collect()
}

pub fn error_metrics(
    results: &[NonlinearResult],
    simulations: &[SimulationResult],
) -> Vec<ErrorMetric> {
    results
        .iter()
        .zip(simulations)
        .map(|(r, s)| error_metric(r, s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{error_metric, error_metrics, percent_error, simulate, simulate_all};
    use crate::minimize::Convergence;
    use crate::model::MixingModel;
    use crate::types::{NonlinearResult, ShaleEndMember};

    fn result(csh: f64, rs: f64, rv: f64, rh: f64) -> NonlinearResult {
        NonlinearResult {
            csh,
            rs,
            objective: 0.0,
            jacobian: [0.0, 0.0],
            jacobian_norm: 0.0,
            iterations: 0,
            evaluations: 0,
            convergence: Convergence::Gradient,
            rv,
            rh,
        }
    }

    #[test]
    fn simulate_reproduces_mixing_law() {
        let model = MixingModel::new(ShaleEndMember::new(50.0, 20.0).expect("valid"));
        let sim = simulate(&model, &result(0.3, 5.0, 18.5, 6.0));
        assert!((sim.rv_sim - 18.5).abs() < 1e-12);
        assert!((sim.rh_sim - 1.0 / 0.155).abs() < 1e-12);
    }

    #[test]
    fn pure_end_members_reconstruct_exactly() {
        let model = MixingModel::new(ShaleEndMember::new(8.0, 2.0).expect("valid"));
        let shale = simulate(&model, &result(1.0, 30.0, 8.0, 2.0));
        assert_eq!(shale.rv_sim, 8.0);
        assert_eq!(shale.rh_sim, 2.0);
        let sand = simulate(&model, &result(0.0, 30.0, 30.0, 30.0));
        assert_eq!(sand.rv_sim, 30.0);
        assert!((sand.rh_sim - 30.0).abs() < 1e-12);
    }

    #[test]
    fn error_metric_is_absolute_percent() {
        assert!((percent_error(11.0, 10.0) - 10.0).abs() < 1e-12);
        assert!((percent_error(9.0, 10.0) - 10.0).abs() < 1e-12);

        let model = MixingModel::new(ShaleEndMember::new(50.0, 20.0).expect("valid"));
        let r = result(0.3, 5.0, 20.0, 1.0 / 0.155);
        let err = error_metric(&r, &simulate(&model, &r));
        assert!((err.rv_err_pct - 7.5).abs() < 1e-9);
        assert!(err.rh_err_pct < 1e-9);
    }

    #[test]
    fn zero_measurement_gives_non_finite_error() {
        assert!(percent_error(1.0, 0.0).is_infinite());
        assert!(percent_error(0.0, 0.0).is_nan());
    }

    #[test]
    fn batch_helpers_keep_sample_order() {
        let model = MixingModel::new(ShaleEndMember::new(50.0, 20.0).expect("valid"));
        let results = vec![
            result(0.3, 5.0, 18.5, 1.0 / 0.155),
            result(1.0, 5.0, 40.0, 20.0),
        ];
        let simulations = simulate_all(&model, &results);
        let errors = error_metrics(&results, &simulations);

        assert_eq!(simulations.len(), 2);
        assert_eq!(simulations[1].rv_sim, 50.0);
        assert!(errors[0].rv_err_pct < 1e-9);
        assert!((errors[1].rv_err_pct - 25.0).abs() < 1e-9);
    }
}
