//! Limited-memory BFGS with box constraints.
//!
//! Variables sitting on a bound whose gradient points outward are frozen for
//! the iteration (active set from the projected gradient); the step is found
//! by a projected backtracking line search. Gradients come from dual numbers.

use crate::autodiff::gradient;
use crate::error::{InversionError, Result};
use crate::traits::Objective;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const ARMIJO: f64 = 1e-4;
const MAX_LINE_SEARCH_TRIALS: usize = 40;
const CURVATURE_EPS: f64 = 1e-10;

/// Closed interval a variable is confined to. Either end may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const UNBOUNDED: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn project(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Why the minimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Convergence {
    /// Projected gradient below tolerance.
    Gradient,
    /// Relative objective reduction below tolerance.
    Objective,
    /// Iteration cap reached first.
    IterationLimit,
    /// No acceptable step along a descent direction.
    LineSearchFailed,
    /// The measured pair lies outside the model's domain; nothing was solved.
    InvalidInput,
}

impl Convergence {
    pub fn is_converged(self) -> bool {
        matches!(self, Convergence::Gradient | Convergence::Objective)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuasiNewtonSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub history: usize,
}

impl Default for QuasiNewtonSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-3,
            history: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub gradient: Vec<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    pub convergence: Convergence,
}

/// A reusable bounded minimizer. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct BoundedQuasiNewton {
    bounds: Vec<Bounds>,
    settings: QuasiNewtonSettings,
}

impl BoundedQuasiNewton {
    pub fn new(bounds: Vec<Bounds>, settings: QuasiNewtonSettings) -> Result<Self> {
        if bounds.is_empty() {
            return Err(InversionError::configuration(
                "bounds",
                "problem has zero dimension",
            ));
        }
        if bounds.iter().any(|b| b.lower.is_nan() || b.upper.is_nan() || b.lower > b.upper) {
            return Err(InversionError::configuration(
                "bounds",
                "each bound must satisfy lower <= upper",
            ));
        }
        if settings.max_iterations == 0 {
            return Err(InversionError::configuration(
                "maxiter",
                "must be greater than zero",
            ));
        }
        if !settings.tolerance.is_finite() || settings.tolerance <= 0.0 {
            return Err(InversionError::configuration(
                "tolerance",
                "must be finite and positive",
            ));
        }
        if settings.history == 0 {
            return Err(InversionError::configuration(
                "history",
                "must keep at least one curvature pair",
            ));
        }
        Ok(Self { bounds, settings })
    }

    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    /// Checks that x0 is finite, of the right size and inside the bounds.
    pub fn check_start(&self, x0: &[f64]) -> Result<()> {
        if x0.len() != self.dimension() {
            return Err(InversionError::configuration(
                "x0",
                format!(
                    "initial guess dimension mismatch. Expected {}, got {}",
                    self.dimension(),
                    x0.len()
                ),
            ));
        }
        for (i, (&value, bound)) in x0.iter().zip(&self.bounds).enumerate() {
            if !value.is_finite() || !bound.contains(value) {
                return Err(InversionError::configuration(
                    "x0",
                    format!(
                        "component {i} = {value} lies outside [{}, {}]",
                        bound.lower, bound.upper
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn minimize<O: Objective>(&self, objective: &O, x0: &[f64]) -> Result<Minimum> {
        if objective.dimension() != self.dimension() {
            return Err(InversionError::configuration(
                "bounds",
                format!(
                    "objective has dimension {}, bounds cover {}",
                    objective.dimension(),
                    self.dimension()
                ),
            ));
        }
        self.check_start(x0)?;
        Ok(self.descend(objective, x0))
    }

    /// Runs the iteration from a start point already accepted by `check_start`.
    pub(crate) fn descend<O: Objective>(&self, objective: &O, x0: &[f64]) -> Minimum {
        let dim = self.dimension();
        let mut x = DVector::from_column_slice(x0);
        let mut grad = DVector::<f64>::zeros(dim);
        let mut value = gradient(objective, x.as_slice(), grad.as_mut_slice());
        let mut evaluations = 1usize;
        let mut iterations = 0usize;
        let mut history = CurvatureHistory::new(self.settings.history);

        let convergence = loop {
            if !value.is_finite() {
                break Convergence::LineSearchFailed;
            }

            let projected = self.projected_gradient(&x, &grad);
            if projected.amax() <= self.settings.tolerance {
                break Convergence::Gradient;
            }
            if iterations >= self.settings.max_iterations {
                break Convergence::IterationLimit;
            }

            let mut direction = history.direction(&projected);
            for i in 0..dim {
                if projected[i] == 0.0 {
                    direction[i] = 0.0;
                }
            }
            if direction.dot(&grad) >= 0.0 {
                history.clear();
                direction = -&projected;
            }

            let initial_step = if history.is_empty() {
                self.interior_step(&x, &direction)
            } else {
                1.0
            };
            let (accepted, trials) =
                self.line_search(objective, &x, value, &grad, &direction, initial_step);
            evaluations += trials;
            let Some((next_x, next_value)) = accepted else {
                if history.is_empty() {
                    break Convergence::LineSearchFailed;
                }
                history.clear();
                continue;
            };

            let mut next_grad = DVector::<f64>::zeros(dim);
            gradient(objective, next_x.as_slice(), next_grad.as_mut_slice());
            evaluations += 1;
            iterations += 1;

            history.push(&next_x - &x, &next_grad - &grad);

            let reduction = value - next_value;
            let scale = value.abs().max(next_value.abs()).max(1.0);
            x = next_x;
            grad = next_grad;
            value = next_value;

            if reduction <= self.settings.tolerance * scale {
                break Convergence::Objective;
            }
        };

        Minimum {
            x: x.iter().copied().collect(),
            value,
            gradient: grad.iter().copied().collect(),
            iterations,
            evaluations,
            convergence,
        }
    }

    fn project(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            x.len(),
            x.iter().zip(&self.bounds).map(|(&v, b)| b.project(v)),
        )
    }

    /// Gradient with components zeroed where a bound blocks descent.
    fn projected_gradient(&self, x: &DVector<f64>, grad: &DVector<f64>) -> DVector<f64> {
        let mut projected = grad.clone();
        for (i, bound) in self.bounds.iter().enumerate() {
            let at_lower = x[i] <= bound.lower && grad[i] > 0.0;
            let at_upper = x[i] >= bound.upper && grad[i] < 0.0;
            if at_lower || at_upper {
                projected[i] = 0.0;
            }
        }
        projected
    }

    /// First trial step without curvature information: half the distance to
    /// the nearest bound along `direction`, at most one.
    fn interior_step(&self, x: &DVector<f64>, direction: &DVector<f64>) -> f64 {
        let mut limit = f64::INFINITY;
        for (i, bound) in self.bounds.iter().enumerate() {
            let d = direction[i];
            let room = if d > 0.0 {
                (bound.upper - x[i]) / d
            } else if d < 0.0 {
                (bound.lower - x[i]) / d
            } else {
                continue;
            };
            limit = limit.min(room);
        }
        if limit.is_finite() && limit > 0.0 {
            (0.5 * limit).min(1.0)
        } else {
            1.0
        }
    }

    /// Backtracking along the projected path x(t) = P(x + t d), halving t.
    /// Non-finite trial values are rejected outright.
    fn line_search<O: Objective>(
        &self,
        objective: &O,
        x: &DVector<f64>,
        value: f64,
        grad: &DVector<f64>,
        direction: &DVector<f64>,
        initial_step: f64,
    ) -> (Option<(DVector<f64>, f64)>, usize) {
        let mut step = initial_step;
        for trial in 1..=MAX_LINE_SEARCH_TRIALS {
            let candidate = self.project(&(x + direction * step));
            let candidate_value = objective.evaluate(candidate.as_slice());
            let predicted = grad.dot(&(&candidate - x));
            if candidate_value.is_finite() && candidate_value <= value + ARMIJO * predicted {
                return (Some((candidate, candidate_value)), trial);
            }
            step *= 0.5;
        }
        (None, MAX_LINE_SEARCH_TRIALS)
    }
}

/// Most recent (s, y) pairs for the two-loop recursion.
struct CurvatureHistory {
    capacity: usize,
    pairs: VecDeque<(DVector<f64>, DVector<f64>, f64)>,
}

impl CurvatureHistory {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pairs: VecDeque::with_capacity(capacity),
        }
    }

    fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Stores the pair when it satisfies the curvature condition.
    fn push(&mut self, s: DVector<f64>, y: DVector<f64>) {
        let sy = s.dot(&y);
        if sy <= CURVATURE_EPS * y.norm_squared() {
            return;
        }
        if self.pairs.len() == self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y, 1.0 / sy));
    }

    /// Returns -H g for the implicit inverse-Hessian approximation H.
    fn direction(&self, grad: &DVector<f64>) -> DVector<f64> {
        let mut q = grad.clone();
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for (s, y, rho) in self.pairs.iter().rev() {
            let alpha = rho * s.dot(&q);
            q -= y * alpha;
            alphas.push(alpha);
        }

        let gamma = match self.pairs.back() {
            Some((s, y, _)) => s.dot(y) / y.norm_squared(),
            None => 1.0 / grad.norm().max(1.0),
        };
        let mut r = q * gamma;

        for ((s, y, rho), alpha) in self.pairs.iter().zip(alphas.iter().rev()) {
            let beta = rho * y.dot(&r);
            r += s * (alpha - beta);
        }
        -r
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundedQuasiNewton, Bounds, Convergence, QuasiNewtonSettings};
    use crate::traits::{Objective, Scalar};

    struct Quadratic {
        center: [f64; 2],
    }

    impl Objective for Quadratic {
        fn dimension(&self) -> usize {
            2
        }

        fn evaluate<T: Scalar>(&self, x: &[T]) -> T {
            let dx = x[0] - T::constant(self.center[0]);
            let dy = x[1] - T::constant(self.center[1]);
            dx * dx + T::constant(10.0) * dy * dy
        }
    }

    struct Rosenbrock;

    impl Objective for Rosenbrock {
        fn dimension(&self) -> usize {
            2
        }

        fn evaluate<T: Scalar>(&self, x: &[T]) -> T {
            let a = T::one() - x[0];
            let b = x[1] - x[0] * x[0];
            a * a + T::constant(100.0) * b * b
        }
    }

    fn tight() -> QuasiNewtonSettings {
        QuasiNewtonSettings {
            max_iterations: 500,
            tolerance: 1e-10,
            history: 10,
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: crate::error::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn unconstrained_quadratic_reaches_center() {
        let solver = BoundedQuasiNewton::new(vec![Bounds::UNBOUNDED; 2], tight())
            .expect("settings are valid");
        let minimum = solver
            .minimize(&Quadratic { center: [3.0, -2.0] }, &[0.0, 0.0])
            .expect("start is valid");

        assert!(minimum.convergence.is_converged());
        assert!((minimum.x[0] - 3.0).abs() < 1e-4);
        assert!((minimum.x[1] + 2.0).abs() < 1e-4);
        assert!(minimum.value < 1e-8);
    }

    #[test]
    fn active_bound_clamps_solution() {
        let bounds = vec![Bounds::new(0.0, 1.0), Bounds::UNBOUNDED];
        let solver = BoundedQuasiNewton::new(bounds, tight()).expect("settings are valid");
        let minimum = solver
            .minimize(&Quadratic { center: [3.0, 0.5] }, &[0.5, 0.0])
            .expect("start is valid");

        assert_eq!(minimum.x[0], 1.0);
        assert!((minimum.x[1] - 0.5).abs() < 1e-4);
        assert!((minimum.value - 4.0).abs() < 1e-6);
        // Outward gradient on the active bound is allowed.
        assert!(minimum.gradient[0] < 0.0);
    }

    #[test]
    fn first_step_stops_short_of_the_bound() {
        let bounds = vec![Bounds::new(0.0, 1.0), Bounds::UNBOUNDED];
        let settings = QuasiNewtonSettings {
            max_iterations: 1,
            ..tight()
        };
        let solver = BoundedQuasiNewton::new(bounds, settings).expect("settings are valid");
        let minimum = solver
            .minimize(&Quadratic { center: [3.0, 0.5] }, &[0.5, 0.0])
            .expect("start is valid");

        // Unit steepest descent would cross x = 1; half the room is 0.559.
        assert_eq!(minimum.iterations, 1);
        assert!(minimum.x[0] > 0.5 && minimum.x[0] < 1.0, "x = {:?}", minimum.x);
        assert!(minimum.value < 8.75);
    }

    #[test]
    fn rosenbrock_converges_from_classic_start() {
        let solver = BoundedQuasiNewton::new(vec![Bounds::UNBOUNDED; 2], tight())
            .expect("settings are valid");
        let minimum = solver
            .minimize(&Rosenbrock, &[-1.2, 1.0])
            .expect("start is valid");

        assert!((minimum.x[0] - 1.0).abs() < 1e-3);
        assert!((minimum.x[1] - 1.0).abs() < 1e-3);
        assert!(minimum.evaluations > minimum.iterations);
    }

    #[test]
    fn iteration_cap_is_reported_not_raised() {
        let settings = QuasiNewtonSettings {
            max_iterations: 1,
            tolerance: 1e-14,
            history: 10,
        };
        let solver = BoundedQuasiNewton::new(vec![Bounds::UNBOUNDED; 2], settings)
            .expect("settings are valid");
        let minimum = solver
            .minimize(&Rosenbrock, &[-1.2, 1.0])
            .expect("start is valid");

        assert_eq!(minimum.iterations, 1);
        assert_eq!(minimum.convergence, Convergence::IterationLimit);
        assert!(!minimum.convergence.is_converged());
        assert!(!Convergence::InvalidInput.is_converged());
    }

    #[test]
    fn rejects_invalid_problems() {
        assert_err_contains(
            BoundedQuasiNewton::new(vec![], tight()),
            "zero dimension",
        );
        assert_err_contains(
            BoundedQuasiNewton::new(vec![Bounds::new(1.0, 0.0)], tight()),
            "lower <= upper",
        );
        let solver = BoundedQuasiNewton::new(vec![Bounds::new(0.0, 1.0), Bounds::UNBOUNDED], tight())
            .expect("settings are valid");
        assert_err_contains(
            solver.minimize(&Quadratic { center: [0.0, 0.0] }, &[2.0, 0.0]),
            "outside",
        );
        assert_err_contains(
            solver.minimize(&Quadratic { center: [0.0, 0.0] }, &[0.5]),
            "dimension mismatch",
        );
    }
}
