//! The two-equation layered-medium mixing law.
//!
//! eq1 (vertical, series resistivity):  Csh·Rvsh + (1−Csh)·Rs − Rv = 0
//! eq2 (horizontal, parallel conductivity): Csh/Rhsh + (1−Csh)/Rs − 1/Rh = 0

use crate::traits::{Objective, Scalar};
use crate::types::ShaleEndMember;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixingModel {
    pub end_member: ShaleEndMember,
}

impl MixingModel {
    pub fn new(end_member: ShaleEndMember) -> Self {
        Self { end_member }
    }

    /// Bulk vertical resistivity of the laminated mix.
    pub fn vertical_resistivity<T: Scalar>(&self, csh: T, rs: T) -> T {
        csh * T::constant(self.end_member.rvsh) + (T::one() - csh) * rs
    }

    /// Bulk horizontal conductivity of the laminated mix.
    pub fn horizontal_conductivity<T: Scalar>(&self, csh: T, rs: T) -> T {
        csh / T::constant(self.end_member.rhsh) + (T::one() - csh) / rs
    }

    /// Unweighted residuals [eq1, eq2] against a measured pair.
    pub fn residuals<T: Scalar>(&self, csh: T, rs: T, rv: f64, rh: f64) -> [T; 2] {
        [
            self.vertical_resistivity(csh, rs) - T::constant(rv),
            self.horizontal_conductivity(csh, rs) - T::constant(1.0 / rh),
        ]
    }
}

/// Per-equation scale factors applied to the residuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub vertical: f64,
    pub horizontal: f64,
}

impl Weights {
    pub const UNIT: Weights = Weights {
        vertical: 1.0,
        horizontal: 1.0,
    };

    /// 1/Rv and Rh when enabled, making both equations dimensionless.
    pub fn for_sample(rv: f64, rh: f64, enabled: bool) -> Self {
        if enabled {
            Self {
                vertical: 1.0 / rv,
                horizontal: rh,
            }
        } else {
            Self::UNIT
        }
    }
}

/// ‖(w1·eq1, w2·eq2)‖ + λ‖(Csh, Rs)‖ for one sample.
#[derive(Debug, Clone, Copy)]
pub struct SampleObjective {
    pub model: MixingModel,
    pub rv: f64,
    pub rh: f64,
    pub weights: Weights,
    pub lambda_reg: f64,
}

impl SampleObjective {
    pub fn misfit<T: Scalar>(&self, csh: T, rs: T) -> T {
        let [eq1, eq2] = self.model.residuals(csh, rs, self.rv, self.rh);
        euclidean_norm(&[
            eq1 * T::constant(self.weights.vertical),
            eq2 * T::constant(self.weights.horizontal),
        ])
    }

    pub fn penalty<T: Scalar>(&self, csh: T, rs: T) -> T {
        T::constant(self.lambda_reg) * euclidean_norm(&[csh, rs])
    }
}

impl Objective for SampleObjective {
    fn dimension(&self) -> usize {
        2
    }

    fn evaluate<T: Scalar>(&self, x: &[T]) -> T {
        self.misfit(x[0], x[1]) + self.penalty(x[0], x[1])
    }
}

/// Euclidean norm whose derivative at the zero vector is taken as zero.
pub fn euclidean_norm<T: Scalar>(values: &[T]) -> T {
    let sum_sq = values.iter().fold(T::zero(), |acc, &v| acc + v * v);
    if sum_sq.value() == 0.0 {
        T::zero()
    } else {
        sum_sq.sqrt()
    }
}
