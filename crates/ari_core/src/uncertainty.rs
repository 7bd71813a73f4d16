//! Monte Carlo uncertainty quantification.
//!
//! Each realization perturbs Rv and Rh with one shared standard-normal draw
//! per sample, scaled by noise_lvl percent of each curve's standard deviation
//! on the clean data, then reruns the nonlinear inversion against the
//! unperturbed end member. A perturbed pair that leaves the model's domain is
//! marked in its own slot; every realization keeps one result per sample.

use crate::config::{InversionConfig, SolverSettings, UncertaintySettings};
use crate::end_member::estimate_end_member;
use crate::error::Result;
use crate::inversion::NonlinearInverter;
use crate::minimize::Convergence;
use crate::parallel::map_slots;
use crate::types::{validate_samples, NonlinearResult, Sample, ShaleEndMember};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One noisy copy of the dataset and its per-sample solutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRealization {
    pub index: usize,
    pub seed: u64,
    /// One result per input sample, in sample order.
    pub results: Vec<NonlinearResult>,
}

impl EnsembleRealization {
    /// Samples whose perturbed pair was not positive.
    pub fn invalid_samples(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.convergence == Convergence::InvalidInput)
            .count()
    }
}

/// A fixed-size collection of realizations, slot i holding realization i.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    /// Master seed the per-realization seeds were drawn from.
    pub seed: u64,
    pub noise_lvl: f64,
    pub sample_count: usize,
    pub realizations: Vec<EnsembleRealization>,
}

impl Ensemble {
    pub fn len(&self) -> usize {
        self.realizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.realizations.is_empty()
    }

    pub fn invalid_samples(&self) -> usize {
        self.realizations.iter().map(|r| r.invalid_samples()).sum()
    }

    /// Realizations × samples matrix of one result field,
    /// e.g. `ensemble.curve_matrix(|r| r.csh)`. Slots marked `InvalidInput`
    /// carry NaN solution fields.
    pub fn curve_matrix<F>(&self, field: F) -> DMatrix<f64>
    where
        F: Fn(&NonlinearResult) -> f64,
    {
        DMatrix::from_fn(self.len(), self.sample_count, |i, j| {
            field(&self.realizations[i].results[j])
        })
    }
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Noise amplitudes fixed from the clean dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseModel {
    pub sigma_v: f64,
    pub sigma_h: f64,
    pub noise_lvl: f64,
}

impl NoiseModel {
    pub fn from_samples(samples: &[Sample], noise_lvl: f64) -> Self {
        let rv: Vec<f64> = samples.iter().map(|s| s.rv).collect();
        let rh: Vec<f64> = samples.iter().map(|s| s.rh).collect();
        Self {
            sigma_v: population_std(&rv),
            sigma_h: population_std(&rh),
            noise_lvl,
        }
    }

    /// Applies one shared draw e per sample to both curves.
    pub fn perturb<R: Rng>(&self, samples: &[Sample], rng: &mut R) -> Vec<Sample> {
        let scale = self.noise_lvl / 100.0;
        samples
            .iter()
            .map(|sample| {
                let e: f64 = rng.sample(StandardNormal);
                sample.with_resistivities(
                    sample.rv + e * scale * self.sigma_v,
                    sample.rh + e * scale * self.sigma_h,
                )
            })
            .collect()
    }
}

/// Runs the ensemble against a resolved end member.
pub fn inversion_uq(
    samples: &[Sample],
    end_member: ShaleEndMember,
    solver: &SolverSettings,
    settings: &UncertaintySettings,
) -> Result<Ensemble> {
    settings.validate()?;
    validate_samples(samples)?;
    let inverter = NonlinearInverter::new(end_member, *solver)?;
    let noise = NoiseModel::from_samples(samples, settings.noise_lvl);

    let seed = settings.rng_seed.unwrap_or_else(rand::random);
    let mut master = StdRng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..settings.n_ensemble).map(|_| master.gen()).collect();
    info!(
        seed,
        n_ensemble = settings.n_ensemble,
        noise_lvl = settings.noise_lvl,
        sigma_v = noise.sigma_v,
        sigma_h = noise.sigma_h,
        "starting uncertainty ensemble"
    );

    let realizations = map_slots(&seeds, |index, &realization_seed| {
        let mut rng = StdRng::seed_from_u64(realization_seed);
        let noisy = noise.perturb(samples, &mut rng);
        let realization = EnsembleRealization {
            index,
            seed: realization_seed,
            results: inverter.invert_marking_invalid(&noisy),
        };
        let invalid = realization.invalid_samples();
        if invalid > 0 {
            debug!(
                realization = index,
                invalid, "perturbed samples left the model domain"
            );
        }
        realization
    });

    let ensemble = Ensemble {
        seed,
        noise_lvl: settings.noise_lvl,
        sample_count: samples.len(),
        realizations,
    };
    let invalid = ensemble.invalid_samples();
    if invalid > 0 {
        warn!(
            invalid,
            total = ensemble.len() * ensemble.sample_count,
            "perturbed samples with non-positive Rv or Rh were marked, not solved"
        );
    }
    debug!(realizations = ensemble.len(), "uncertainty ensemble complete");
    Ok(ensemble)
}

/// Resolves the end member from the configuration, then runs the ensemble.
pub fn run_uncertainty(samples: &[Sample], config: &InversionConfig) -> Result<Ensemble> {
    config.validate()?;
    validate_samples(samples)?;
    let end_member = estimate_end_member(samples, config.end_member)?;
    inversion_uq(samples, end_member, &config.solver, &config.uncertainty)
}
