//! Column-oriented sample input.

use ari_core::Sample;
use serde::Deserialize;

/// Equal-length curve arrays as produced by a log reader.
/// The induction curves are optional and default to NaN.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SampleColumns {
    pub depth: Vec<f64>,
    pub at10: Vec<f64>,
    pub at30: Vec<f64>,
    pub at60: Vec<f64>,
    pub at90: Vec<f64>,
    pub gr: Vec<f64>,
    pub rv: Vec<f64>,
    pub rh: Vec<f64>,
}

impl SampleColumns {
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn into_samples(self) -> Result<Vec<Sample>, String> {
        let n = self.len();
        for (name, column) in [("gr", &self.gr), ("rv", &self.rv), ("rh", &self.rh)] {
            if column.len() != n {
                return Err(format!(
                    "Column {name} has {} values, depth has {n}.",
                    column.len()
                ));
            }
        }
        for (name, column) in [
            ("at10", &self.at10),
            ("at30", &self.at30),
            ("at60", &self.at60),
            ("at90", &self.at90),
        ] {
            if !column.is_empty() && column.len() != n {
                return Err(format!(
                    "Column {name} has {} values, depth has {n}.",
                    column.len()
                ));
            }
        }

        Ok((0..n)
            .map(|i| Sample {
                depth: self.depth[i],
                at10: optional(&self.at10, i),
                at30: optional(&self.at30, i),
                at60: optional(&self.at60, i),
                at90: optional(&self.at90, i),
                gr: self.gr[i],
                rv: self.rv[i],
                rh: self.rh[i],
            })
            .collect())
    }
}

fn optional(column: &[f64], i: usize) -> f64 {
    column.get(i).copied().unwrap_or(f64::NAN)
}
