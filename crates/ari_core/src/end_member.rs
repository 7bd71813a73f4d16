//! Shale end-member resolution and the gamma-ray shale index.

use crate::config::EndMemberOverrides;
use crate::error::{InversionError, Result};
use crate::types::{Sample, ShaleEndMember};
use tracing::debug;

/// Index of the first sample with the largest finite GR value.
pub fn max_gamma_ray_index(samples: &[Sample]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, sample) in samples.iter().enumerate() {
        if !sample.gr.is_finite() {
            continue;
        }
        match best {
            Some((_, gr)) if sample.gr <= gr => {}
            _ => best = Some((index, sample.gr)),
        }
    }
    best.map(|(index, _)| index)
}

/// Resolves (Rvsh, Rhsh): overrides win, otherwise Rv and Rh are read at the
/// most shale-like (maximum GR) sample.
pub fn estimate_end_member(
    samples: &[Sample],
    overrides: EndMemberOverrides,
) -> Result<ShaleEndMember> {
    let picked = if overrides.rvsh.is_some() && overrides.rhsh.is_some() {
        None
    } else {
        let index = max_gamma_ray_index(samples).ok_or_else(|| {
            InversionError::configuration(
                "GR",
                "no finite gamma-ray value to pick the shale end member from",
            )
        })?;
        let sample = &samples[index];
        debug!(
            index,
            depth = sample.depth,
            gr = sample.gr,
            "picked shale end member at maximum GR"
        );
        Some(sample)
    };

    let rvsh = overrides
        .rvsh
        .or(picked.map(|s| s.rv))
        .unwrap_or(f64::NAN);
    let rhsh = overrides
        .rhsh
        .or(picked.map(|s| s.rh))
        .unwrap_or(f64::NAN);

    let end_member = ShaleEndMember::new(rvsh, rhsh)?;
    debug!(
        rvsh = end_member.rvsh,
        rhsh = end_member.rhsh,
        "resolved shale end member"
    );
    Ok(end_member)
}

/// Linear gamma-ray shale index (GR − GRmin) / (GRmax − GRmin).
///
/// NaN everywhere when the GR curve is flat or has no finite values.
pub fn gamma_ray_index(samples: &[Sample]) -> Vec<f64> {
    let (min, max) = samples
        .iter()
        .map(|s| s.gr)
        .filter(|gr| gr.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), gr| {
            (lo.min(gr), hi.max(gr))
        });
    let span = max - min;
    samples
        .iter()
        .map(|s| {
            if span > 0.0 {
                (s.gr - min) / span
            } else {
                f64::NAN
            }
        })
        .collect()
}
