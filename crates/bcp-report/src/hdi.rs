// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, mean_and_variance, sorted_quantile};

/// Closed credible interval `[lower, upper]` holding `prob` posterior mass.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub prob: f64,
}

impl Interval {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// True when zero lies outside the interval.
    pub fn excludes_zero(&self) -> bool {
        !self.contains(0.0)
    }
}

pub(crate) fn validate_prob(prob: f64) -> Result<(), BcpError> {
    if !prob.is_finite() || prob <= 0.0 || prob > 1.0 {
        return Err(BcpError::invalid_input(format!(
            "credible mass must be in (0, 1]; got {prob}"
        )));
    }
    Ok(())
}

fn sorted_finite(samples: &[f64]) -> Result<Vec<f64>, BcpError> {
    if samples.is_empty() {
        return Err(BcpError::invalid_input("HDI requires at least one sample"));
    }
    if let Some((idx, value)) = samples.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(BcpError::numerical_issue(format!(
            "sample {idx} is non-finite: {value}"
        )));
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Narrowest interval covering `ceil(prob * n)` of the samples.
///
/// Ties between equally narrow windows resolve to the leftmost one.
pub fn hdi(samples: &[f64], prob: f64) -> Result<Interval, BcpError> {
    validate_prob(prob)?;
    let sorted = sorted_finite(samples)?;
    Ok(hdi_sorted(&sorted, prob))
}

pub(crate) fn hdi_sorted(sorted: &[f64], prob: f64) -> Interval {
    let n = sorted.len();
    let covered = ((prob * n as f64).ceil() as usize).clamp(1, n);
    let mut best = (sorted[0], sorted[covered - 1]);
    for start in 1..=n - covered {
        let candidate = (sorted[start], sorted[start + covered - 1]);
        if candidate.1 - candidate.0 < best.1 - best.0 {
            best = candidate;
        }
    }
    Interval {
        lower: best.0,
        upper: best.1,
        prob,
    }
}

/// Posterior mean, median, standard deviation and HDI of one scalar.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PosteriorStat {
    pub mean: f64,
    pub median: f64,
    pub sd: f64,
    pub hdi: Interval,
}

impl PosteriorStat {
    pub fn from_draws(draws: &[f64], prob: f64) -> Result<Self, BcpError> {
        validate_prob(prob)?;
        let sorted = sorted_finite(draws)?;
        let (mean, variance) = mean_and_variance(&sorted);
        Ok(Self {
            mean,
            median: sorted_quantile(&sorted, 0.5).unwrap_or(mean),
            sd: variance.sqrt(),
            hdi: hdi_sorted(&sorted, prob),
        })
    }
}
