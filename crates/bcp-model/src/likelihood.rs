// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Normal likelihood with a segment-specific mean and scale.
//!
//! `y[t] ~ Normal(mu[s] + x[t] . beta[s], sigma[s])` with `s = segment_of(t, breaks)`.
//! Evaluation walks the segment ranges once instead of dispatching per
//! observation.

use crate::data::ModelData;
use crate::priors::CoefficientSharing;
use crate::spec::ChangePointSpec;
use crate::state::ModelState;
use bcp_core::{BcpError, normal_log_pdf, segment_ranges};
use std::ops::Range;

/// Log-density of observation `t` when it belongs to `segment`.
pub fn point_log_likelihood(data: &ModelData, state: &ModelState, t: usize, segment: usize) -> f64 {
    let params = state.segments[segment];
    let residual = data.value(t) - data.effect(t, segment, &state.coefficients);
    normal_log_pdf(residual, params.mean, params.sigma)
}

/// Sum of log-densities of `range` under `segment`'s parameters.
pub fn segment_log_likelihood(
    data: &ModelData,
    state: &ModelState,
    segment: usize,
    range: Range<usize>,
) -> f64 {
    range
        .map(|t| point_log_likelihood(data, state, t, segment))
        .sum()
}

/// Total log-likelihood; fails on a non-finite segment contribution.
pub fn log_likelihood(data: &ModelData, state: &ModelState) -> Result<f64, BcpError> {
    let mut total = 0.0;
    for (segment, range) in segment_ranges(data.n(), &state.breaks)
        .into_iter()
        .enumerate()
    {
        let (start, end) = (range.start, range.end);
        let value = segment_log_likelihood(data, state, segment, range);
        if !value.is_finite() {
            return Err(BcpError::numerical_issue(format!(
                "log-likelihood of segment {segment} over [{start}, {end}) is non-finite: {value}"
            )));
        }
        total += value;
    }
    Ok(total)
}

/// Per-observation log-likelihood written into `out`.
pub fn pointwise_log_likelihood(
    data: &ModelData,
    state: &ModelState,
    out: &mut [f64],
) -> Result<(), BcpError> {
    if out.len() != data.n() {
        return Err(BcpError::invalid_input(format!(
            "pointwise buffer has length {}, expected {}",
            out.len(),
            data.n()
        )));
    }
    for (segment, range) in segment_ranges(data.n(), &state.breaks)
        .into_iter()
        .enumerate()
    {
        for t in range {
            let value = point_log_likelihood(data, state, t, segment);
            if !value.is_finite() {
                return Err(BcpError::numerical_issue(format!(
                    "log-likelihood of observation {t} in segment {segment} is non-finite: {value}"
                )));
            }
            out[t] = value;
        }
    }
    Ok(())
}

/// Log prior density of the continuous parameters.
///
/// The break prior is uniform over admissible tuples and contributes a
/// constant, so it is omitted.
pub fn log_prior(spec: &ChangePointSpec, state: &ModelState) -> f64 {
    let mut total = 0.0;
    for (segment, params) in state.segments.iter().enumerate() {
        let prior = spec.segment_prior(segment);
        total += prior.mean.log_density(params.mean);
        total += prior.scale.log_density_sigma(params.sigma);
    }
    let coefficient_sets = match spec.sharing() {
        CoefficientSharing::Shared => 1,
        CoefficientSharing::PerSegment => spec.n_segments(),
    };
    for segment in 0..coefficient_sets {
        for (feature, covariate) in spec.covariates().iter().enumerate() {
            let idx = spec.coefficient_index(segment, feature);
            total += covariate.prior.log_density(state.coefficients[idx]);
        }
    }
    total
}
