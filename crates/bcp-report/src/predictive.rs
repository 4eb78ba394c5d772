// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, mean_and_variance, segment_ranges};
use bcp_model::{CoefficientSharing, ModelData};
use bcp_sampler::Trace;

/// Posterior-mean fit of the observed series and its residuals.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PredictiveCheck {
    /// Segment mean plus covariate effect, averaged over draws.
    pub fitted: Vec<f64>,
    /// Observed minus fitted.
    pub residuals: Vec<f64>,
    pub residual_mean: f64,
    pub residual_sd: f64,
    pub n_draws: usize,
}

/// Posterior predictive mean of every observation under `trace`.
///
/// `data` must be the bound data the trace was sampled from.
pub fn posterior_predictive(
    trace: &Trace,
    data: &ModelData,
) -> Result<PredictiveCheck, BcpError> {
    let n = data.n();
    if trace.n_obs() != n || trace.fingerprint() != data.fingerprint() {
        return Err(BcpError::invalid_input(format!(
            "trace '{}' was not sampled from this data (N={} vs {n})",
            trace.spec_name(),
            trace.n_obs()
        )));
    }
    let n_draws = trace.total_draws();
    if n_draws == 0 {
        return Err(BcpError::invalid_input(format!(
            "trace '{}' holds no draws for a predictive check",
            trace.spec_name()
        )));
    }

    let mut fitted = vec![0.0; n];
    for sample in trace.samples() {
        let state = &sample.state;
        let coefficient_sets = match data.sharing() {
            CoefficientSharing::Shared => 1,
            CoefficientSharing::PerSegment => state.segments.len(),
        };
        if state.segments.len() != state.breaks.len() + 1
            || state.coefficients.len() != coefficient_sets * data.n_features()
        {
            return Err(BcpError::invalid_input(format!(
                "trace '{}' does not match the bound covariates",
                trace.spec_name()
            )));
        }
        for (segment, range) in segment_ranges(n, &state.breaks).into_iter().enumerate() {
            let mean = state.segments[segment].mean;
            for t in range {
                fitted[t] += mean + data.effect(t, segment, &state.coefficients);
            }
        }
    }
    let scale = 1.0 / n_draws as f64;
    for value in &mut fitted {
        *value *= scale;
    }

    let residuals: Vec<f64> = data
        .values()
        .iter()
        .zip(&fitted)
        .map(|(y, f)| y - f)
        .collect();
    if let Some((t, r)) = residuals.iter().enumerate().find(|(_, r)| !r.is_finite()) {
        return Err(BcpError::numerical_issue(format!(
            "predictive residual at t={t} is non-finite: {r}"
        )));
    }
    let (residual_mean, variance) = mean_and_variance(&residuals);

    tracing::debug!(
        spec = trace.spec_name(),
        residual_mean,
        residual_sd = variance.sqrt(),
        "posterior predictive check"
    );

    Ok(PredictiveCheck {
        fitted,
        residuals,
        residual_mean,
        residual_sd: variance.sqrt(),
        n_draws,
    })
}
