// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Conditional update kernels for one sweep of the sampler.
//!
//! Every kernel leaves the state inside the admissible region and reports
//! numerical breakdown as a [`SamplingFailure`] instead of writing a
//! non-finite value.

use bcp_core::{FailureCheck, SamplingFailure, log_sum_exp, segment_ranges};
use bcp_model::{
    ChangePointSpec, CoefficientSharing, ModelData, ModelState, ScalePrior, SegmentParams,
    point_log_likelihood,
};
use rand::Rng;
use rand::distributions::Open01;
use rand_distr::{Distribution, Gamma, StandardNormal};
use std::ops::Range;

pub type KernelResult<T> = Result<T, SamplingFailure>;

/// Admissible locations for break `k` given its neighbours, and the
/// observation region whose segment membership depends on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakWindow {
    pub lower: usize,
    pub upper: usize,
    pub region: (usize, usize),
}

pub fn break_window(spec: &ChangePointSpec, breaks: &[usize], k: usize) -> BreakWindow {
    let (global_lower, global_upper) = spec.break_bounds();
    let m = spec.min_segment_len();
    let n = spec.n_obs();

    let (lower, region_start) = if k == 0 {
        (global_lower, 0)
    } else {
        (global_lower.max(breaks[k - 1] + m), breaks[k - 1])
    };
    let (upper, region_end) = if k + 1 == breaks.len() {
        (global_upper, n)
    } else {
        (global_upper.min(breaks[k + 1] - m), breaks[k + 1])
    };

    BreakWindow {
        lower,
        upper,
        region: (region_start, region_end),
    }
}

fn checked_point(
    data: &ModelData,
    state: &ModelState,
    t: usize,
    segment: usize,
) -> KernelResult<f64> {
    let value = point_log_likelihood(data, state, t, segment);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SamplingFailure::new(
            FailureCheck::NonFiniteLikelihood,
            format!("log-likelihood of observation {t} under segment {segment} is {value}"),
        ))
    }
}

/// Reusable buffers for break enumeration.
#[derive(Clone, Debug, Default)]
pub struct EnumerationScratch {
    left: Vec<f64>,
    right: Vec<f64>,
    scores: Vec<f64>,
}

/// Normalized log full conditional of break `k` over its window.
///
/// Entry `i` is the log-probability of location `window.lower + i`.
pub fn break_log_conditional(
    data: &ModelData,
    spec: &ChangePointSpec,
    state: &ModelState,
    k: usize,
    scratch: &mut EnumerationScratch,
) -> KernelResult<BreakWindow> {
    let window = break_window(spec, &state.breaks, k);
    let (start, end) = window.region;

    scratch.left.clear();
    scratch.right.clear();
    scratch.left.push(0.0);
    scratch.right.push(0.0);
    let (mut left, mut right) = (0.0, 0.0);
    for t in start..end {
        left += checked_point(data, state, t, k)?;
        right += checked_point(data, state, t, k + 1)?;
        scratch.left.push(left);
        scratch.right.push(right);
    }

    let right_total = right;
    scratch.scores.clear();
    for c in window.lower..=window.upper {
        let i = c - start;
        scratch
            .scores
            .push(scratch.left[i] + right_total - scratch.right[i]);
    }

    let normalizer = log_sum_exp(&scratch.scores);
    if !normalizer.is_finite() {
        return Err(SamplingFailure::new(
            FailureCheck::DegenerateConditional,
            format!(
                "conditional of break[{k}] over [{}, {}] has normalizer {normalizer}",
                window.lower, window.upper
            ),
        ));
    }
    for score in &mut scratch.scores {
        *score -= normalizer;
    }
    Ok(window)
}

impl EnumerationScratch {
    pub fn log_probs(&self) -> &[f64] {
        &self.scores
    }
}

/// Gibbs update of break `k` by inverse-CDF sampling of its full conditional.
pub fn enumerate_break<R: Rng>(
    data: &ModelData,
    spec: &ChangePointSpec,
    state: &mut ModelState,
    k: usize,
    scratch: &mut EnumerationScratch,
    rng: &mut R,
) -> KernelResult<()> {
    let window = break_log_conditional(data, spec, state, k, scratch)?;
    let u: f64 = rng.sample(Open01);

    let mut cumulative = 0.0;
    let mut chosen = window.upper;
    for (offset, log_prob) in scratch.scores.iter().enumerate() {
        cumulative += log_prob.exp();
        if u <= cumulative {
            chosen = window.lower + offset;
            break;
        }
    }
    state.breaks[k] = chosen;
    Ok(())
}

/// Result of one Metropolis proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    Rejected,
    /// The proposal broke the ordering or bounds and had zero prior mass.
    OrderViolation,
}

impl MoveOutcome {
    pub fn accepted(self) -> bool {
        self == Self::Accepted
    }
}

/// Random-walk Metropolis update of break `k` with integer steps in `[-step, step]`.
pub fn random_walk_break<R: Rng>(
    data: &ModelData,
    spec: &ChangePointSpec,
    state: &mut ModelState,
    k: usize,
    step: usize,
    rng: &mut R,
) -> KernelResult<MoveOutcome> {
    let window = break_window(spec, &state.breaks, k);
    let current = state.breaks[k];
    let magnitude = rng.gen_range(1..=step.max(1));

    let proposed = if rng.gen_bool(0.5) {
        current.checked_add(magnitude)
    } else {
        current.checked_sub(magnitude)
    };
    let Some(proposed) = proposed.filter(|&b| b >= window.lower && b <= window.upper) else {
        return Ok(MoveOutcome::OrderViolation);
    };

    // Observations in [min, max) switch between segments k and k+1.
    let mut delta = 0.0;
    if proposed > current {
        for t in current..proposed {
            delta += checked_point(data, state, t, k)? - checked_point(data, state, t, k + 1)?;
        }
    } else {
        for t in proposed..current {
            delta += checked_point(data, state, t, k + 1)? - checked_point(data, state, t, k)?;
        }
    }

    let u: f64 = rng.sample(Open01);
    if u.ln() < delta {
        state.breaks[k] = proposed;
        Ok(MoveOutcome::Accepted)
    } else {
        Ok(MoveOutcome::Rejected)
    }
}

fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    rng.sample(StandardNormal)
}

fn residual(data: &ModelData, state: &ModelState, t: usize, segment: usize) -> f64 {
    data.value(t) - data.effect(t, segment, &state.coefficients)
}

fn checked_parameter(name: String, value: f64) -> KernelResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SamplingFailure::new(
            FailureCheck::NonFiniteParameter,
            format!("{name} drew non-finite value {value}"),
        ))
    }
}

/// Conjugate Normal draw of every segment mean given breaks, scales and coefficients.
pub fn update_means<R: Rng>(
    data: &ModelData,
    spec: &ChangePointSpec,
    state: &mut ModelState,
    rng: &mut R,
) -> KernelResult<()> {
    for (j, range) in segment_ranges(data.n(), &state.breaks)
        .into_iter()
        .enumerate()
    {
        let count = range.len() as f64;
        let sum: f64 = range.map(|t| residual(data, state, t, j)).sum();
        let prior = spec.segment_prior(j).mean;
        let variance = state.segments[j].sigma * state.segments[j].sigma;

        let precision = prior.precision() + count / variance;
        let mean = (prior.mean * prior.precision() + sum / variance) / precision;
        let draw = mean + standard_normal(rng) / precision.sqrt();
        state.segments[j].mean = checked_parameter(format!("mu[{j}]"), draw)?;
    }
    Ok(())
}

fn segment_sum_squares(
    data: &ModelData,
    state: &ModelState,
    j: usize,
    range: Range<usize>,
) -> f64 {
    let mean = state.segments[j].mean;
    range
        .map(|t| {
            let centered = residual(data, state, t, j) - mean;
            centered * centered
        })
        .sum()
}

/// Conjugate inverse-gamma draw of segment `j`'s variance.
pub fn gibbs_scale<R: Rng>(
    data: &ModelData,
    state: &mut ModelState,
    j: usize,
    range: Range<usize>,
    shape: f64,
    rate: f64,
    rng: &mut R,
) -> KernelResult<()> {
    let count = range.len() as f64;
    let sum_squares = segment_sum_squares(data, state, j, range);
    let post_shape = shape + 0.5 * count;
    let post_rate = rate + 0.5 * sum_squares;

    let gamma = Gamma::new(post_shape, 1.0 / post_rate).map_err(|err| {
        SamplingFailure::new(
            FailureCheck::DegenerateConditional,
            format!("sigma[{j}] conditional Gamma({post_shape}, 1/{post_rate}) is invalid: {err}"),
        )
    })?;
    let precision: f64 = gamma.sample(rng);
    let sigma = checked_parameter(format!("sigma[{j}]"), precision.sqrt().recip())?;
    if sigma <= 0.0 {
        return Err(SamplingFailure::new(
            FailureCheck::NonFiniteParameter,
            format!("sigma[{j}] drew non-positive value {sigma}"),
        ));
    }
    state.segments[j].sigma = sigma;
    Ok(())
}

/// Metropolis update of `ln(sigma_j)` under a non-conjugate scale prior.
pub fn metropolis_scale<R: Rng>(
    data: &ModelData,
    state: &mut ModelState,
    j: usize,
    range: Range<usize>,
    prior: &ScalePrior,
    width: f64,
    rng: &mut R,
) -> KernelResult<MoveOutcome> {
    let count = range.len() as f64;
    let sum_squares = segment_sum_squares(data, state, j, range);
    // Log target over u = ln(sigma), Jacobian included.
    let log_target = |sigma: f64| {
        -count * sigma.ln() - 0.5 * sum_squares / (sigma * sigma)
            + prior.log_density_sigma(sigma)
            + sigma.ln()
    };

    let current = state.segments[j].sigma;
    let proposed = (current.ln() + width * standard_normal(rng)).exp();
    if !proposed.is_finite() || proposed <= 0.0 {
        return Ok(MoveOutcome::Rejected);
    }

    let log_ratio = log_target(proposed) - log_target(current);
    if log_ratio.is_nan() {
        return Err(SamplingFailure::new(
            FailureCheck::NonFiniteLikelihood,
            format!("sigma[{j}] acceptance ratio is NaN (current={current}, proposed={proposed})"),
        ));
    }
    let u: f64 = rng.sample(Open01);
    if u.ln() < log_ratio {
        state.segments[j].sigma = proposed;
        Ok(MoveOutcome::Accepted)
    } else {
        Ok(MoveOutcome::Rejected)
    }
}

/// Coordinate-wise conjugate Gibbs update of the covariate coefficients.
///
/// `effect` is scratch space for the current linear predictor.
pub fn update_coefficients<R: Rng>(
    data: &ModelData,
    spec: &ChangePointSpec,
    state: &mut ModelState,
    effect: &mut Vec<f64>,
    rng: &mut R,
) -> KernelResult<()> {
    let p = data.n_features();
    if p == 0 {
        return Ok(());
    }

    let ranges = segment_ranges(data.n(), &state.breaks);
    effect.clear();
    effect.resize(data.n(), 0.0);
    for (j, range) in ranges.iter().enumerate() {
        for t in range.clone() {
            effect[t] = data.effect(t, j, &state.coefficients);
        }
    }

    let sets: Vec<(usize, Vec<usize>)> = match data.sharing() {
        CoefficientSharing::Shared => vec![(0, (0..ranges.len()).collect())],
        CoefficientSharing::PerSegment => (0..ranges.len()).map(|j| (j, vec![j])).collect(),
    };

    for (set, segments) in sets {
        for (f, covariate) in spec.covariates().iter().enumerate() {
            let idx = spec.coefficient_index(set, f);
            let old = state.coefficients[idx];
            let prior = covariate.prior;
            let mut precision = prior.precision();
            let mut weighted = prior.mean * prior.precision();

            for &j in &segments {
                let SegmentParams { mean, sigma } = state.segments[j];
                let inv_variance = 1.0 / (sigma * sigma);
                for t in ranges[j].clone() {
                    let x = data.row(t)[f];
                    let partial = data.value(t) - mean - (effect[t] - x * old);
                    precision += x * x * inv_variance;
                    weighted += x * partial * inv_variance;
                }
            }

            let draw = weighted / precision + standard_normal(rng) / precision.sqrt();
            let draw = checked_parameter(format!("beta[{}]", covariate.feature), draw)?;
            state.coefficients[idx] = draw;
            for &j in &segments {
                for t in ranges[j].clone() {
                    effect[t] += data.row(t)[f] * (draw - old);
                }
            }
        }
    }
    Ok(())
}

/// Random admissible break tuple plus moment-matched segment parameters.
pub fn initial_state<R: Rng>(
    data: &ModelData,
    spec: &ChangePointSpec,
    rng: &mut R,
) -> KernelResult<ModelState> {
    let k = spec.n_breaks();
    let m = spec.min_segment_len();
    let (lower, upper) = spec.break_bounds();
    let spread = upper - lower;
    let slack = spread.checked_sub((k - 1) * m).ok_or_else(|| {
        SamplingFailure::new(
            FailureCheck::DegenerateConditional,
            format!("no admissible tuple of {k} breaks in [{lower}, {upper}] with min_segment_len={m}"),
        )
    })?;

    let mut offsets: Vec<usize> = (0..k).map(|_| rng.gen_range(0..=slack)).collect();
    offsets.sort_unstable();
    let breaks: Vec<usize> = offsets
        .into_iter()
        .enumerate()
        .map(|(idx, offset)| lower + offset + idx * m)
        .collect();

    let (_, pooled_variance) = bcp_core::mean_and_variance(data.values());
    let pooled_sd = positive_or(pooled_variance.sqrt(), 1.0);
    let segments = segment_ranges(data.n(), &breaks)
        .into_iter()
        .map(|range| {
            let (mean, variance) = bcp_core::mean_and_variance(&data.values()[range]);
            SegmentParams {
                mean,
                sigma: positive_or(variance.sqrt(), pooled_sd),
            }
        })
        .collect();

    Ok(ModelState {
        breaks,
        segments,
        coefficients: vec![0.0; spec.n_coefficients()],
    })
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
