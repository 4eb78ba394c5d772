// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::adapt::AdaptiveScale;
use crate::config::{BreakMove, SamplerConfig};
use crate::kernels::{
    EnumerationScratch, KernelResult, MoveOutcome, enumerate_break, gibbs_scale, initial_state,
    metropolis_scale, random_walk_break, update_coefficients, update_means,
};
use crate::pointwise::PointwiseLogLik;
use crate::trace::{ChainStats, ChainTrace, PosteriorSample};
use bcp_core::{
    ExecutionContext, FailureCheck, SamplingFailure, SamplingPhase, segment_ranges,
};
use bcp_model::{
    ChangePointSpec, ModelData, ModelState, ScalePrior, log_prior, pointwise_log_likelihood,
};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const INITIAL_SCALE_WIDTH: f64 = 0.1;
const MIN_SCALE_WIDTH: f64 = 1e-4;
const MAX_SCALE_WIDTH: f64 = 5.0;
const MAX_PREALLOCATED_DRAWS: usize = 4096;

/// Shared iteration counter behind progress reporting.
#[derive(Debug)]
pub(crate) struct ProgressCounter {
    done: AtomicUsize,
    total: usize,
    stride: usize,
}

impl ProgressCounter {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total: total.max(1),
            stride: (total / 200).max(1),
        }
    }

    fn tick(&self, ctx: &ExecutionContext<'_>) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done.is_multiple_of(self.stride) {
            ctx.report_progress(done as f32 / self.total as f32);
        }
    }
}

/// Everything one chain needs; chains share nothing mutable except the
/// halt flag and the progress counter.
pub(crate) struct ChainInput<'a> {
    pub(crate) chain: usize,
    pub(crate) seed: u64,
    pub(crate) spec: &'a ChangePointSpec,
    pub(crate) data: &'a ModelData,
    pub(crate) config: &'a SamplerConfig,
    pub(crate) ctx: &'a ExecutionContext<'a>,
    pub(crate) progress: &'a ProgressCounter,
    pub(crate) halt: &'a AtomicBool,
}

pub(crate) struct ChainOutcome {
    pub(crate) trace: ChainTrace,
    pub(crate) pointwise: PointwiseLogLik,
}

struct ChainState {
    model: ModelState,
    rng: Xoshiro256PlusPlus,
    scratch: EnumerationScratch,
    effect: Vec<f64>,
    break_steps: Vec<AdaptiveScale>,
    scale_steps: Vec<AdaptiveScale>,
    stats: ChainStats,
}

/// Runs warm-up then draws for one chain, stopping early on cancellation
/// or when another chain has failed.
pub(crate) fn run_chain(input: ChainInput<'_>) -> Result<ChainOutcome, SamplingFailure> {
    let result = drive_chain(&input);
    if result.is_err() {
        input.halt.store(true, Ordering::Relaxed);
    }
    result
}

fn drive_chain(input: &ChainInput<'_>) -> Result<ChainOutcome, SamplingFailure> {
    let ChainInput {
        chain,
        seed,
        spec,
        data,
        config,
        ctx,
        progress,
        halt,
    } = *input;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let model = initial_state(data, spec, &mut rng)
        .map_err(|failure| failure.at(chain, 0, SamplingPhase::Initialization))?;

    let break_steps = match config.break_move {
        BreakMove::Enumerate => vec![],
        BreakMove::RandomWalk { max_step } => {
            let initial = (max_step as f64 / 4.0).max(1.0);
            vec![
                AdaptiveScale::new(initial, 1.0, max_step as f64, config.target_accept);
                spec.n_breaks()
            ]
        }
    };
    let scale_steps = spec
        .segment_priors()
        .iter()
        .filter(|prior| !prior.scale.is_conjugate())
        .map(|_| {
            AdaptiveScale::new(
                INITIAL_SCALE_WIDTH,
                MIN_SCALE_WIDTH,
                MAX_SCALE_WIDTH,
                config.target_accept,
            )
        })
        .collect();

    let mut state = ChainState {
        model,
        rng,
        scratch: EnumerationScratch::default(),
        effect: Vec::with_capacity(data.n()),
        break_steps,
        scale_steps,
        stats: ChainStats::default(),
    };

    let mut samples = Vec::with_capacity(config.draws.min(MAX_PREALLOCATED_DRAWS));
    let mut pointwise = PointwiseLogLik::new(data.n());
    let mut buffer = vec![0.0; data.n()];
    let cancel_every = config.normalized_cancel_check_every();

    for iteration in 0..config.iterations_per_chain() {
        if ctx.cancelled_at(iteration, cancel_every) {
            state.stats.cancelled = true;
            break;
        }
        if halt.load(Ordering::Relaxed) {
            break;
        }

        let phase = if iteration < config.tune {
            SamplingPhase::WarmUp
        } else {
            SamplingPhase::Draw
        };
        sweep(spec, data, config, &mut state, phase == SamplingPhase::WarmUp)
            .map_err(|failure| failure.at(chain, iteration, phase))?;

        if phase == SamplingPhase::Draw {
            pointwise_log_likelihood(data, &state.model, &mut buffer).map_err(|err| {
                SamplingFailure::new(FailureCheck::NonFiniteLikelihood, err.to_string()).at(
                    chain,
                    iteration,
                    phase,
                )
            })?;
            pointwise.push(&buffer).map_err(|err| {
                SamplingFailure::new(FailureCheck::NonFiniteLikelihood, err.to_string()).at(
                    chain,
                    iteration,
                    phase,
                )
            })?;
            samples.push(PosteriorSample {
                state: state.model.clone(),
                log_likelihood: buffer.iter().sum(),
                log_prior: log_prior(spec, &state.model),
            });
        }
        progress.tick(ctx);
    }

    let mut stats = state.stats;
    stats.retained_draws = samples.len();
    stats.break_steps = state.break_steps.iter().map(AdaptiveScale::scale).collect();
    stats.scale_steps = state.scale_steps.iter().map(AdaptiveScale::scale).collect();
    stats.finish(config.min_acceptance);

    tracing::debug!(
        chain,
        seed,
        retained = stats.retained_draws,
        acceptance_rate = stats.acceptance_rate,
        order_rejections = stats.order_rejections,
        cancelled = stats.cancelled,
        "chain finished"
    );

    Ok(ChainOutcome {
        trace: ChainTrace {
            chain,
            seed,
            samples,
            stats,
        },
        pointwise,
    })
}

fn record(stats: &mut ChainStats, outcome: MoveOutcome) {
    stats.proposals += 1;
    match outcome {
        MoveOutcome::Accepted => stats.accepted += 1,
        MoveOutcome::Rejected => {}
        MoveOutcome::OrderViolation => stats.order_rejections += 1,
    }
}

/// One full Gibbs sweep: breaks, segment means, segment scales, coefficients.
fn sweep(
    spec: &ChangePointSpec,
    data: &ModelData,
    config: &SamplerConfig,
    state: &mut ChainState,
    warm_up: bool,
) -> KernelResult<()> {
    for k in 0..spec.n_breaks() {
        match config.break_move {
            BreakMove::Enumerate => {
                enumerate_break(
                    data,
                    spec,
                    &mut state.model,
                    k,
                    &mut state.scratch,
                    &mut state.rng,
                )?;
                record(&mut state.stats, MoveOutcome::Accepted);
            }
            BreakMove::RandomWalk { max_step } => {
                let step = (state.break_steps[k].scale().round() as usize).clamp(1, max_step);
                let outcome =
                    random_walk_break(data, spec, &mut state.model, k, step, &mut state.rng)?;
                record(&mut state.stats, outcome);
                if warm_up {
                    state.break_steps[k].update(outcome.accepted());
                }
            }
        }
    }

    update_means(data, spec, &mut state.model, &mut state.rng)?;

    let mut adaptive = 0usize;
    for (j, range) in segment_ranges(data.n(), &state.model.breaks)
        .into_iter()
        .enumerate()
    {
        match spec.segment_prior(j).scale {
            ScalePrior::InverseGamma { shape, rate } => {
                gibbs_scale(data, &mut state.model, j, range, shape, rate, &mut state.rng)?;
                record(&mut state.stats, MoveOutcome::Accepted);
            }
            prior @ ScalePrior::HalfNormal { .. } => {
                let width = state.scale_steps[adaptive].scale();
                let outcome = metropolis_scale(
                    data,
                    &mut state.model,
                    j,
                    range,
                    &prior,
                    width,
                    &mut state.rng,
                )?;
                record(&mut state.stats, outcome);
                if warm_up {
                    state.scale_steps[adaptive].update(outcome.accepted());
                }
                adaptive += 1;
            }
        }
    }

    update_coefficients(
        data,
        spec,
        &mut state.model,
        &mut state.effect,
        &mut state.rng,
    )?;

    if let Some(offending) = state.model.first_non_finite() {
        return Err(SamplingFailure::new(
            FailureCheck::NonFiniteParameter,
            format!("state holds invalid parameter {offending}"),
        ));
    }
    Ok(())
}
