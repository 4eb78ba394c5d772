// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::chain::{ChainInput, ChainOutcome, ProgressCounter, run_chain};
use crate::config::{BreakMove, SamplerConfig};
use crate::pointwise::PointwiseLogLik;
use crate::trace::{Completeness, IncompleteReason, Trace};
use bcp_core::{BcpError, ExecutionContext, FailureCheck, RunMetadata, SamplingFailure};
use bcp_model::{ChangePointSpec, ModelData};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::borrow::Cow;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Sub-seed of `chain` derived from the run seed with a SplitMix64 finalizer.
pub fn chain_seed(seed: u64, chain: usize) -> u64 {
    let mut z = seed.wrapping_add((chain as u64).wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Multi-chain posterior sampler over break locations and segment/covariate
/// parameters.
#[derive(Clone, Debug)]
pub struct ChangePointSampler {
    config: SamplerConfig,
}

impl ChangePointSampler {
    pub fn new(config: SamplerConfig) -> Result<Self, BcpError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    fn algorithm(&self) -> &'static str {
        match self.config.break_move {
            BreakMove::Enumerate => "gibbs-enumerate",
            BreakMove::RandomWalk { .. } => "gibbs-random-walk",
        }
    }

    /// Produces a fresh [`Trace`] for `(spec, data)`.
    ///
    /// Cancellation yields a trace tagged incomplete. A numerical failure in
    /// any chain, or divergence of every chain, aborts the run.
    pub fn sample(
        &self,
        spec: &ChangePointSpec,
        data: &ModelData,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Trace, BcpError> {
        if data.n() != spec.n_obs() {
            return Err(BcpError::invalid_input(format!(
                "specification '{}' expects N={}, bound data has {}",
                spec.name(),
                spec.n_obs(),
                data.n()
            )));
        }
        if data.n_features() != spec.n_features() {
            return Err(BcpError::invalid_input(format!(
                "specification '{}' declares {} covariates, bound data has {}",
                spec.name(),
                spec.n_features(),
                data.n_features()
            )));
        }

        let config = &self.config;
        let started_at = Instant::now();
        tracing::info!(
            spec = spec.name(),
            n = data.n(),
            breaks = spec.n_breaks(),
            chains = config.chains,
            draws = config.draws,
            tune = config.tune,
            seed = config.seed,
            break_move = config.break_move.as_str(),
            "sampler starting"
        );

        let seeds: Vec<u64> = (0..config.chains)
            .map(|chain| chain_seed(config.seed, chain))
            .collect();
        let progress = ProgressCounter::new(config.chains * config.iterations_per_chain());
        let halt = AtomicBool::new(false);
        let input = |chain: usize| ChainInput {
            chain,
            seed: seeds[chain],
            spec,
            data,
            config,
            ctx,
            progress: &progress,
            halt: &halt,
        };

        let (results, used_parallel) = self.run_chains(&input);

        let mut outcomes: Vec<ChainOutcome> = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(failure) => {
                    tracing::warn!(%failure, "sampler aborted");
                    return Err(BcpError::sampling_failure(failure));
                }
            }
        }

        let mut warnings = vec![];
        for outcome in &outcomes {
            let stats = &outcome.trace.stats;
            if stats.diverged {
                tracing::warn!(
                    chain = outcome.trace.chain,
                    acceptance_rate = stats.acceptance_rate,
                    floor = config.min_acceptance,
                    "chain diverged"
                );
                warnings.push(format!(
                    "chain {} diverged: acceptance rate {:.4} below floor {}",
                    outcome.trace.chain, stats.acceptance_rate, config.min_acceptance
                ));
            }
        }
        if outcomes.iter().all(|outcome| outcome.trace.stats.diverged) {
            return Err(BcpError::sampling_failure(SamplingFailure::new(
                FailureCheck::AllChainsDiverged,
                format!(
                    "all {} chains stayed below acceptance floor {}",
                    outcomes.len(),
                    config.min_acceptance
                ),
            )));
        }

        let cancelled = outcomes.iter().any(|outcome| outcome.trace.stats.cancelled);
        let completeness = if cancelled {
            Completeness::Incomplete {
                reason: IncompleteReason::Cancelled,
            }
        } else {
            Completeness::Complete
        };

        let mut pointwise = PointwiseLogLik::new(data.n());
        let mut chains = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            pointwise.merge(&outcome.pointwise)?;
            chains.push(outcome.trace);
        }
        let retained: usize = chains.iter().map(|chain| chain.samples.len()).sum();

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        ctx.record_scalar("sampler.runtime_ms", runtime_ms as f64);
        ctx.record_scalar("sampler.retained_draws", retained as f64);
        if !cancelled {
            ctx.report_progress(1.0);
        }

        if cancelled {
            tracing::warn!(
                retained,
                target = config.draws * config.chains,
                "sampler cancelled; returning incomplete trace"
            );
            warnings.push(format!(
                "cancelled after {retained} of {} draws",
                config.draws * config.chains
            ));
        }
        tracing::info!(
            spec = spec.name(),
            retained,
            runtime_ms,
            complete = !cancelled,
            "sampler finished"
        );

        #[cfg(feature = "rayon")]
        let thread_count = used_parallel.then(rayon::current_num_threads);
        #[cfg(not(feature = "rayon"))]
        let thread_count = {
            let _ = used_parallel;
            None
        };

        #[allow(unused_mut)]
        let mut metadata = RunMetadata {
            n: data.n(),
            runtime_ms: Some(runtime_ms),
            notes: vec![format!(
                "chains={}, draws={}, tune={}, break_move={}, used_parallel={used_parallel}",
                config.chains,
                config.draws,
                config.tune,
                config.break_move.as_str()
            )],
            warnings,
            algorithm: Cow::Borrowed(self.algorithm()),
            seed: Some(config.seed),
            thread_count,
            ..RunMetadata::default()
        };
        #[cfg(feature = "serde")]
        {
            metadata.params_json = serde_json::to_value(config).ok();
        }

        Ok(Trace::new(
            spec.name().to_string(),
            spec.layout(),
            spec.n_breaks(),
            chains,
            config.draws,
            completeness,
            data.fingerprint(),
            pointwise,
            metadata,
        ))
    }

    #[cfg(feature = "rayon")]
    fn run_chains<'a, F>(&self, input: &F) -> (Vec<Result<ChainOutcome, SamplingFailure>>, bool)
    where
        F: Fn(usize) -> ChainInput<'a> + Sync,
    {
        if self.config.parallel && self.config.chains > 1 {
            let results = (0..self.config.chains)
                .into_par_iter()
                .map(|chain| run_chain(input(chain)))
                .collect();
            (results, true)
        } else {
            (self.run_sequential(input), false)
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn run_chains<'a, F>(&self, input: &F) -> (Vec<Result<ChainOutcome, SamplingFailure>>, bool)
    where
        F: Fn(usize) -> ChainInput<'a>,
    {
        (self.run_sequential(input), false)
    }

    fn run_sequential<'a, F>(&self, input: &F) -> Vec<Result<ChainOutcome, SamplingFailure>>
    where
        F: Fn(usize) -> ChainInput<'a>,
    {
        let mut results = Vec::with_capacity(self.config.chains);
        for chain in 0..self.config.chains {
            let result = run_chain(input(chain));
            let failed = result.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }
}
