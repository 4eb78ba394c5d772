// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::pointwise::PointwiseLogLik;
use bcp_core::{DataFingerprint, RunMetadata};
use bcp_model::{ModelState, ParamLayout};

/// One retained MCMC draw.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PosteriorSample {
    pub state: ModelState,
    pub log_likelihood: f64,
    /// Log prior of the continuous parameters; breaks add a constant.
    pub log_prior: f64,
}

impl PosteriorSample {
    pub fn breaks(&self) -> &[usize] {
        &self.state.breaks
    }

    /// Unnormalized log posterior of the draw.
    pub fn log_posterior(&self) -> f64 {
        self.log_likelihood + self.log_prior
    }
}

/// Per-chain acceptance bookkeeping over warm-up and draws.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChainStats {
    /// Break and scale updates attempted; Gibbs draws count as accepted proposals.
    pub proposals: u64,
    pub accepted: u64,
    /// Random-walk proposals rejected for leaving the ordered admissible region.
    pub order_rejections: u64,
    pub acceptance_rate: f64,
    pub diverged: bool,
    /// Final random-walk step per break (empty for enumeration).
    pub break_steps: Vec<f64>,
    /// Final log-scale proposal width per segment (empty for conjugate scales).
    pub scale_steps: Vec<f64>,
    pub retained_draws: usize,
    pub cancelled: bool,
}

impl ChainStats {
    pub fn rejected(&self) -> u64 {
        self.proposals.saturating_sub(self.accepted)
    }

    pub(crate) fn finish(&mut self, min_acceptance: f64) {
        self.acceptance_rate = if self.proposals == 0 {
            1.0
        } else {
            self.accepted as f64 / self.proposals as f64
        };
        self.diverged = self.proposals > 0 && self.acceptance_rate < min_acceptance;
    }
}

/// Draws retained by one chain, in iteration order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ChainTrace {
    pub chain: usize,
    pub seed: u64,
    pub samples: Vec<PosteriorSample>,
    pub stats: ChainStats,
}

impl ChainTrace {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncompleteReason {
    Cancelled,
}

/// Whether every chain reached its configured number of draws.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete { reason: IncompleteReason },
}

/// Immutable output of one sampler run for one (specification, data) pair.
///
/// Re-running the sampler produces a new trace; nothing here is updated in place.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    spec_name: String,
    layout: ParamLayout,
    n_breaks: usize,
    chains: Vec<ChainTrace>,
    target_draws: usize,
    completeness: Completeness,
    fingerprint: DataFingerprint,
    pointwise: PointwiseLogLik,
    metadata: RunMetadata,
}

impl Trace {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        spec_name: String,
        layout: ParamLayout,
        n_breaks: usize,
        chains: Vec<ChainTrace>,
        target_draws: usize,
        completeness: Completeness,
        fingerprint: DataFingerprint,
        pointwise: PointwiseLogLik,
        metadata: RunMetadata,
    ) -> Self {
        Self {
            spec_name,
            layout,
            n_breaks,
            chains,
            target_draws,
            completeness,
            fingerprint,
            pointwise,
            metadata,
        }
    }

    pub fn spec_name(&self) -> &str {
        &self.spec_name
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    pub fn n_breaks(&self) -> usize {
        self.n_breaks
    }

    pub fn n_obs(&self) -> usize {
        self.fingerprint.n
    }

    pub fn chains(&self) -> &[ChainTrace] {
        &self.chains
    }

    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    /// Configured post-warm-up draws per chain.
    pub fn target_draws(&self) -> usize {
        self.target_draws
    }

    /// Retained draws across all chains.
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(ChainTrace::len).sum()
    }

    pub fn completeness(&self) -> Completeness {
        self.completeness
    }

    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }

    pub fn fingerprint(&self) -> DataFingerprint {
        self.fingerprint
    }

    pub fn pointwise(&self) -> &PointwiseLogLik {
        &self.pointwise
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Every retained sample, chain by chain.
    pub fn samples(&self) -> impl Iterator<Item = &PosteriorSample> + '_ {
        self.chains.iter().flat_map(|chain| chain.samples.iter())
    }

    /// Draws of layout slot `param`, one vector per chain.
    pub fn param_draws(&self, param: usize) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|chain| {
                chain
                    .samples
                    .iter()
                    .map(|sample| self.layout.value(&sample.state, param))
                    .collect()
            })
            .collect()
    }

    /// Pooled draws of layout slot `param`.
    pub fn pooled_draws(&self, param: usize) -> Vec<f64> {
        self.samples()
            .map(|sample| self.layout.value(&sample.state, param))
            .collect()
    }
}
