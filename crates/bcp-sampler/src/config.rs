// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;

const DEFAULT_DRAWS: usize = 2000;
const DEFAULT_TUNE: usize = 1000;
const DEFAULT_CHAINS: usize = 2;
const DEFAULT_TARGET_ACCEPT: f64 = 0.44;
const DEFAULT_MIN_ACCEPTANCE: f64 = 0.01;
const DEFAULT_RANDOM_WALK_MAX_STEP: usize = 50;

/// Update rule for each break location.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BreakMove {
    /// Exact draw from the full conditional over the window between the
    /// neighbouring breaks.
    #[default]
    Enumerate,
    /// Integer random-walk Metropolis; the step adapts during warm-up and is
    /// capped at `max_step`.
    RandomWalk { max_step: usize },
}

impl BreakMove {
    pub fn random_walk() -> Self {
        Self::RandomWalk {
            max_step: DEFAULT_RANDOM_WALK_MAX_STEP,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enumerate => "enumerate",
            Self::RandomWalk { .. } => "random_walk",
        }
    }
}

/// Configuration for [`crate::ChangePointSampler`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    /// Retained post-warm-up draws per chain.
    pub draws: usize,
    /// Warm-up iterations per chain; discarded.
    pub tune: usize,
    pub chains: usize,
    /// Acceptance rate the adaptive Metropolis steps aim for during warm-up.
    pub target_accept: f64,
    pub seed: u64,
    pub break_move: BreakMove,
    /// A chain whose whole-run acceptance rate falls below this floor is divergent.
    pub min_acceptance: f64,
    pub cancel_check_every: usize,
    /// Run chains on the rayon pool when the `rayon` feature is enabled.
    pub parallel: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            draws: DEFAULT_DRAWS,
            tune: DEFAULT_TUNE,
            chains: DEFAULT_CHAINS,
            target_accept: DEFAULT_TARGET_ACCEPT,
            seed: 0,
            break_move: BreakMove::Enumerate,
            min_acceptance: DEFAULT_MIN_ACCEPTANCE,
            cancel_check_every: 1,
            parallel: true,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.draws == 0 {
            return Err(BcpError::invalid_input(
                "SamplerConfig.draws must be >= 1; got 0",
            ));
        }
        if self.chains == 0 {
            return Err(BcpError::invalid_input(
                "SamplerConfig.chains must be >= 1; got 0",
            ));
        }
        if !self.target_accept.is_finite()
            || self.target_accept <= 0.0
            || self.target_accept >= 1.0
        {
            return Err(BcpError::invalid_input(format!(
                "SamplerConfig.target_accept must be in (0, 1); got {}",
                self.target_accept
            )));
        }
        if !self.min_acceptance.is_finite() || !(0.0..1.0).contains(&self.min_acceptance) {
            return Err(BcpError::invalid_input(format!(
                "SamplerConfig.min_acceptance must be in [0, 1); got {}",
                self.min_acceptance
            )));
        }
        if let BreakMove::RandomWalk { max_step } = self.break_move
            && max_step == 0
        {
            return Err(BcpError::invalid_input(
                "BreakMove::RandomWalk max_step must be >= 1; got 0",
            ));
        }
        Ok(())
    }

    pub(crate) fn normalized_cancel_check_every(&self) -> usize {
        self.cancel_check_every.max(1)
    }

    /// Iterations each chain runs when not cancelled.
    pub fn iterations_per_chain(&self) -> usize {
        self.tune.saturating_add(self.draws)
    }
}
