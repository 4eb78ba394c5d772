// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Posterior sampler for Bayesian change-point models.
//!
//! Each sweep updates the break locations (exact enumeration of the full
//! conditional, or integer random-walk Metropolis), then the segment means
//! and scales given the breaks, then the covariate coefficients. Chains are
//! independent and run on the rayon pool when enabled.

mod adapt;
mod chain;
pub mod config;
pub mod kernels;
pub mod pointwise;
pub mod sampler;
pub mod trace;

pub use config::{BreakMove, SamplerConfig};
pub use pointwise::PointwiseLogLik;
pub use sampler::{ChangePointSampler, chain_seed};
pub use trace::{ChainStats, ChainTrace, Completeness, IncompleteReason, PosteriorSample, Trace};
