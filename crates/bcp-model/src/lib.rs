// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Declarative change-point model: priors, specification, data binding and
//! the segment-grouped Normal likelihood.

pub mod data;
pub mod layout;
pub mod likelihood;
pub mod priors;
pub mod spec;
pub mod state;

pub use data::ModelData;
pub use layout::{ParamKind, ParamLayout};
pub use likelihood::{
    log_likelihood, log_prior, point_log_likelihood, pointwise_log_likelihood,
    segment_log_likelihood,
};
pub use priors::{BreakPrior, CoefficientSharing, NormalPrior, ScalePrior, SegmentPrior};
pub use spec::{ChangePointSpec, ChangePointSpecBuilder, CovariatePrior};
pub use state::{ModelState, SegmentParams};
