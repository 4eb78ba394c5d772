// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! WAIC scoring and ranking of change-point specifications fit on the same
//! observations.

pub mod compare;
pub mod waic;

pub use compare::{Candidate, ModelComparison, RankedModel, compare};
pub use waic::{HIGH_VARIANCE_THRESHOLD, Waic, waic};
