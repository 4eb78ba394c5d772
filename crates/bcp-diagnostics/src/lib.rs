// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Convergence diagnostics over posterior traces.
//!
//! Diagnostics never abort a run. They annotate it with per-parameter R-hat
//! and effective sample size and a single `converged` flag.

pub mod ess;
pub mod report;
pub mod rhat;

pub use ess::effective_sample_size;
pub use report::{ConvergenceReport, ConvergenceThresholds, ParamDiagnostics, diagnose};
pub use rhat::{Rhat, rhat};
