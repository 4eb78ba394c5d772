// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Fit-job orchestration: analysis configuration, the explicit job record,
//! and the fit/compare pipeline behind the `bcp` binary.

pub mod config;
pub mod job;
pub mod pipeline;

pub use config::{AnalysisConfig, AnalysisInput, DEFAULT_N_BREAKS, InputEvent, ModelVariant};
pub use job::FitJob;
pub use pipeline::{
    AnalysisOutcome, FitConfig, FitOutcome, FitRequest, PreparedAnalysis, prepare_analysis,
    run_analysis, run_fit,
};
