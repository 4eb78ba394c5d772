// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Human-facing views over a trace: break and segment summaries, covariate
//! coefficients, event proximity, predictive residuals, and the store that
//! publishes them.

pub mod events;
pub mod hdi;
pub mod predictive;
pub mod store;
pub mod summary;

pub use events::{DatedEvent, EventAssociation, associate_events};
pub use hdi::{Interval, PosteriorStat, hdi};
pub use predictive::{PredictiveCheck, posterior_predictive};
pub use store::{
    AnalysisReport, RUN_REPORT_SCHEMA_VERSION, ResultsStore, RunFailure, RunReport,
};
pub use summary::{
    BreakEstimate, BreakSummary, CoefficientSummary, PosteriorSummary, SegmentSummary,
    SummaryConfig, summarize,
};
