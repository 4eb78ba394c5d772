// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared data model, error taxonomy and run controls for the Bayesian
//! change-point engine.

pub mod control;
pub mod error;
pub mod execution_context;
pub mod job;
pub mod metadata;
pub mod numeric;
pub mod observability;
pub mod segments;
pub mod series;

pub use control::CancelToken;
pub use error::{BcpError, FailureCheck, SamplingFailure, SamplingPhase};
pub use execution_context::ExecutionContext;
pub use job::JobState;
pub use metadata::{RUN_METADATA_SCHEMA_VERSION, RunMetadata};
pub use numeric::{LN_2PI, log_add_exp, log_sum_exp, mean_and_variance, normal_log_pdf, sorted_quantile};
pub use observability::{ProgressSink, TelemetrySink};
pub use segments::{break_bounds, min_series_len, segment_of, segment_ranges, validate_breaks};
pub use series::{CovariateTable, DataFingerprint, EventCovariateRow, Observation, ObservationSet};
