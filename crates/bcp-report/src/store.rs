// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::events::EventAssociation;
use crate::predictive::PredictiveCheck;
use crate::summary::PosteriorSummary;
use bcp_compare::{ModelComparison, Waic};
use bcp_core::{BcpError, JobState, RunMetadata};
use bcp_diagnostics::ConvergenceReport;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

pub const RUN_REPORT_SCHEMA_VERSION: u32 = 1;

/// Structured reason a run did not publish a trace.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunFailure {
    pub kind: String,
    pub message: String,
}

impl From<&BcpError> for RunFailure {
    fn from(err: &BcpError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Everything published for one fit of one specification.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub schema_version: u32,
    pub run_id: String,
    pub spec_name: String,
    pub state: JobState,
    pub failure: Option<RunFailure>,
    pub diagnostics: Option<ConvergenceReport>,
    pub summary: Option<PosteriorSummary>,
    pub waic: Option<Waic>,
    pub events: Vec<EventAssociation>,
    pub predictive: Option<PredictiveCheck>,
    pub metadata: Option<RunMetadata>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, spec_name: impl Into<String>, state: JobState) -> Self {
        Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            run_id: run_id.into(),
            spec_name: spec_name.into(),
            state,
            failure: None,
            diagnostics: None,
            summary: None,
            waic: None,
            events: vec![],
            predictive: None,
            metadata: None,
        }
    }

    /// Published but flagged untrustworthy.
    pub fn is_non_convergent(&self) -> bool {
        self.state == JobState::NonConvergent
    }
}

/// Reports of every variant fit in one analysis, plus their comparison.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisReport {
    pub schema_version: u32,
    pub runs: Vec<RunReport>,
    pub comparison: Option<ModelComparison>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    reports: BTreeMap<String, RunReport>,
    order: Vec<String>,
}

/// In-memory results store, append/replace per run id.
///
/// Replacing a run id moves it to the most recent position. Writers for the
/// same run id are expected to be serialized by the caller.
#[derive(Debug, Default)]
pub struct ResultsStore {
    inner: RwLock<StoreInner>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `report`, returning the report it replaced, if any.
    pub fn put(&self, report: RunReport) -> Option<RunReport> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let run_id = report.run_id.clone();
        inner.order.retain(|id| id != &run_id);
        inner.order.push(run_id.clone());
        let previous = inner.reports.insert(run_id.clone(), report);
        tracing::debug!(run_id, replaced = previous.is_some(), "stored run report");
        previous
    }

    pub fn get(&self, run_id: &str) -> Option<RunReport> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.reports.get(run_id).cloned()
    }

    /// Most recently stored report.
    pub fn latest(&self) -> Option<RunReport> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .last()
            .and_then(|run_id| inner.reports.get(run_id))
            .cloned()
    }

    /// Run ids, oldest first.
    pub fn run_ids(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.order.clone()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All reports, oldest first, as a JSON array.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<serde_json::Value, BcpError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let reports: Vec<&RunReport> = inner
            .order
            .iter()
            .filter_map(|run_id| inner.reports.get(run_id))
            .collect();
        serde_json::to_value(reports).map_err(|err| {
            BcpError::invalid_input(format!("failed to serialize run reports: {err}"))
        })
    }
}
