// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, JobState};

/// Explicit record of one fit's lifecycle.
///
/// States only move along [`JobState::can_transition_to`]; the fit pipeline
/// is the only driver.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FitJob {
    run_id: String,
    spec_name: String,
    state: JobState,
    history: Vec<JobState>,
}

impl FitJob {
    pub fn new(run_id: impl Into<String>, spec_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            spec_name: spec_name.into(),
            state: JobState::Queued,
            history: vec![JobState::Queued],
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn spec_name(&self) -> &str {
        &self.spec_name
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state visited, starting with `Queued`.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub(crate) fn transition(&mut self, next: JobState) -> Result<(), BcpError> {
        if !self.state.can_transition_to(next) {
            return Err(BcpError::invalid_input(format!(
                "job '{}' cannot move from {} to {next}",
                self.run_id, self.state
            )));
        }
        tracing::debug!(run_id = self.run_id.as_str(), from = %self.state, to = %next, "job transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}
