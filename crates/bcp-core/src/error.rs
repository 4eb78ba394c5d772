// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Sampling phase in which a chain failed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingPhase {
    Initialization,
    WarmUp,
    Draw,
}

impl SamplingPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::WarmUp => "warm_up",
            Self::Draw => "draw",
        }
    }
}

/// The check that tripped when a run was aborted.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCheck {
    NonFiniteLikelihood,
    NonFiniteParameter,
    DegenerateConditional,
    AllChainsDiverged,
}

impl FailureCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonFiniteLikelihood => "non_finite_likelihood",
            Self::NonFiniteParameter => "non_finite_parameter",
            Self::DegenerateConditional => "degenerate_conditional",
            Self::AllChainsDiverged => "all_chains_diverged",
        }
    }
}

/// Structured reason for an aborted sampler run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplingFailure {
    pub chain: Option<usize>,
    /// Iteration index within the chain, counting warm-up iterations.
    pub draw: Option<usize>,
    pub phase: Option<SamplingPhase>,
    pub check: FailureCheck,
    pub detail: String,
}

impl SamplingFailure {
    pub fn new(check: FailureCheck, detail: impl Into<String>) -> Self {
        Self {
            chain: None,
            draw: None,
            phase: None,
            check,
            detail: detail.into(),
        }
    }

    pub fn at(mut self, chain: usize, draw: usize, phase: SamplingPhase) -> Self {
        self.chain = Some(chain);
        self.draw = Some(draw);
        self.phase = Some(phase);
        self
    }
}

impl fmt::Display for SamplingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "check={}", self.check.as_str())?;
        if let Some(chain) = self.chain {
            write!(f, " chain={chain}")?;
        }
        if let Some(draw) = self.draw {
            write!(f, " draw={draw}")?;
        }
        if let Some(phase) = self.phase {
            write!(f, " phase={}", phase.as_str())?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// Error taxonomy shared by every engine crate.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BcpError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid specification: {0}")]
    InvalidSpecification(String),
    #[error("sampling failure: {0}")]
    SamplingFailure(SamplingFailure),
    #[error("incomparable models: {0}")]
    IncomparableModels(String),
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
}

impl BcpError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_specification(msg: impl Into<String>) -> Self {
        Self::InvalidSpecification(msg.into())
    }

    pub fn sampling_failure(failure: SamplingFailure) -> Self {
        Self::SamplingFailure(failure)
    }

    pub fn incomparable(msg: impl Into<String>) -> Self {
        Self::IncomparableModels(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    /// Stable machine-readable kind, used by report and job records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidSpecification(_) => "invalid_specification",
            Self::SamplingFailure(_) => "sampling_failure",
            Self::IncomparableModels(_) => "incomparable_models",
            Self::NumericalIssue(_) => "numerical_issue",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BcpError, FailureCheck, SamplingFailure, SamplingPhase};

    #[test]
    fn constructors_format_with_kind_prefix() {
        assert_eq!(
            BcpError::invalid_input("n must be >= 1").to_string(),
            "invalid input: n must be >= 1"
        );
        assert_eq!(
            BcpError::invalid_specification("K too large").to_string(),
            "invalid specification: K too large"
        );
        assert_eq!(
            BcpError::incomparable("length mismatch").to_string(),
            "incomparable models: length mismatch"
        );
    }

    #[test]
    fn sampling_failure_display_names_chain_draw_and_check() {
        let failure = SamplingFailure::new(FailureCheck::NonFiniteLikelihood, "NaN at t=4")
            .at(1, 37, SamplingPhase::Draw);
        let err = BcpError::sampling_failure(failure);
        assert_eq!(
            err.to_string(),
            "sampling failure: check=non_finite_likelihood chain=1 draw=37 phase=draw: NaN at t=4"
        );
        assert_eq!(err.kind(), "sampling_failure");
    }

    #[test]
    fn sampling_failure_without_location_omits_fields() {
        let failure = SamplingFailure::new(FailureCheck::AllChainsDiverged, "2 of 2 chains");
        assert_eq!(failure.to_string(), "check=all_chains_diverged: 2 of 2 chains");
    }
}
