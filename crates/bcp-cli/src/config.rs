// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, CovariateTable};
use bcp_diagnostics::ConvergenceThresholds;
use bcp_features::{EventFeatureConfig, EventRecord, log_returns};
use bcp_model::{ChangePointSpec, CoefficientSharing, NormalPrior, SegmentPrior};
use bcp_report::{DatedEvent, SummaryConfig};
use bcp_sampler::SamplerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_N_BREAKS: usize = 5;

/// One candidate model fit and compared within an analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelVariant {
    pub name: String,
    pub n_breaks: usize,
    pub min_segment_len: usize,
    pub segment_prior: SegmentPrior,
    /// Explicit covariate feature names.
    pub covariates: Vec<String>,
    /// Regress on every column produced by the event feature builder.
    pub event_features: bool,
    pub coefficient_prior: NormalPrior,
    pub sharing: CoefficientSharing,
}

impl Default for ModelVariant {
    fn default() -> Self {
        Self::baseline(DEFAULT_N_BREAKS)
    }
}

impl ModelVariant {
    /// Breaks only, no covariates.
    pub fn baseline(n_breaks: usize) -> Self {
        Self {
            name: format!("k{n_breaks}"),
            n_breaks,
            min_segment_len: 1,
            segment_prior: SegmentPrior::default(),
            covariates: vec![],
            event_features: false,
            coefficient_prior: NormalPrior::weakly_informative(),
            sharing: CoefficientSharing::Shared,
        }
    }

    /// Breaks plus every event feature column.
    pub fn with_events(n_breaks: usize) -> Self {
        Self {
            name: format!("k{n_breaks}_events"),
            event_features: true,
            ..Self::baseline(n_breaks)
        }
    }

    /// Resolved covariate names, event features first.
    pub fn covariate_names(&self, features: &EventFeatureConfig) -> Vec<String> {
        let mut names = if self.event_features {
            features.feature_names()
        } else {
            vec![]
        };
        for name in &self.covariates {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn needs_covariates(&self) -> bool {
        self.event_features || !self.covariates.is_empty()
    }

    pub fn build(
        &self,
        n_obs: usize,
        features: &EventFeatureConfig,
        covariates: Option<&CovariateTable>,
    ) -> Result<ChangePointSpec, BcpError> {
        let mut builder = ChangePointSpec::builder(self.n_breaks)
            .name(self.name.clone())
            .min_segment_len(self.min_segment_len)
            .segment_priors(self.segment_prior)
            .sharing(self.sharing);
        for feature in self.covariate_names(features) {
            builder = builder.covariate(feature, self.coefficient_prior);
        }
        builder.build(n_obs, covariates)
    }
}

/// Everything a `bcp fit` run is configured with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sampler: SamplerConfig,
    pub thresholds: ConvergenceThresholds,
    pub summary: SummaryConfig,
    pub features: EventFeatureConfig,
    pub variants: Vec<ModelVariant>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            thresholds: ConvergenceThresholds::default(),
            summary: SummaryConfig::default(),
            features: EventFeatureConfig::default(),
            variants: vec![
                ModelVariant::baseline(DEFAULT_N_BREAKS),
                ModelVariant::with_events(DEFAULT_N_BREAKS),
            ],
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        self.sampler.validate()?;
        self.thresholds.validate()?;
        self.summary.validate()?;
        self.features.validate()?;

        if self.variants.is_empty() {
            return Err(BcpError::invalid_input(
                "AnalysisConfig.variants must list at least one model",
            ));
        }
        let mut seen = BTreeSet::new();
        for (idx, variant) in self.variants.iter().enumerate() {
            if variant.name.trim().is_empty() {
                return Err(BcpError::invalid_input(format!(
                    "AnalysisConfig.variants[{idx}].name must be non-empty"
                )));
            }
            if !seen.insert(variant.name.as_str()) {
                return Err(BcpError::invalid_input(format!(
                    "AnalysisConfig.variants contains duplicate name '{}'",
                    variant.name
                )));
            }
        }
        Ok(())
    }

    /// Sets the break count of every variant, renaming default-named ones.
    pub fn override_breaks(&mut self, n_breaks: usize) {
        for variant in &mut self.variants {
            if variant.name == format!("k{}", variant.n_breaks) {
                variant.name = format!("k{n_breaks}");
            } else if variant.name == format!("k{}_events", variant.n_breaks) {
                variant.name = format!("k{n_breaks}_events");
            }
            variant.n_breaks = n_breaks;
        }
    }

    pub fn needs_covariates(&self) -> bool {
        self.variants.iter().any(ModelVariant::needs_covariates)
    }
}

/// A dated event, indexed on the modeled (return) series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub time_index: usize,
    #[serde(default)]
    pub label: Option<String>,
    pub category: String,
    #[serde(default)]
    pub high_impact: bool,
}

/// JSON input of `bcp fit`: either prices or log-returns, plus events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisInput {
    pub prices: Option<Vec<f64>>,
    pub returns: Option<Vec<f64>>,
    pub events: Vec<InputEvent>,
}

impl AnalysisInput {
    /// The series the model is fit to.
    pub fn series(&self) -> Result<Vec<f64>, BcpError> {
        match (&self.prices, &self.returns) {
            (Some(prices), None) => log_returns(prices),
            (None, Some(returns)) => Ok(returns.clone()),
            (Some(_), Some(_)) => Err(BcpError::invalid_input(
                "input must provide either prices or returns, not both",
            )),
            (None, None) => Err(BcpError::invalid_input(
                "input must provide prices or returns",
            )),
        }
    }

    pub fn event_records(&self) -> Vec<EventRecord> {
        self.events
            .iter()
            .map(|event| EventRecord {
                time_index: event.time_index,
                category: event.category.clone(),
                high_impact: event.high_impact,
            })
            .collect()
    }

    pub fn dated_events(&self) -> Vec<DatedEvent> {
        self.events
            .iter()
            .map(|event| DatedEvent {
                time_index: event.time_index,
                label: event
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("{}@{}", event.category, event.time_index)),
                category: Some(event.category.clone()),
            })
            .collect()
    }
}
