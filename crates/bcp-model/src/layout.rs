// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::priors::CoefficientSharing;
use crate::spec::ChangePointSpec;
use crate::state::ModelState;

/// Which scalar of a sample a layout slot refers to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Break { index: usize },
    SegmentMean { segment: usize },
    SegmentScale { segment: usize },
    Coefficient { segment: Option<usize>, feature: usize },
}

/// Stable, named flattening of every scalar parameter in a sample.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ParamLayout {
    names: Vec<String>,
    kinds: Vec<ParamKind>,
    n_features: usize,
}

impl ParamLayout {
    pub fn for_spec(spec: &ChangePointSpec) -> Self {
        let mut names = Vec::new();
        let mut kinds = Vec::new();

        for index in 0..spec.n_breaks() {
            names.push(format!("break[{index}]"));
            kinds.push(ParamKind::Break { index });
        }
        for segment in 0..spec.n_segments() {
            names.push(format!("mu[{segment}]"));
            kinds.push(ParamKind::SegmentMean { segment });
        }
        for segment in 0..spec.n_segments() {
            names.push(format!("sigma[{segment}]"));
            kinds.push(ParamKind::SegmentScale { segment });
        }
        match spec.sharing() {
            CoefficientSharing::Shared => {
                for (feature, covariate) in spec.covariates().iter().enumerate() {
                    names.push(format!("beta[{}]", covariate.feature));
                    kinds.push(ParamKind::Coefficient {
                        segment: None,
                        feature,
                    });
                }
            }
            CoefficientSharing::PerSegment => {
                for segment in 0..spec.n_segments() {
                    for (feature, covariate) in spec.covariates().iter().enumerate() {
                        names.push(format!("beta[{segment},{}]", covariate.feature));
                        kinds.push(ParamKind::Coefficient {
                            segment: Some(segment),
                            feature,
                        });
                    }
                }
            }
        }

        Self {
            names,
            kinds,
            n_features: spec.n_features(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kinds(&self) -> &[ParamKind] {
        &self.kinds
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    /// Value of slot `idx` in `state`.
    pub fn value(&self, state: &ModelState, idx: usize) -> f64 {
        match self.kinds[idx] {
            ParamKind::Break { index } => state.breaks[index] as f64,
            ParamKind::SegmentMean { segment } => state.segments[segment].mean,
            ParamKind::SegmentScale { segment } => state.segments[segment].sigma,
            ParamKind::Coefficient { segment, feature } => {
                let offset = segment.map_or(0, |segment| segment * self.n_features);
                state.coefficients[offset + feature]
            }
        }
    }

    pub fn flatten(&self, state: &ModelState) -> Vec<f64> {
        (0..self.len()).map(|idx| self.value(state, idx)).collect()
    }
}
