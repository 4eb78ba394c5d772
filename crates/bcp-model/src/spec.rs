// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::layout::ParamLayout;
use crate::priors::{BreakPrior, CoefficientSharing, NormalPrior, SegmentPrior};
use bcp_core::{BcpError, CovariateTable, break_bounds, min_series_len};
use std::collections::BTreeSet;

/// Linear effect of one event feature on the observed value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CovariatePrior {
    pub feature: String,
    pub prior: NormalPrior,
}

/// Validated, immutable change-point model for a series of `n_obs` values.
///
/// Segment priors always hold `n_breaks + 1` entries.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ChangePointSpec {
    name: String,
    n_breaks: usize,
    n_obs: usize,
    break_prior: BreakPrior,
    segment_priors: Vec<SegmentPrior>,
    covariates: Vec<CovariatePrior>,
    sharing: CoefficientSharing,
}

impl ChangePointSpec {
    pub fn builder(n_breaks: usize) -> ChangePointSpecBuilder {
        ChangePointSpecBuilder::new(n_breaks)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_breaks(&self) -> usize {
        self.n_breaks
    }

    pub fn n_segments(&self) -> usize {
        self.n_breaks + 1
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn break_prior(&self) -> BreakPrior {
        self.break_prior
    }

    pub fn min_segment_len(&self) -> usize {
        self.break_prior.min_segment_len()
    }

    /// Admissible `[lower, upper]` range of every break location.
    pub fn break_bounds(&self) -> (usize, usize) {
        // Checked at build time.
        break_bounds(self.n_obs, self.min_segment_len()).unwrap_or((1, 1))
    }

    pub fn segment_prior(&self, segment: usize) -> &SegmentPrior {
        &self.segment_priors[segment]
    }

    pub fn segment_priors(&self) -> &[SegmentPrior] {
        &self.segment_priors
    }

    pub fn covariates(&self) -> &[CovariatePrior] {
        &self.covariates
    }

    pub fn n_features(&self) -> usize {
        self.covariates.len()
    }

    pub fn has_covariates(&self) -> bool {
        !self.covariates.is_empty()
    }

    pub fn sharing(&self) -> CoefficientSharing {
        self.sharing
    }

    /// Number of coefficient scalars in a sample.
    pub fn n_coefficients(&self) -> usize {
        match self.sharing {
            CoefficientSharing::Shared => self.n_features(),
            CoefficientSharing::PerSegment => self.n_features() * self.n_segments(),
        }
    }

    /// Index into a sample's coefficient vector for `feature` in `segment`.
    pub fn coefficient_index(&self, segment: usize, feature: usize) -> usize {
        match self.sharing {
            CoefficientSharing::Shared => feature,
            CoefficientSharing::PerSegment => segment * self.n_features() + feature,
        }
    }

    pub fn layout(&self) -> ParamLayout {
        ParamLayout::for_spec(self)
    }
}

/// Declarative construction of a [`ChangePointSpec`].
#[derive(Clone, Debug)]
pub struct ChangePointSpecBuilder {
    name: Option<String>,
    n_breaks: usize,
    break_prior: BreakPrior,
    segment_priors: Vec<SegmentPrior>,
    covariates: Vec<CovariatePrior>,
    sharing: CoefficientSharing,
}

impl ChangePointSpecBuilder {
    pub fn new(n_breaks: usize) -> Self {
        Self {
            name: None,
            n_breaks,
            break_prior: BreakPrior::default(),
            segment_priors: vec![SegmentPrior::default()],
            covariates: vec![],
            sharing: CoefficientSharing::Shared,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn min_segment_len(mut self, min_segment_len: usize) -> Self {
        self.break_prior = BreakPrior::OrderedUniform { min_segment_len };
        self
    }

    /// Uses the same priors for every segment.
    pub fn segment_priors(mut self, prior: SegmentPrior) -> Self {
        self.segment_priors = vec![prior];
        self
    }

    /// Uses one prior per segment; the length must be `n_breaks + 1`.
    pub fn per_segment_priors(mut self, priors: Vec<SegmentPrior>) -> Self {
        self.segment_priors = priors;
        self
    }

    pub fn covariate(mut self, feature: impl Into<String>, prior: NormalPrior) -> Self {
        self.covariates.push(CovariatePrior {
            feature: feature.into(),
            prior,
        });
        self
    }

    pub fn sharing(mut self, sharing: CoefficientSharing) -> Self {
        self.sharing = sharing;
        self
    }

    /// Validates the declaration against the series length and the available
    /// covariate columns.
    pub fn build(
        self,
        n_obs: usize,
        covariates: Option<&CovariateTable>,
    ) -> Result<ChangePointSpec, BcpError> {
        let k = self.n_breaks;
        if k == 0 {
            return Err(BcpError::invalid_specification(
                "number of breaks K must be >= 1",
            ));
        }
        if k.saturating_add(1) >= n_obs {
            return Err(BcpError::invalid_specification(format!(
                "K={k} breaks need at least K+2 observations to separate segments (K >= N-1 with N={n_obs})"
            )));
        }
        let m = self.break_prior.min_segment_len();
        let required = min_series_len(k, m);
        if n_obs < required || break_bounds(n_obs, m).is_none() {
            return Err(BcpError::invalid_specification(format!(
                "K={k} breaks with min_segment_len={m} need at least {required} observations, got N={n_obs}"
            )));
        }

        let n_segments = k + 1;
        let segment_priors = match self.segment_priors.len() {
            1 => vec![self.segment_priors[0]; n_segments],
            len if len == n_segments => self.segment_priors,
            len => {
                return Err(BcpError::invalid_specification(format!(
                    "per-segment priors must list K+1={n_segments} entries, got {len}"
                )));
            }
        };
        for (segment, prior) in segment_priors.iter().enumerate() {
            prior.validate(segment)?;
        }

        let mut seen = BTreeSet::new();
        for covariate in &self.covariates {
            if covariate.feature.is_empty() {
                return Err(BcpError::invalid_specification(
                    "covariate feature name must be non-empty",
                ));
            }
            if !seen.insert(covariate.feature.as_str()) {
                return Err(BcpError::invalid_specification(format!(
                    "covariate feature '{}' declared more than once",
                    covariate.feature
                )));
            }
            covariate
                .prior
                .validate(&format!("covariate '{}'", covariate.feature))?;
        }

        if !self.covariates.is_empty() {
            let Some(table) = covariates else {
                return Err(BcpError::invalid_specification(format!(
                    "covariate feature '{}' declared but no event covariate rows were supplied",
                    self.covariates[0].feature
                )));
            };
            if table.n() != n_obs {
                return Err(BcpError::invalid_input(format!(
                    "covariate table covers {} observations, expected {n_obs}",
                    table.n()
                )));
            }
            if let Some(missing) = self
                .covariates
                .iter()
                .find(|covariate| table.column(&covariate.feature).is_none())
            {
                return Err(BcpError::invalid_specification(format!(
                    "covariate feature '{}' is absent from the event covariate rows",
                    missing.feature
                )));
            }
        }

        let name = self.name.unwrap_or_else(|| {
            if self.covariates.is_empty() {
                format!("k{k}")
            } else {
                format!("k{k}_events")
            }
        });

        Ok(ChangePointSpec {
            name,
            n_breaks: k,
            n_obs,
            break_prior: self.break_prior,
            segment_priors,
            covariates: self.covariates,
            sharing: self.sharing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ChangePointSpec;
    use crate::priors::{CoefficientSharing, NormalPrior, ScalePrior, SegmentPrior};
    use bcp_core::{BcpError, CovariateTable};

    fn table(n: usize, names: &[&str]) -> CovariateTable {
        CovariateTable::from_columns(
            n,
            names
                .iter()
                .map(|name| ((*name).to_string(), vec![0.0; n]))
                .collect(),
        )
        .expect("columns should be valid")
    }

    #[test]
    fn nine_breaks_on_ten_observations_is_invalid() {
        let err = ChangePointSpec::builder(9)
            .build(10, None)
            .expect_err("K=9, N=10 should fail");
        assert!(matches!(err, BcpError::InvalidSpecification(_)));
        assert!(err.to_string().contains("K >= N-1"));
    }

    #[test]
    fn smallest_admissible_series_builds() {
        let spec = ChangePointSpec::builder(8)
            .build(10, None)
            .expect("K=8, N=10 should build");
        assert_eq!(spec.n_segments(), 9);
        assert_eq!(spec.break_bounds(), (1, 8));
    }

    #[test]
    fn zero_breaks_is_invalid() {
        assert!(matches!(
            ChangePointSpec::builder(0).build(100, None),
            Err(BcpError::InvalidSpecification(_))
        ));
    }

    #[test]
    fn min_segment_len_tightens_required_length() {
        let err = ChangePointSpec::builder(3)
            .min_segment_len(5)
            .build(19, None)
            .expect_err("3 breaks of length 5 need 20 observations");
        assert!(err.to_string().contains("need at least 20"));
        ChangePointSpec::builder(3)
            .min_segment_len(5)
            .build(20, None)
            .expect("20 observations should be enough");
    }

    #[test]
    fn broadcast_segment_prior_fills_every_segment() {
        let prior = SegmentPrior {
            mean: NormalPrior::new(0.0, 0.1),
            scale: ScalePrior::HalfNormal { sd: 0.1 },
        };
        let spec = ChangePointSpec::builder(4)
            .segment_priors(prior)
            .build(50, None)
            .expect("spec should build");
        assert_eq!(spec.segment_priors(), &[prior; 5]);
    }

    #[test]
    fn per_segment_priors_must_match_segment_count() {
        let err = ChangePointSpec::builder(2)
            .per_segment_priors(vec![SegmentPrior::default(); 2])
            .build(50, None)
            .expect_err("two priors for three segments should fail");
        assert!(err.to_string().contains("K+1=3"));
    }

    #[test]
    fn non_positive_prior_scale_is_invalid() {
        let err = ChangePointSpec::builder(1)
            .segment_priors(SegmentPrior {
                mean: NormalPrior::new(0.0, -1.0),
                scale: ScalePrior::default(),
            })
            .build(50, None)
            .expect_err("negative sd should fail");
        assert!(matches!(err, BcpError::InvalidSpecification(_)));

        let err = ChangePointSpec::builder(1)
            .covariate("war_30", NormalPrior::new(0.0, 0.0))
            .build(50, Some(&table(50, &["war_30"])))
            .expect_err("zero coefficient sd should fail");
        assert!(err.to_string().contains("covariate 'war_30'"));
    }

    #[test]
    fn declared_covariate_must_exist_in_rows() {
        let err = ChangePointSpec::builder(1)
            .covariate("opec_30", NormalPrior::default())
            .build(40, Some(&table(40, &["war_30"])))
            .expect_err("missing feature should fail");
        assert!(matches!(err, BcpError::InvalidSpecification(_)));
        assert!(err.to_string().contains("'opec_30' is absent"));

        let err = ChangePointSpec::builder(1)
            .covariate("opec_30", NormalPrior::default())
            .build(40, None)
            .expect_err("no rows should fail");
        assert!(matches!(err, BcpError::InvalidSpecification(_)));
    }

    #[test]
    fn duplicate_covariate_is_invalid() {
        let err = ChangePointSpec::builder(1)
            .covariate("war_30", NormalPrior::default())
            .covariate("war_30", NormalPrior::default())
            .build(40, Some(&table(40, &["war_30"])))
            .expect_err("duplicate feature should fail");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn coefficient_index_follows_sharing() {
        let names = ["a", "b"];
        let shared = ChangePointSpec::builder(2)
            .covariate("a", NormalPrior::default())
            .covariate("b", NormalPrior::default())
            .build(30, Some(&table(30, &names)))
            .expect("shared spec should build");
        assert_eq!(shared.n_coefficients(), 2);
        assert_eq!(shared.coefficient_index(2, 1), 1);

        let per_segment = ChangePointSpec::builder(2)
            .covariate("a", NormalPrior::default())
            .covariate("b", NormalPrior::default())
            .sharing(CoefficientSharing::PerSegment)
            .build(30, Some(&table(30, &names)))
            .expect("per-segment spec should build");
        assert_eq!(per_segment.n_coefficients(), 6);
        assert_eq!(per_segment.coefficient_index(2, 1), 5);
    }

    #[test]
    fn default_name_reflects_covariates() {
        let plain = ChangePointSpec::builder(2)
            .build(30, None)
            .expect("spec should build");
        assert_eq!(plain.name(), "k2");
        let named = ChangePointSpec::builder(2)
            .name("baseline")
            .build(30, None)
            .expect("spec should build");
        assert_eq!(named.name(), "baseline");
    }
}
