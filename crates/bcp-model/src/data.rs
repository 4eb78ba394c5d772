// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::priors::CoefficientSharing;
use crate::spec::ChangePointSpec;
use bcp_core::{BcpError, CovariateTable, DataFingerprint, ObservationSet};

/// Observations and declared covariates bound to a specification.
///
/// Covariates are stored row-major (`n x p`) in declaration order so the
/// per-observation effect is a contiguous dot product.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelData {
    values: Vec<f64>,
    design: Vec<f64>,
    n_features: usize,
    sharing: CoefficientSharing,
    fingerprint: DataFingerprint,
}

impl ModelData {
    pub fn bind(
        spec: &ChangePointSpec,
        observations: &ObservationSet,
        covariates: Option<&CovariateTable>,
    ) -> Result<Self, BcpError> {
        let n = observations.len();
        if n != spec.n_obs() {
            return Err(BcpError::invalid_input(format!(
                "specification '{}' was built for N={}, observation set has {n}",
                spec.name(),
                spec.n_obs()
            )));
        }

        let p = spec.n_features();
        let mut design = vec![0.0; n * p];
        if p > 0 {
            let table = covariates.ok_or_else(|| {
                BcpError::invalid_specification(format!(
                    "specification '{}' declares {p} covariates but no event covariate rows were supplied",
                    spec.name()
                ))
            })?;
            if table.n() != n {
                return Err(BcpError::invalid_input(format!(
                    "covariate table covers {} observations, expected {n}",
                    table.n()
                )));
            }
            for (f, covariate) in spec.covariates().iter().enumerate() {
                let column = table.column(&covariate.feature).ok_or_else(|| {
                    BcpError::invalid_specification(format!(
                        "covariate feature '{}' is absent from the event covariate rows",
                        covariate.feature
                    ))
                })?;
                for (t, &value) in column.iter().enumerate() {
                    design[t * p + f] = value;
                }
            }
        }

        Ok(Self {
            values: observations.values().to_vec(),
            design,
            n_features: p,
            sharing: spec.sharing(),
            fingerprint: observations.fingerprint(),
        })
    }

    pub fn n(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, t: usize) -> f64 {
        self.values[t]
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn has_covariates(&self) -> bool {
        self.n_features > 0
    }

    pub fn sharing(&self) -> CoefficientSharing {
        self.sharing
    }

    /// Covariate row of observation `t`.
    pub fn row(&self, t: usize) -> &[f64] {
        &self.design[t * self.n_features..(t + 1) * self.n_features]
    }

    pub fn fingerprint(&self) -> DataFingerprint {
        self.fingerprint
    }

    /// Coefficients that apply to `segment`.
    pub fn segment_coefficients<'c>(&self, coefficients: &'c [f64], segment: usize) -> &'c [f64] {
        match self.sharing {
            CoefficientSharing::Shared => &coefficients[..self.n_features],
            CoefficientSharing::PerSegment => {
                let start = segment * self.n_features;
                &coefficients[start..start + self.n_features]
            }
        }
    }

    /// Linear covariate effect on observation `t` under `segment`'s coefficients.
    pub fn effect(&self, t: usize, segment: usize, coefficients: &[f64]) -> f64 {
        if self.n_features == 0 {
            return 0.0;
        }
        self.row(t)
            .iter()
            .zip(self.segment_coefficients(coefficients, segment))
            .map(|(x, beta)| x * beta)
            .sum()
    }
}
