// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, mean_and_variance};
use bcp_sampler::{PointwiseLogLik, Trace};

/// Posterior variance of a pointwise log-likelihood above which the WAIC
/// approximation is considered unreliable for that observation.
pub const HIGH_VARIANCE_THRESHOLD: f64 = 0.4;

/// Widely-applicable information criterion on the deviance scale.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Waic {
    /// Expected log pointwise predictive density, `lppd - p_waic`.
    pub elpd: f64,
    /// Effective number of parameters, summed posterior variances.
    pub p_waic: f64,
    /// `-2 * elpd`; lower is better.
    pub waic: f64,
    /// Standard error of `waic`.
    pub se: f64,
    /// Per-observation `-2 * elpd_i`.
    pub pointwise: Vec<f64>,
    pub n_obs: usize,
    pub n_draws: usize,
    pub high_variance_points: usize,
}

impl Waic {
    pub fn from_pointwise(pointwise: &PointwiseLogLik) -> Result<Self, BcpError> {
        let n_obs = pointwise.n_obs();
        let n_draws = pointwise.n_draws();
        if n_obs == 0 {
            return Err(BcpError::invalid_input("WAIC requires at least one observation"));
        }
        if n_draws < 2 {
            return Err(BcpError::invalid_input(format!(
                "WAIC requires at least 2 posterior draws, got {n_draws}"
            )));
        }

        let mut elpd = 0.0;
        let mut p_waic = 0.0;
        let mut high_variance_points = 0;
        let mut terms = Vec::with_capacity(n_obs);
        for i in 0..n_obs {
            let lppd = pointwise.lppd(i);
            let variance = pointwise.variance(i);
            if !lppd.is_finite() || !variance.is_finite() {
                return Err(BcpError::numerical_issue(format!(
                    "pointwise WAIC term {i} is not finite (lppd={lppd}, variance={variance})"
                )));
            }
            if variance > HIGH_VARIANCE_THRESHOLD {
                high_variance_points += 1;
            }
            elpd += lppd - variance;
            p_waic += variance;
            terms.push(-2.0 * (lppd - variance));
        }

        Ok(Self {
            elpd,
            p_waic,
            waic: -2.0 * elpd,
            se: standard_error_of_sum(&terms),
            pointwise: terms,
            n_obs,
            n_draws,
            high_variance_points,
        })
    }
}

/// `sqrt(n * var(terms))`, the standard error of `sum(terms)`.
pub(crate) fn standard_error_of_sum(terms: &[f64]) -> f64 {
    if terms.len() < 2 {
        return 0.0;
    }
    let (_, variance) = mean_and_variance(terms);
    (terms.len() as f64 * variance).sqrt()
}

/// WAIC of a fitted trace.
pub fn waic(trace: &Trace) -> Result<Waic, BcpError> {
    let result = Waic::from_pointwise(trace.pointwise())?;
    if result.high_variance_points > 0 {
        tracing::warn!(
            spec = trace.spec_name(),
            points = result.high_variance_points,
            threshold = HIGH_VARIANCE_THRESHOLD,
            "WAIC pointwise variance is high; estimate may be unreliable"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::{Waic, standard_error_of_sum};
    use bcp_sampler::PointwiseLogLik;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "actual={actual}, expected={expected}, tol={tol}"
        );
    }

    #[test]
    fn waic_matches_hand_computed_terms() {
        let draws = [[-1.0, -2.0], [-1.2, -1.0], [-0.8, -3.0]];
        let mut acc = PointwiseLogLik::new(2);
        for draw in draws {
            acc.push(&draw).expect("lengths match");
        }
        let result = Waic::from_pointwise(&acc).expect("waic should compute");

        let mut elpd = 0.0;
        let mut p = 0.0;
        for i in 0..2 {
            let column: Vec<f64> = draws.iter().map(|row| row[i]).collect();
            let lppd = (column.iter().map(|v| v.exp()).sum::<f64>() / 3.0).ln();
            let mean = column.iter().sum::<f64>() / 3.0;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 2.0;
            elpd += lppd - var;
            p += var;
        }
        assert_close(result.elpd, elpd, 1e-12);
        assert_close(result.p_waic, p, 1e-12);
        assert_close(result.waic, -2.0 * elpd, 1e-12);
        assert_close(result.pointwise.iter().sum::<f64>(), result.waic, 1e-12);
        assert_eq!(result.high_variance_points, 1);
        assert_eq!(result.n_draws, 3);
    }

    #[test]
    fn waic_requires_two_draws() {
        let mut acc = PointwiseLogLik::new(3);
        assert!(Waic::from_pointwise(&acc).is_err());
        acc.push(&[-1.0, -1.0, -1.0]).expect("lengths match");
        assert!(Waic::from_pointwise(&acc).is_err());
    }

    #[test]
    fn constant_pointwise_terms_have_zero_standard_error() {
        assert_eq!(standard_error_of_sum(&[2.0, 2.0, 2.0]), 0.0);
        assert_close(standard_error_of_sum(&[1.0, 3.0]), 2.0, 1e-12);
    }
}
