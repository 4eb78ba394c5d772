// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, log_add_exp};

/// Running per-observation summaries of the log-likelihood over retained draws.
///
/// Keeps `ln sum_s exp(ll[s, i])` together with a Welford mean/M2 so the
/// predictive criterion can be computed without the draws or the data.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PointwiseLogLik {
    n_draws: usize,
    log_sum_exp: Vec<f64>,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl PointwiseLogLik {
    pub fn new(n_obs: usize) -> Self {
        Self {
            n_draws: 0,
            log_sum_exp: vec![f64::NEG_INFINITY; n_obs],
            mean: vec![0.0; n_obs],
            m2: vec![0.0; n_obs],
        }
    }

    pub fn n_obs(&self) -> usize {
        self.mean.len()
    }

    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    /// Adds one draw's pointwise log-likelihood.
    pub fn push(&mut self, draw: &[f64]) -> Result<(), BcpError> {
        if draw.len() != self.n_obs() {
            return Err(BcpError::invalid_input(format!(
                "pointwise draw has length {}, expected {}",
                draw.len(),
                self.n_obs()
            )));
        }
        self.n_draws += 1;
        let count = self.n_draws as f64;
        for (i, &value) in draw.iter().enumerate() {
            self.log_sum_exp[i] = log_add_exp(self.log_sum_exp[i], value);
            let delta = value - self.mean[i];
            self.mean[i] += delta / count;
            self.m2[i] += delta * (value - self.mean[i]);
        }
        Ok(())
    }

    /// Folds another accumulator over the same observations into this one.
    pub fn merge(&mut self, other: &Self) -> Result<(), BcpError> {
        if other.n_obs() != self.n_obs() {
            return Err(BcpError::invalid_input(format!(
                "cannot merge pointwise accumulators over {} and {} observations",
                self.n_obs(),
                other.n_obs()
            )));
        }
        if other.n_draws == 0 {
            return Ok(());
        }
        if self.n_draws == 0 {
            *self = other.clone();
            return Ok(());
        }

        let na = self.n_draws as f64;
        let nb = other.n_draws as f64;
        let total = na + nb;
        for i in 0..self.n_obs() {
            let delta = other.mean[i] - self.mean[i];
            self.mean[i] += delta * nb / total;
            self.m2[i] += other.m2[i] + delta * delta * na * nb / total;
            self.log_sum_exp[i] = log_add_exp(self.log_sum_exp[i], other.log_sum_exp[i]);
        }
        self.n_draws += other.n_draws;
        Ok(())
    }

    /// Log pointwise predictive density `ln mean_s exp(ll[s, i])`.
    pub fn lppd(&self, i: usize) -> f64 {
        if self.n_draws == 0 {
            return f64::NAN;
        }
        self.log_sum_exp[i] - (self.n_draws as f64).ln()
    }

    /// Posterior sample variance of `ll[., i]`.
    pub fn variance(&self, i: usize) -> f64 {
        if self.n_draws < 2 {
            return f64::NAN;
        }
        self.m2[i] / (self.n_draws - 1) as f64
    }

    pub fn mean(&self, i: usize) -> f64 {
        self.mean[i]
    }
}

#[cfg(test)]
mod tests {
    use super::PointwiseLogLik;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "actual={actual}, expected={expected}, tol={tol}"
        );
    }

    const DRAWS: [[f64; 2]; 5] = [
        [-1.0, -2.0],
        [-1.5, -0.5],
        [-0.2, -3.0],
        [-2.2, -1.1],
        [-0.9, -0.7],
    ];

    fn naive(column: usize) -> (f64, f64) {
        let values: Vec<f64> = DRAWS.iter().map(|row| row[column]).collect();
        let s = values.len() as f64;
        let lppd = (values.iter().map(|v| v.exp()).sum::<f64>() / s).ln();
        let mean = values.iter().sum::<f64>() / s;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (s - 1.0);
        (lppd, var)
    }

    #[test]
    fn online_summaries_match_naive_computation() {
        let mut acc = PointwiseLogLik::new(2);
        for draw in DRAWS {
            acc.push(&draw).expect("lengths match");
        }
        for i in 0..2 {
            let (lppd, var) = naive(i);
            assert_close(acc.lppd(i), lppd, 1e-12);
            assert_close(acc.variance(i), var, 1e-12);
        }
    }

    #[test]
    fn merged_accumulators_match_single_pass() {
        let mut left = PointwiseLogLik::new(2);
        let mut right = PointwiseLogLik::new(2);
        for draw in &DRAWS[..2] {
            left.push(draw).expect("lengths match");
        }
        for draw in &DRAWS[2..] {
            right.push(draw).expect("lengths match");
        }
        left.merge(&right).expect("same observations");
        assert_eq!(left.n_draws(), 5);
        for i in 0..2 {
            let (lppd, var) = naive(i);
            assert_close(left.lppd(i), lppd, 1e-12);
            assert_close(left.variance(i), var, 1e-12);
        }
    }

    #[test]
    fn merge_into_empty_and_length_mismatch() {
        let mut empty = PointwiseLogLik::new(2);
        let mut one = PointwiseLogLik::new(2);
        one.push(&[-1.0, -1.0]).expect("lengths match");
        empty.merge(&one).expect("same observations");
        assert_eq!(empty, one);
        assert!(empty.variance(0).is_nan());

        assert!(one.push(&[0.0]).is_err());
        assert!(one.merge(&PointwiseLogLik::new(3)).is_err());
    }
}
