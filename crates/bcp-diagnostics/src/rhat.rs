// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::mean_and_variance;

/// Potential-scale-reduction factor, or the reason it could not be computed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum Rhat {
    Value { value: f64 },
    NotComputable { reason: String },
}

impl Rhat {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value { value } => Some(*value),
            Self::NotComputable { .. } => None,
        }
    }

    fn not_computable(reason: impl Into<String>) -> Self {
        Self::NotComputable {
            reason: reason.into(),
        }
    }
}

/// Length every chain is truncated to so between/within variances line up.
pub(crate) fn common_length(chains: &[Vec<f64>]) -> usize {
    chains.iter().map(Vec::len).min().unwrap_or(0)
}

/// Between-chain and within-chain variance of chains truncated to `n` draws.
///
/// Returns `(w, b, chain_means)` where `b` is `n` times the variance of the
/// chain means.
pub(crate) fn variance_components(chains: &[Vec<f64>], n: usize) -> (f64, f64, Vec<f64>) {
    let mut means = Vec::with_capacity(chains.len());
    let mut within = 0.0;
    for chain in chains {
        let (mean, variance) = mean_and_variance(&chain[..n]);
        means.push(mean);
        within += variance;
    }
    let w = within / chains.len() as f64;
    let b = if chains.len() > 1 {
        let (_, var_of_means) = mean_and_variance(&means);
        n as f64 * var_of_means
    } else {
        0.0
    };
    (w, b, means)
}

/// Classic Gelman-Rubin R-hat over equal-length chains.
///
/// A single chain, fewer than two draws, or chains stuck at distinct constants
/// yield [`Rhat::NotComputable`]. Chains stuck at one shared constant agree
/// exactly and report `1.0`.
pub fn rhat(chains: &[Vec<f64>]) -> Rhat {
    if chains.len() < 2 {
        return Rhat::not_computable(format!(
            "requires at least 2 chains, got {}",
            chains.len()
        ));
    }
    let n = common_length(chains);
    if n < 2 {
        return Rhat::not_computable(format!("requires at least 2 draws per chain, got {n}"));
    }
    if chains.iter().any(|chain| chain[..n].iter().any(|v| !v.is_finite())) {
        return Rhat::not_computable("chains contain non-finite draws");
    }

    let (w, b, _) = variance_components(chains, n);
    if w == 0.0 {
        return if b == 0.0 {
            Rhat::Value { value: 1.0 }
        } else {
            Rhat::not_computable("chains are constant at different values")
        };
    }

    let n_f = n as f64;
    let var_plus = (n_f - 1.0) / n_f * w + b / n_f;
    Rhat::Value {
        value: (var_plus / w).sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Rhat, rhat};

    #[test]
    fn single_chain_is_not_computable() {
        let result = rhat(&[vec![1.0, 2.0, 3.0]]);
        let Rhat::NotComputable { reason } = result else {
            panic!("single chain should not produce a value");
        };
        assert!(reason.contains("2 chains"));
    }

    #[test]
    fn too_few_draws_is_not_computable() {
        assert!(rhat(&[vec![1.0], vec![2.0, 3.0]]).value().is_none());
    }

    #[test]
    fn identical_mixing_chains_are_near_one() {
        let a: Vec<f64> = (0..200).map(|i| ((i * 37) % 17) as f64).collect();
        let b: Vec<f64> = (0..200).map(|i| ((i * 53 + 5) % 17) as f64).collect();
        let value = rhat(&[a, b]).value().expect("value should be computable");
        assert!((value - 1.0).abs() < 0.02, "rhat={value}");
    }

    #[test]
    fn separated_chains_exceed_threshold() {
        let a: Vec<f64> = (0..100).map(|i| (i % 5) as f64).collect();
        let b: Vec<f64> = (0..100).map(|i| 10.0 + (i % 5) as f64).collect();
        let value = rhat(&[a, b]).value().expect("value should be computable");
        assert!(value > 2.0, "rhat={value}");
    }

    #[test]
    fn constant_chains_distinguish_agreement_from_disagreement() {
        assert_eq!(
            rhat(&[vec![4.0; 10], vec![4.0; 10]]),
            Rhat::Value { value: 1.0 }
        );
        assert!(rhat(&[vec![4.0; 10], vec![5.0; 10]]).value().is_none());
    }

    #[test]
    fn unequal_chains_are_truncated_to_common_length() {
        let a = vec![0.0, 1.0, 0.0, 1.0];
        let b = vec![1.0, 0.0, 1.0, 0.0, 100.0, -100.0];
        let truncated = rhat(&[a.clone(), b[..4].to_vec()]);
        assert_eq!(rhat(&[a, b]), truncated);
    }
}
