// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::rhat::{common_length, variance_components};

/// Biased (divide by `n`) autocovariance of `values` at `lag` around `mean`.
fn autocovariance_at(values: &[f64], mean: f64, lag: usize) -> f64 {
    let n = values.len();
    values[..n - lag]
        .iter()
        .zip(&values[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum::<f64>()
        / n as f64
}

/// Multi-chain effective sample size with Geyer's initial monotone sequence.
///
/// Chains are truncated to a common length. The estimate is capped at the raw
/// draw count. Returns `None` when fewer than 4 draws are available or the
/// parameter has no posterior variance.
pub fn effective_sample_size(chains: &[Vec<f64>]) -> Option<f64> {
    if chains.is_empty() {
        return None;
    }
    let n = common_length(chains);
    if n < 4 {
        return None;
    }
    if chains.iter().any(|chain| chain[..n].iter().any(|v| !v.is_finite())) {
        return None;
    }
    let m = chains.len();
    let n_f = n as f64;
    let total = (m * n) as f64;

    let (w, b, means) = variance_components(chains, n);
    let var_plus = if m > 1 {
        (n_f - 1.0) / n_f * w + b / n_f
    } else {
        (n_f - 1.0) / n_f * w
    };
    if w <= 0.0 || var_plus <= 0.0 {
        return None;
    }

    let rho = |lag: usize| -> f64 {
        if lag == 0 {
            return 1.0;
        }
        let mean_acov = chains
            .iter()
            .zip(&means)
            .map(|(chain, &mean)| autocovariance_at(&chain[..n], mean, lag))
            .sum::<f64>()
            / m as f64;
        1.0 - (w - mean_acov) / var_plus
    };

    // Geyer: sum positive pair sums, forced non-increasing.
    let mut tau_sum = 0.0;
    let mut previous_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let mut pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        if pair > previous_pair {
            pair = previous_pair;
        }
        tau_sum += pair;
        previous_pair = pair;
        lag += 2;
    }

    let tau = (2.0 * tau_sum - 1.0).max(1.0 / total.log10().max(1.0));
    Some((total / tau).min(total))
}
