// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// `ln(2 * pi)`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Numerically stable `ln(exp(a) + exp(b))`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Numerically stable `ln(sum(exp(values)))`.
///
/// Returns `-inf` for an empty slice or when every entry is `-inf`, and NaN
/// when any entry is NaN.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let mut max = f64::NEG_INFINITY;
    for &value in values {
        if value.is_nan() {
            return f64::NAN;
        }
        if value > max {
            max = value;
        }
    }

    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }

    let sum: f64 = values.iter().map(|value| (value - max).exp()).sum();
    max + sum.ln()
}

/// Log-density of `Normal(mean, sd)` at `x`.
pub fn normal_log_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    let z = (x - mean) / sd;
    -0.5 * (LN_2PI + z * z) - sd.ln()
}

/// Mean and unbiased sample variance; variance is zero for fewer than two values.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }

    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (idx, &value) in values.iter().enumerate() {
        let delta = value - mean;
        mean += delta / (idx + 1) as f64;
        m2 += delta * (value - mean);
    }

    let variance = if values.len() > 1 {
        m2 / (values.len() - 1) as f64
    } else {
        0.0
    };
    (mean, variance)
}

/// Linear-interpolated quantile of already sorted values, `q` in `[0, 1]`.
pub fn sorted_quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !q.is_finite() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}
