// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, LN_2PI, normal_log_pdf};

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_7e-7,
];

/// Normal prior on a location parameter.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalPrior {
    pub mean: f64,
    pub sd: f64,
}

impl NormalPrior {
    pub const fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd }
    }

    /// `Normal(0, 1)`: wide relative to daily log-returns.
    pub const fn weakly_informative() -> Self {
        Self { mean: 0.0, sd: 1.0 }
    }

    pub fn precision(&self) -> f64 {
        1.0 / (self.sd * self.sd)
    }

    pub fn log_density(&self, x: f64) -> f64 {
        normal_log_pdf(x, self.mean, self.sd)
    }

    pub(crate) fn validate(&self, what: &str) -> Result<(), BcpError> {
        if !self.mean.is_finite() {
            return Err(BcpError::invalid_specification(format!(
                "{what} prior mean must be finite; got {}",
                self.mean
            )));
        }
        if !self.sd.is_finite() || self.sd <= 0.0 {
            return Err(BcpError::invalid_specification(format!(
                "{what} prior sd must be finite and > 0; got {}",
                self.sd
            )));
        }
        Ok(())
    }
}

impl Default for NormalPrior {
    fn default() -> Self {
        Self::weakly_informative()
    }
}

/// Prior on a segment's noise scale.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "family", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalePrior {
    /// Inverse-gamma on the variance; conjugate to the Normal likelihood.
    InverseGamma { shape: f64, rate: f64 },
    /// Half-normal on the standard deviation.
    HalfNormal { sd: f64 },
}

impl ScalePrior {
    /// `InverseGamma(2, 0.01)`: prior mean variance 0.01 with infinite variance.
    pub const fn weakly_informative() -> Self {
        Self::InverseGamma {
            shape: 2.0,
            rate: 0.01,
        }
    }

    pub fn is_conjugate(&self) -> bool {
        matches!(self, Self::InverseGamma { .. })
    }

    /// Log-density of the standard deviation `sigma` (including the Jacobian
    /// for priors stated on the variance).
    pub fn log_density_sigma(&self, sigma: f64) -> f64 {
        if sigma.is_nan() || sigma <= 0.0 {
            return f64::NEG_INFINITY;
        }
        match *self {
            Self::InverseGamma { shape, rate } => {
                let variance = sigma * sigma;
                shape * rate.ln() - ln_gamma(shape) - (shape + 1.0) * variance.ln()
                    - rate / variance
                    + (2.0 * sigma).ln()
            }
            Self::HalfNormal { sd } => {
                let z = sigma / sd;
                std::f64::consts::LN_2 - 0.5 * (LN_2PI + z * z) - sd.ln()
            }
        }
    }

    pub(crate) fn validate(&self, what: &str) -> Result<(), BcpError> {
        match *self {
            Self::InverseGamma { shape, rate } => {
                if !shape.is_finite() || shape <= 0.0 {
                    return Err(BcpError::invalid_specification(format!(
                        "{what} inverse-gamma shape must be finite and > 0; got {shape}"
                    )));
                }
                if !rate.is_finite() || rate <= 0.0 {
                    return Err(BcpError::invalid_specification(format!(
                        "{what} inverse-gamma rate must be finite and > 0; got {rate}"
                    )));
                }
            }
            Self::HalfNormal { sd } => {
                if !sd.is_finite() || sd <= 0.0 {
                    return Err(BcpError::invalid_specification(format!(
                        "{what} half-normal sd must be finite and > 0; got {sd}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for ScalePrior {
    fn default() -> Self {
        Self::weakly_informative()
    }
}

/// Mean and scale priors for one segment.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SegmentPrior {
    pub mean: NormalPrior,
    pub scale: ScalePrior,
}

impl SegmentPrior {
    pub(crate) fn validate(&self, segment: usize) -> Result<(), BcpError> {
        self.mean.validate(&format!("segment {segment} mean"))?;
        self.scale.validate(&format!("segment {segment} scale"))
    }
}

/// Prior over break locations.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "family", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakPrior {
    /// Discrete uniform over strictly increasing tuples whose segments hold
    /// at least `min_segment_len` observations.
    OrderedUniform { min_segment_len: usize },
}

impl BreakPrior {
    pub fn min_segment_len(&self) -> usize {
        match *self {
            Self::OrderedUniform { min_segment_len } => min_segment_len.max(1),
        }
    }
}

impl Default for BreakPrior {
    fn default() -> Self {
        Self::OrderedUniform { min_segment_len: 1 }
    }
}

/// Whether covariate coefficients are shared across segments.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoefficientSharing {
    #[default]
    Shared,
    PerSegment,
}

/// Log-gamma for `z > 0` via the Lanczos approximation.
pub(crate) fn ln_gamma(z: f64) -> f64 {
    if z < 0.5 {
        let sin_term = (std::f64::consts::PI * z).sin().abs();
        return std::f64::consts::PI.ln() - sin_term.ln() - ln_gamma(1.0 - z);
    }

    let shifted = z - 1.0;
    let mut x = LANCZOS_COEFFICIENTS[0];
    for (idx, coefficient) in LANCZOS_COEFFICIENTS.iter().copied().enumerate().skip(1) {
        x += coefficient / (shifted + idx as f64);
    }

    let t = shifted + LANCZOS_G + 0.5;
    0.5 * LN_2PI + (shifted + 0.5) * t.ln() - t + x.ln()
}
