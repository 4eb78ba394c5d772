// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Location and noise scale of one segment.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentParams {
    pub mean: f64,
    pub sigma: f64,
}

/// One point in parameter space: ordered breaks, `K+1` segments and the
/// covariate coefficients laid out by [`crate::ChangePointSpec::coefficient_index`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ModelState {
    pub breaks: Vec<usize>,
    pub segments: Vec<SegmentParams>,
    pub coefficients: Vec<f64>,
}

impl ModelState {
    /// First non-finite continuous parameter, by layout name.
    pub fn first_non_finite(&self) -> Option<String> {
        for (j, segment) in self.segments.iter().enumerate() {
            if !segment.mean.is_finite() {
                return Some(format!("mu[{j}]={}", segment.mean));
            }
            if !segment.sigma.is_finite() || segment.sigma <= 0.0 {
                return Some(format!("sigma[{j}]={}", segment.sigma));
            }
        }
        self.coefficients
            .iter()
            .position(|value| !value.is_finite())
            .map(|idx| format!("coefficient[{idx}]={}", self.coefficients[idx]))
    }
}
