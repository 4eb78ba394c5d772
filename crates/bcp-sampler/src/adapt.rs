// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Robbins-Monro adaptation of a proposal scale toward a target acceptance rate.
///
/// Works on `ln(scale)` with a `t^-0.6` gain, so the adaptation vanishes
/// over warm-up. Frozen once warm-up ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct AdaptiveScale {
    log_scale: f64,
    min: f64,
    max: f64,
    target: f64,
    updates: u64,
}

impl AdaptiveScale {
    pub(crate) fn new(initial: f64, min: f64, max: f64, target: f64) -> Self {
        let initial = initial.clamp(min, max);
        Self {
            log_scale: initial.ln(),
            min,
            max,
            target,
            updates: 0,
        }
    }

    pub(crate) fn scale(&self) -> f64 {
        self.log_scale.exp()
    }

    pub(crate) fn update(&mut self, accepted: bool) {
        self.updates += 1;
        let gain = (self.updates as f64).powf(-0.6);
        let observed = if accepted { 1.0 } else { 0.0 };
        self.log_scale = (self.log_scale + gain * (observed - self.target))
            .clamp(self.min.ln(), self.max.ln());
    }
}
