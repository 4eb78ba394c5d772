// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::hdi::{Interval, PosteriorStat, hdi_sorted, validate_prob};
use bcp_core::{BcpError, segment_of, segment_ranges};
use bcp_model::{ChangePointSpec, ParamKind};
use bcp_sampler::Trace;
use std::collections::BTreeMap;

/// Which point estimate of a break location drives segment bounds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BreakEstimate {
    #[default]
    Median,
    Mode,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryConfig {
    pub hdi_prob: f64,
    pub break_estimate: BreakEstimate,
    /// Half-width, in observations, of the event association window.
    pub event_window: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            hdi_prob: 0.94,
            break_estimate: BreakEstimate::Median,
            event_window: 30,
        }
    }
}

impl SummaryConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        validate_prob(self.hdi_prob)
            .map_err(|_| BcpError::invalid_input(format!(
                "SummaryConfig.hdi_prob must be in (0, 1]; got {}",
                self.hdi_prob
            )))
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BreakSummary {
    pub id: usize,
    /// Point estimate per [`SummaryConfig::break_estimate`], used for segment bounds.
    pub time_index: usize,
    pub median: usize,
    pub mode: usize,
    pub mean: f64,
    pub hdi: Interval,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentSummary {
    pub id: usize,
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    pub len: usize,
    pub mean: PosteriorStat,
    pub volatility: PosteriorStat,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CoefficientSummary {
    pub name: String,
    pub feature: String,
    /// `None` for coefficients shared across segments.
    pub segment: Option<usize>,
    pub stat: PosteriorStat,
    /// The credible interval excludes zero.
    pub significant: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PosteriorSummary {
    pub spec_name: String,
    pub n_obs: usize,
    pub n_draws: usize,
    pub hdi_prob: f64,
    pub breaks: Vec<BreakSummary>,
    pub segments: Vec<SegmentSummary>,
    pub coefficients: Vec<CoefficientSummary>,
    /// Segment id of every time index under the break point estimates.
    pub regime_path: Vec<usize>,
    pub warnings: Vec<String>,
}

fn lower_median(sorted: &[usize]) -> usize {
    sorted[(sorted.len() - 1) / 2]
}

/// Most frequent value; ties go to the smallest index.
fn mode(sorted: &[usize]) -> usize {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &value in sorted {
        *counts.entry(value).or_default() += 1;
    }
    let mut best = (sorted[0], 0);
    for (value, count) in counts {
        if count > best.1 {
            best = (value, count);
        }
    }
    best.0
}

/// Summarizes break locations, segment parameters and coefficients of `trace`.
pub fn summarize(
    spec: &ChangePointSpec,
    trace: &Trace,
    config: &SummaryConfig,
) -> Result<PosteriorSummary, BcpError> {
    config.validate()?;
    if trace.spec_name() != spec.name() || trace.n_breaks() != spec.n_breaks() {
        return Err(BcpError::invalid_input(format!(
            "trace of '{}' (K={}) does not belong to specification '{}' (K={})",
            trace.spec_name(),
            trace.n_breaks(),
            spec.name(),
            spec.n_breaks()
        )));
    }
    let n_draws = trace.total_draws();
    if n_draws == 0 {
        return Err(BcpError::invalid_input(format!(
            "trace '{}' holds no draws to summarize",
            trace.spec_name()
        )));
    }

    let prob = config.hdi_prob;
    let mut warnings = vec![];
    if !trace.is_complete() {
        warnings.push("summary computed from an incomplete trace".to_string());
    }

    let mut breaks = Vec::with_capacity(spec.n_breaks());
    for k in 0..spec.n_breaks() {
        let mut draws: Vec<usize> = trace.samples().map(|sample| sample.breaks()[k]).collect();
        draws.sort_unstable();
        let as_f64: Vec<f64> = draws.iter().map(|&b| b as f64).collect();
        let median = lower_median(&draws);
        let mode = mode(&draws);
        breaks.push(BreakSummary {
            id: k,
            time_index: match config.break_estimate {
                BreakEstimate::Median => median,
                BreakEstimate::Mode => mode,
            },
            median,
            mode,
            mean: as_f64.iter().sum::<f64>() / as_f64.len() as f64,
            hdi: hdi_sorted(&as_f64, prob),
        });
    }

    // Componentwise modes need not be ordered; nudge to keep segments non-empty.
    for k in 1..breaks.len() {
        let floor = breaks[k - 1].time_index + 1;
        if breaks[k].time_index < floor {
            warnings.push(format!(
                "break[{k}] estimate {} moved to {floor} to keep segments ordered",
                breaks[k].time_index
            ));
            breaks[k].time_index = floor;
        }
    }
    let estimates: Vec<usize> = breaks.iter().map(|b| b.time_index).collect();
    if estimates.last().is_some_and(|&last| last >= trace.n_obs()) {
        return Err(BcpError::numerical_issue(format!(
            "break estimates {estimates:?} leave no room in a series of length {}",
            trace.n_obs()
        )));
    }

    let layout = trace.layout();
    let mut means = BTreeMap::new();
    let mut scales = BTreeMap::new();
    let mut coefficients = vec![];
    for (idx, kind) in layout.kinds().iter().enumerate() {
        match *kind {
            ParamKind::Break { .. } => {}
            ParamKind::SegmentMean { segment } => {
                means.insert(segment, PosteriorStat::from_draws(&trace.pooled_draws(idx), prob)?);
            }
            ParamKind::SegmentScale { segment } => {
                scales.insert(segment, PosteriorStat::from_draws(&trace.pooled_draws(idx), prob)?);
            }
            ParamKind::Coefficient { segment, feature } => {
                let stat = PosteriorStat::from_draws(&trace.pooled_draws(idx), prob)?;
                coefficients.push(CoefficientSummary {
                    name: layout.names()[idx].clone(),
                    feature: spec.covariates()[feature].feature.clone(),
                    segment,
                    significant: stat.hdi.excludes_zero(),
                    stat,
                });
            }
        }
    }

    let segments = segment_ranges(trace.n_obs(), &estimates)
        .into_iter()
        .enumerate()
        .map(|(id, range)| {
            let mean = means.get(&id).copied();
            let volatility = scales.get(&id).copied();
            match (mean, volatility) {
                (Some(mean), Some(volatility)) => Ok(SegmentSummary {
                    id,
                    start: range.start,
                    end: range.end,
                    len: range.len(),
                    mean,
                    volatility,
                }),
                _ => Err(BcpError::invalid_input(format!(
                    "trace layout lacks parameters of segment {id}"
                ))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let regime_path = (0..trace.n_obs())
        .map(|t| segment_of(t, &estimates))
        .collect();

    Ok(PosteriorSummary {
        spec_name: trace.spec_name().to_string(),
        n_obs: trace.n_obs(),
        n_draws,
        hdi_prob: prob,
        breaks,
        segments,
        coefficients,
        regime_path,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::{SummaryConfig, lower_median, mode};

    #[test]
    fn mode_prefers_smallest_on_ties() {
        assert_eq!(mode(&[3, 3, 5, 5, 9]), 3);
        assert_eq!(mode(&[1, 4, 4, 4, 9]), 4);
    }

    #[test]
    fn lower_median_is_an_observed_value() {
        assert_eq!(lower_median(&[1, 2, 3, 4]), 2);
        assert_eq!(lower_median(&[7]), 7);
    }

    #[test]
    fn summary_config_rejects_bad_mass() {
        SummaryConfig::default()
            .validate()
            .expect("defaults should validate");
        assert!(
            SummaryConfig {
                hdi_prob: 0.0,
                ..SummaryConfig::default()
            }
            .validate()
            .is_err()
        );
    }
}
