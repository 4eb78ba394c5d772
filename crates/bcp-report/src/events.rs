// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;
use bcp_sampler::Trace;

/// An externally supplied event placed on the observation time axis.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DatedEvent {
    pub time_index: usize,
    pub label: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub category: Option<String>,
}

/// Posterior association between one event and the sampled breaks.
///
/// This is temporal proximity only; no causal effect is implied.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EventAssociation {
    pub label: String,
    pub category: Option<String>,
    pub time_index: usize,
    /// Share of draws with at least one break within `window` of the event.
    pub probability: f64,
    /// Break whose posterior median lies closest to the event.
    pub nearest_break: usize,
    pub distance: usize,
    pub window: usize,
}

/// Scores every event by how often sampled breaks fall within `window` of it.
pub fn associate_events(
    trace: &Trace,
    events: &[DatedEvent],
    window: usize,
) -> Result<Vec<EventAssociation>, BcpError> {
    let n_draws = trace.total_draws();
    if n_draws == 0 {
        return Err(BcpError::invalid_input(format!(
            "trace '{}' holds no draws to associate events with",
            trace.spec_name()
        )));
    }
    if let Some(event) = events.iter().find(|e| e.time_index >= trace.n_obs()) {
        return Err(BcpError::invalid_input(format!(
            "event '{}' at time_index={} is outside the series of length {}",
            event.label,
            event.time_index,
            trace.n_obs()
        )));
    }

    let medians: Vec<usize> = (0..trace.n_breaks())
        .map(|k| {
            let mut draws: Vec<usize> = trace.samples().map(|s| s.breaks()[k]).collect();
            draws.sort_unstable();
            draws[(draws.len() - 1) / 2]
        })
        .collect();

    let associations = events
        .iter()
        .map(|event| {
            let t = event.time_index;
            let hits = trace
                .samples()
                .filter(|sample| sample.breaks().iter().any(|b| b.abs_diff(t) <= window))
                .count();
            let (nearest_break, distance) = medians
                .iter()
                .enumerate()
                .map(|(k, m)| (k, m.abs_diff(t)))
                .min_by_key(|&(_, d)| d)
                .unwrap_or((0, usize::MAX));
            EventAssociation {
                label: event.label.clone(),
                category: event.category.clone(),
                time_index: t,
                probability: hits as f64 / n_draws as f64,
                nearest_break,
                distance,
                window,
            }
        })
        .collect();
    Ok(associations)
}
