// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Series preprocessing and event covariate construction.
//!
//! Converts raw prices into the stationary log-return series the sampler
//! models, and dated events into time-aligned covariate rows.

use bcp_core::{BcpError, EventCovariateRow, mean_and_variance};
use std::collections::BTreeMap;

/// Name of the recency column emitted by [`build_event_features`].
pub const DAYS_SINCE_LAST_EVENT: &str = "days_since_last_event";

/// Log-returns `ln(p[t+1] / p[t])` of a strictly positive price series.
pub fn log_returns(prices: &[f64]) -> Result<Vec<f64>, BcpError> {
    if prices.len() < 2 {
        return Err(BcpError::invalid_input(format!(
            "log_returns requires at least 2 prices, got {}",
            prices.len()
        )));
    }
    if let Some((idx, price)) = prices
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
        return Err(BcpError::invalid_input(format!(
            "price at index {idx} must be finite and > 0, got {price}"
        )));
    }

    Ok(prices
        .windows(2)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect())
}

/// Sample standard deviation of each trailing window of `window` values.
///
/// Entries before the window fills are `None`.
pub fn rolling_volatility(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, BcpError> {
    if window < 2 {
        return Err(BcpError::invalid_input(format!(
            "rolling_volatility window must be >= 2, got {window}"
        )));
    }
    if let Some((idx, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(BcpError::invalid_input(format!(
            "rolling_volatility value at index {idx} is non-finite: {value}"
        )));
    }

    Ok((0..values.len())
        .map(|t| {
            if t + 1 < window {
                return None;
            }
            let (_, variance) = mean_and_variance(&values[t + 1 - window..=t]);
            Some(variance.max(0.0).sqrt())
        })
        .collect())
}

/// A dated discrete event, already mapped onto the observation index.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub time_index: usize,
    pub category: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub high_impact: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct EventFeatureConfig {
    /// Trailing window, in observations, for rolling counts.
    pub window: usize,
    /// Categories that get a dedicated rolling-count column.
    pub categories: Vec<String>,
    /// Upper bound of the recency column; also used before the first event.
    pub recency_cap: usize,
    pub standardize: bool,
}

impl Default for EventFeatureConfig {
    fn default() -> Self {
        Self {
            window: 30,
            categories: vec![
                "war".to_string(),
                "opec".to_string(),
                "crisis".to_string(),
            ],
            recency_cap: 365,
            standardize: true,
        }
    }
}

impl EventFeatureConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.window == 0 {
            return Err(BcpError::invalid_input(
                "EventFeatureConfig.window must be >= 1",
            ));
        }
        if self.recency_cap == 0 {
            return Err(BcpError::invalid_input(
                "EventFeatureConfig.recency_cap must be >= 1",
            ));
        }
        for (idx, category) in self.categories.iter().enumerate() {
            let normalized = normalize_category(category);
            if normalized.is_empty() {
                return Err(BcpError::invalid_input(format!(
                    "EventFeatureConfig.categories[{idx}] must be non-empty"
                )));
            }
            if self.categories[..idx]
                .iter()
                .any(|other| normalize_category(other) == normalized)
            {
                return Err(BcpError::invalid_input(format!(
                    "EventFeatureConfig.categories contains duplicate category '{category}'"
                )));
            }
        }
        Ok(())
    }

    pub fn event_count_name(&self) -> String {
        format!("event_count_{}", self.window)
    }

    pub fn high_impact_name(&self) -> String {
        format!("high_impact_{}", self.window)
    }

    pub fn category_name(&self, category: &str) -> String {
        format!("{}_{}", normalize_category(category), self.window)
    }

    /// Column names in the order they are emitted.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec![self.event_count_name(), self.high_impact_name()];
        names.extend(self.categories.iter().map(|c| self.category_name(c)));
        names.push(DAYS_SINCE_LAST_EVENT.to_string());
        names
    }
}

fn normalize_category(category: &str) -> String {
    category.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Builds one covariate row per observation index from dated events.
///
/// Rolling counts cover the trailing window `(t - window, t]`. The recency
/// column counts steps since the latest event at or before `t`, capped at
/// `recency_cap`.
pub fn build_event_features(
    n: usize,
    events: &[EventRecord],
    config: &EventFeatureConfig,
) -> Result<Vec<EventCovariateRow>, BcpError> {
    config.validate()?;
    if n == 0 {
        return Err(BcpError::invalid_input(
            "build_event_features requires n >= 1",
        ));
    }

    let categories: Vec<String> = config
        .categories
        .iter()
        .map(|c| normalize_category(c))
        .collect();
    let n_columns = 2 + categories.len();

    // Per-index event increments, one column per rolling count.
    let mut increments = vec![vec![0.0_f64; n]; n_columns];
    let mut has_event = vec![false; n];
    for (idx, event) in events.iter().enumerate() {
        if event.time_index >= n {
            return Err(BcpError::invalid_input(format!(
                "event[{idx}] time_index={} outside observation window [0, {n})",
                event.time_index
            )));
        }
        let t = event.time_index;
        has_event[t] = true;
        increments[0][t] += 1.0;
        if event.high_impact {
            increments[1][t] += 1.0;
        }
        let category = normalize_category(&event.category);
        if let Some(pos) = categories.iter().position(|c| *c == category) {
            increments[2 + pos][t] += 1.0;
        }
    }

    let mut columns: Vec<Vec<f64>> = increments
        .iter()
        .map(|inc| trailing_sum(inc, config.window))
        .collect();

    let cap = config.recency_cap as f64;
    let mut last: Option<usize> = None;
    let recency: Vec<f64> = (0..n)
        .map(|t| {
            if has_event[t] {
                last = Some(t);
            }
            last.map_or(cap, |at| ((t - at) as f64).min(cap))
        })
        .collect();
    columns.push(recency);

    if config.standardize {
        for column in &mut columns {
            standardize_column(column);
        }
    }

    let names = config.feature_names();
    tracing::debug!(
        n,
        events = events.len(),
        columns = names.len(),
        "built event covariate rows"
    );

    Ok((0..n)
        .map(|t| EventCovariateRow {
            time_index: t,
            features: names
                .iter()
                .zip(&columns)
                .map(|(name, column)| (name.clone(), column[t]))
                .collect::<BTreeMap<_, _>>(),
        })
        .collect())
}

fn trailing_sum(increments: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(increments.len());
    let mut running = 0.0;
    for (t, value) in increments.iter().enumerate() {
        running += value;
        if t >= window {
            running -= increments[t - window];
        }
        out.push(running);
    }
    out
}

/// Z-scores a column in place; zero-variance columns are only centered.
pub fn standardize_column(column: &mut [f64]) {
    if column.is_empty() {
        return;
    }
    let (mean, variance) = mean_and_variance(column);
    let sd = variance.sqrt();
    let scale = if sd.is_finite() && sd > f64::EPSILON {
        sd
    } else {
        1.0
    };
    for value in column.iter_mut() {
        *value = (*value - mean) / scale;
    }
}
