// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BcpError;
use std::collections::{BTreeMap, BTreeSet};

/// One step of the stationary modeling series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub time_index: usize,
    pub value: f64,
}

/// Identity of an observation set, used to check that fits are comparable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataFingerprint {
    pub n: usize,
    pub checksum: u64,
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv_mix(mut hash: u64, word: u64) -> u64 {
    for byte in word.to_le_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Validated, immutable observation window with dense 0-based time indices.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSet {
    values: Vec<f64>,
}

impl ObservationSet {
    /// Validates and orders observations.
    ///
    /// Rejects empty input, non-finite values, duplicate indices and gaps.
    pub fn new(mut observations: Vec<Observation>) -> Result<Self, BcpError> {
        if observations.is_empty() {
            return Err(BcpError::invalid_input(
                "observation set requires at least one observation",
            ));
        }

        observations.sort_by_key(|obs| obs.time_index);

        for (position, obs) in observations.iter().enumerate() {
            if !obs.value.is_finite() {
                return Err(BcpError::invalid_input(format!(
                    "observation at time_index={} is non-finite: {}",
                    obs.time_index, obs.value
                )));
            }
            if position > 0 && observations[position - 1].time_index == obs.time_index {
                return Err(BcpError::invalid_input(format!(
                    "duplicate observation time_index={}",
                    obs.time_index
                )));
            }
            if obs.time_index != position {
                return Err(BcpError::invalid_input(format!(
                    "time_index must be dense and 0-based: expected {position}, got {}",
                    obs.time_index
                )));
            }
        }

        Ok(Self {
            values: observations.into_iter().map(|obs| obs.value).collect(),
        })
    }

    /// Builds a set from values, assigning time indices `0..n`.
    pub fn from_values(values: &[f64]) -> Result<Self, BcpError> {
        Self::new(
            values
                .iter()
                .enumerate()
                .map(|(time_index, &value)| Observation { time_index, value })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = Observation> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(time_index, &value)| Observation { time_index, value })
    }

    pub fn fingerprint(&self) -> DataFingerprint {
        let mut hash = FNV_OFFSET;
        for (time_index, value) in self.values.iter().enumerate() {
            hash = fnv_mix(hash, time_index as u64);
            hash = fnv_mix(hash, value.to_bits());
        }
        DataFingerprint {
            n: self.values.len(),
            checksum: hash,
        }
    }
}

/// Event features contributed to one observation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventCovariateRow {
    pub time_index: usize,
    pub features: BTreeMap<String, f64>,
}

/// Covariate columns left-joined onto an observation set.
#[derive(Clone, Debug, PartialEq)]
pub struct CovariateTable {
    n: usize,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl CovariateTable {
    /// Left-joins covariate rows onto the observation indices; missing cells are zero.
    pub fn from_rows(
        observations: &ObservationSet,
        rows: &[EventCovariateRow],
    ) -> Result<Self, BcpError> {
        let n = observations.len();
        let names: Vec<String> = rows
            .iter()
            .flat_map(|row| row.features.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns = vec![vec![0.0; n]; names.len()];
        let mut seen = vec![false; n];

        for row in rows {
            if row.time_index >= n {
                return Err(BcpError::invalid_input(format!(
                    "covariate row time_index={} has no matching observation (n={n})",
                    row.time_index
                )));
            }
            if seen[row.time_index] {
                return Err(BcpError::invalid_input(format!(
                    "more than one covariate row for time_index={}",
                    row.time_index
                )));
            }
            seen[row.time_index] = true;

            for (name, &value) in &row.features {
                if !value.is_finite() {
                    return Err(BcpError::invalid_input(format!(
                        "covariate '{name}' at time_index={} is non-finite: {value}",
                        row.time_index
                    )));
                }
                let column = names
                    .binary_search(name)
                    .map_err(|_| BcpError::invalid_input(format!("unknown covariate '{name}'")))?;
                columns[column][row.time_index] = value;
            }
        }

        Ok(Self { n, names, columns })
    }

    /// Builds a table from named, already aligned columns.
    pub fn from_columns(n: usize, columns: Vec<(String, Vec<f64>)>) -> Result<Self, BcpError> {
        let mut sorted = columns;
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        for window in sorted.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(BcpError::invalid_input(format!(
                    "duplicate covariate column '{}'",
                    window[0].0
                )));
            }
        }
        for (name, column) in &sorted {
            if column.len() != n {
                return Err(BcpError::invalid_input(format!(
                    "covariate column '{name}' has length {}, expected {n}",
                    column.len()
                )));
            }
            if let Some((t, value)) = column.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(BcpError::invalid_input(format!(
                    "covariate '{name}' at time_index={t} is non-finite: {value}"
                )));
            }
        }

        let (names, columns) = sorted.into_iter().unzip();
        Ok(Self { n, names, columns })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .binary_search_by(|candidate| candidate.as_str().cmp(name))
            .ok()
            .map(|idx| self.columns[idx].as_slice())
    }
}
