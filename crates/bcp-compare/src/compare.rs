// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::waic::{Waic, standard_error_of_sum, waic};
use bcp_core::BcpError;
use bcp_model::ChangePointSpec;
use bcp_sampler::Trace;
use std::collections::BTreeSet;

/// One fitted model variant offered for comparison.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub spec: &'a ChangePointSpec,
    pub trace: &'a Trace,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RankedModel {
    /// 0 for the preferred model.
    pub rank: usize,
    pub name: String,
    pub n_params: usize,
    pub waic: Waic,
    /// WAIC gap to the best model (0 for the best model).
    pub delta: f64,
    /// Standard error of the pointwise WAIC difference to the best model.
    pub delta_se: f64,
    /// `delta < 2 * delta_se`; always false for the best model.
    pub indistinguishable: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ModelComparison {
    pub ranking: Vec<RankedModel>,
    pub warnings: Vec<String>,
}

impl ModelComparison {
    pub fn best(&self) -> &RankedModel {
        &self.ranking[0]
    }

    pub fn get(&self, name: &str) -> Option<&RankedModel> {
        self.ranking.iter().find(|model| model.name == name)
    }

    /// True when another model cannot be told apart from the best one.
    pub fn has_ties(&self) -> bool {
        self.ranking.iter().any(|model| model.indistinguishable)
    }
}

fn validate(candidates: &[Candidate<'_>]) -> Result<(), BcpError> {
    if candidates.len() < 2 {
        return Err(BcpError::invalid_input(format!(
            "comparison requires at least 2 candidates, got {}",
            candidates.len()
        )));
    }
    let mut names = BTreeSet::new();
    for candidate in candidates {
        if !names.insert(candidate.name) {
            return Err(BcpError::invalid_input(format!(
                "candidate name '{}' appears more than once",
                candidate.name
            )));
        }
        if candidate.trace.spec_name() != candidate.spec.name() {
            return Err(BcpError::invalid_input(format!(
                "candidate '{}' pairs specification '{}' with a trace of '{}'",
                candidate.name,
                candidate.spec.name(),
                candidate.trace.spec_name()
            )));
        }
    }

    let reference = candidates[0];
    let expected = reference.trace.fingerprint();
    for candidate in &candidates[1..] {
        let got = candidate.trace.fingerprint();
        if got != expected {
            return Err(BcpError::incomparable(format!(
                "candidate '{}' was fit on {} observations (checksum {:016x}), '{}' on {} (checksum {:016x})",
                candidate.name,
                got.n,
                got.checksum,
                reference.name,
                expected.n,
                expected.checksum
            )));
        }
    }
    Ok(())
}

/// Ranks candidates by WAIC, lowest first.
///
/// All traces must come from the same observations. A model whose WAIC gap to
/// the best is smaller than twice the standard error of the paired pointwise
/// difference is flagged `indistinguishable`.
pub fn compare(candidates: &[Candidate<'_>]) -> Result<ModelComparison, BcpError> {
    validate(candidates)?;

    let mut warnings = vec![];
    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.trace.is_complete() {
            warnings.push(format!(
                "candidate '{}' was scored on an incomplete trace",
                candidate.name
            ));
        }
        let score = waic(candidate.trace).map_err(|err| match err {
            BcpError::InvalidInput(msg) => {
                BcpError::incomparable(format!("candidate '{}': {msg}", candidate.name))
            }
            other => other,
        })?;
        if score.high_variance_points > 0 {
            warnings.push(format!(
                "candidate '{}' has {} observations with high pointwise variance",
                candidate.name, score.high_variance_points
            ));
        }
        scored.push((candidate, score));
    }

    scored.sort_by(|(_, a), (_, b)| a.waic.total_cmp(&b.waic));
    let best_pointwise = scored[0].1.pointwise.clone();
    let best_waic = scored[0].1.waic;

    let ranking: Vec<RankedModel> = scored
        .into_iter()
        .enumerate()
        .map(|(rank, (candidate, score))| {
            let (delta, delta_se) = if rank == 0 {
                (0.0, 0.0)
            } else {
                let diffs: Vec<f64> = score
                    .pointwise
                    .iter()
                    .zip(&best_pointwise)
                    .map(|(a, b)| a - b)
                    .collect();
                (score.waic - best_waic, standard_error_of_sum(&diffs))
            };
            RankedModel {
                rank,
                name: candidate.name.to_string(),
                n_params: candidate.spec.layout().len(),
                waic: score,
                delta,
                delta_se,
                indistinguishable: rank > 0 && delta < 2.0 * delta_se,
            }
        })
        .collect();

    for model in ranking.iter().filter(|model| model.indistinguishable) {
        tracing::warn!(
            best = ranking[0].name.as_str(),
            other = model.name.as_str(),
            delta = model.delta,
            delta_se = model.delta_se,
            "models are statistically indistinguishable"
        );
    }
    tracing::info!(
        best = ranking[0].name.as_str(),
        candidates = ranking.len(),
        "model comparison finished"
    );

    Ok(ModelComparison { ranking, warnings })
}
