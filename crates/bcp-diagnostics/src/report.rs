// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::ess::effective_sample_size;
use crate::rhat::{Rhat, rhat};
use bcp_core::{BcpError, mean_and_variance};
use bcp_sampler::Trace;

/// Thresholds behind the `converged` flag.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceThresholds {
    pub max_rhat: f64,
    pub min_ess: f64,
    /// When set, a parameter whose R-hat is not computable blocks convergence.
    pub require_rhat: bool,
}

impl Default for ConvergenceThresholds {
    fn default() -> Self {
        Self {
            max_rhat: 1.01,
            min_ess: 400.0,
            require_rhat: true,
        }
    }
}

impl ConvergenceThresholds {
    pub fn validate(&self) -> Result<(), BcpError> {
        if !self.max_rhat.is_finite() || self.max_rhat < 1.0 {
            return Err(BcpError::invalid_input(format!(
                "ConvergenceThresholds.max_rhat must be finite and >= 1.0; got {}",
                self.max_rhat
            )));
        }
        if !self.min_ess.is_finite() || self.min_ess < 0.0 {
            return Err(BcpError::invalid_input(format!(
                "ConvergenceThresholds.min_ess must be finite and >= 0; got {}",
                self.min_ess
            )));
        }
        Ok(())
    }
}

/// Pooled moments and convergence statistics of one layout slot.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ParamDiagnostics {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub rhat: Rhat,
    pub ess: Option<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceReport {
    pub params: Vec<ParamDiagnostics>,
    pub max_rhat: Option<f64>,
    pub min_ess: Option<f64>,
    pub n_chains: usize,
    pub draws_per_chain: Vec<usize>,
    pub complete: bool,
    pub divergent_chains: Vec<usize>,
    pub rejected_proposals: u64,
    pub order_rejections: u64,
    pub warnings: Vec<String>,
    pub converged: bool,
    pub thresholds: ConvergenceThresholds,
}

impl ConvergenceReport {
    pub fn param(&self, name: &str) -> Option<&ParamDiagnostics> {
        self.params.iter().find(|param| param.name == name)
    }
}

/// Evaluates R-hat and ESS for every parameter of `trace`.
///
/// Never fails on a poorly mixed trace: the outcome is reported through
/// `converged` and `warnings`. Errors only on invalid thresholds or a trace
/// without draws.
pub fn diagnose(
    trace: &Trace,
    thresholds: &ConvergenceThresholds,
) -> Result<ConvergenceReport, BcpError> {
    thresholds.validate()?;
    if trace.total_draws() == 0 {
        return Err(BcpError::invalid_input(format!(
            "trace '{}' holds no draws to diagnose",
            trace.spec_name()
        )));
    }

    let layout = trace.layout();
    let mut params = Vec::with_capacity(layout.len());
    let mut warnings = vec![];
    let mut converged = trace.is_complete();
    if !trace.is_complete() {
        warnings.push(format!(
            "trace is incomplete: {} of {} draws retained",
            trace.total_draws(),
            trace.target_draws() * trace.n_chains()
        ));
    }

    let non_empty = |chains: Vec<Vec<f64>>| -> Vec<Vec<f64>> {
        chains.into_iter().filter(|chain| !chain.is_empty()).collect()
    };

    for (idx, name) in layout.names().iter().enumerate() {
        let chains = non_empty(trace.param_draws(idx));
        let pooled: Vec<f64> = chains.iter().flatten().copied().collect();
        let (mean, variance) = mean_and_variance(&pooled);
        let rhat = rhat(&chains);
        let ess = effective_sample_size(&chains);

        match (&rhat, thresholds.require_rhat) {
            (Rhat::Value { value }, _) if *value > thresholds.max_rhat => {
                converged = false;
                warnings.push(format!(
                    "{name}: rhat {value:.4} exceeds {}",
                    thresholds.max_rhat
                ));
            }
            (Rhat::NotComputable { reason }, true) => {
                converged = false;
                warnings.push(format!("{name}: rhat not computable ({reason})"));
            }
            _ => {}
        }
        match ess {
            Some(ess) if ess < thresholds.min_ess => {
                converged = false;
                warnings.push(format!(
                    "{name}: ess {ess:.1} below floor {}",
                    thresholds.min_ess
                ));
            }
            // Zero posterior variance: nothing to discount.
            None if variance == 0.0 => {}
            None => {
                converged = false;
                warnings.push(format!("{name}: ess not computable"));
            }
            Some(_) => {}
        }

        params.push(ParamDiagnostics {
            name: name.clone(),
            mean,
            sd: variance.sqrt(),
            rhat,
            ess,
        });
    }

    let divergent_chains: Vec<usize> = trace
        .chains()
        .iter()
        .filter(|chain| chain.stats.diverged)
        .map(|chain| chain.chain)
        .collect();
    if !divergent_chains.is_empty() {
        converged = false;
        warnings.push(format!("divergent chains: {divergent_chains:?}"));
    }

    let max_rhat = params
        .iter()
        .filter_map(|param| param.rhat.value())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
    let min_ess = params
        .iter()
        .filter_map(|param| param.ess)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));

    if !converged {
        tracing::warn!(
            spec = trace.spec_name(),
            max_rhat,
            min_ess,
            issues = warnings.len(),
            "trace did not meet convergence thresholds"
        );
    }

    Ok(ConvergenceReport {
        params,
        max_rhat,
        min_ess,
        n_chains: trace.n_chains(),
        draws_per_chain: trace.chains().iter().map(|chain| chain.len()).collect(),
        complete: trace.is_complete(),
        divergent_chains,
        rejected_proposals: trace.chains().iter().map(|c| c.stats.rejected()).sum(),
        order_rejections: trace.chains().iter().map(|c| c.stats.order_rejections).sum(),
        warnings,
        converged,
        thresholds: thresholds.clone(),
    })
}
