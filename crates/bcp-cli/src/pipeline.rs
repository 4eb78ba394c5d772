// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::{AnalysisConfig, AnalysisInput};
use crate::job::FitJob;
use bcp_compare::{Candidate, compare, waic};
use bcp_core::{BcpError, CovariateTable, ExecutionContext, JobState, ObservationSet};
use bcp_diagnostics::{ConvergenceThresholds, diagnose};
use bcp_features::build_event_features;
use bcp_model::{ChangePointSpec, ModelData};
use bcp_report::{
    AnalysisReport, DatedEvent, RUN_REPORT_SCHEMA_VERSION, ResultsStore, RunFailure, RunReport,
    SummaryConfig, associate_events, posterior_predictive, summarize,
};
use bcp_sampler::{ChangePointSampler, SamplerConfig, Trace};

/// Settings shared by every fit of an analysis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitConfig {
    pub sampler: SamplerConfig,
    pub thresholds: ConvergenceThresholds,
    pub summary: SummaryConfig,
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        self.sampler.validate()?;
        self.thresholds.validate()?;
        self.summary.validate()
    }
}

impl From<&AnalysisConfig> for FitConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            sampler: config.sampler.clone(),
            thresholds: config.thresholds.clone(),
            summary: config.summary.clone(),
        }
    }
}

/// One (specification, data) pair to fit.
#[derive(Clone, Copy, Debug)]
pub struct FitRequest<'a> {
    pub run_id: &'a str,
    pub spec: &'a ChangePointSpec,
    pub observations: &'a ObservationSet,
    pub covariates: Option<&'a CovariateTable>,
    pub events: &'a [DatedEvent],
}

#[derive(Clone, Debug)]
pub struct FitOutcome {
    pub job: FitJob,
    pub report: RunReport,
    /// Absent when sampling failed.
    pub trace: Option<Trace>,
}

/// Validates, binds, samples and post-processes one specification.
///
/// Configuration and binding errors are returned before the job starts.
/// A numerical breakdown while sampling ends the job in `Failed` with a
/// structured failure and no trace; a non-converged trace is still
/// returned, flagged `NonConvergent`.
pub fn run_fit(
    request: FitRequest<'_>,
    config: &FitConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<FitOutcome, BcpError> {
    config.validate()?;
    let spec = request.spec;
    let mut job = FitJob::new(request.run_id, spec.name());
    let data = ModelData::bind(spec, request.observations, request.covariates)?;
    let sampler = ChangePointSampler::new(config.sampler.clone())?;

    let span = tracing::info_span!("fit", run_id = request.run_id, spec = spec.name());
    let _entered = span.enter();

    job.transition(JobState::Running)?;
    let trace = match sampler.sample(spec, &data, ctx) {
        Ok(trace) => trace,
        Err(err @ (BcpError::SamplingFailure(_) | BcpError::NumericalIssue(_))) => {
            return fail(job, &err);
        }
        Err(err) => return Err(err),
    };

    match post_process(&request, config, &data, &trace) {
        Ok(mut report) => {
            let next = if !trace.is_complete() {
                JobState::Cancelled
            } else if report
                .diagnostics
                .as_ref()
                .is_some_and(|diagnostics| diagnostics.converged)
            {
                JobState::Converged
            } else {
                JobState::NonConvergent
            };
            job.transition(next)?;
            report.state = next;
            tracing::info!(
                state = %next,
                draws = trace.total_draws(),
                "fit finished"
            );
            Ok(FitOutcome {
                job,
                report,
                trace: Some(trace),
            })
        }
        Err(err) => fail(job, &err),
    }
}

fn fail(mut job: FitJob, err: &BcpError) -> Result<FitOutcome, BcpError> {
    tracing::warn!(error = %err, "fit failed");
    job.transition(JobState::Failed)?;
    let mut report = RunReport::new(job.run_id(), job.spec_name(), JobState::Failed);
    report.failure = Some(RunFailure::from(err));
    Ok(FitOutcome {
        job,
        report,
        trace: None,
    })
}

/// Diagnostics, summary, WAIC, predictive residuals and event association
/// of a fresh trace.
///
/// A cancelled trace without draws only carries metadata.
fn post_process(
    request: &FitRequest<'_>,
    config: &FitConfig,
    data: &ModelData,
    trace: &Trace,
) -> Result<RunReport, BcpError> {
    let mut report = RunReport::new(request.run_id, request.spec.name(), JobState::Running);
    report.metadata = Some(trace.metadata().clone());
    if trace.total_draws() == 0 {
        return Ok(report);
    }

    report.diagnostics = Some(diagnose(trace, &config.thresholds)?);
    report.summary = Some(summarize(request.spec, trace, &config.summary)?);
    report.waic = match waic(trace) {
        Ok(waic) => Some(waic),
        Err(err @ BcpError::InvalidInput(_)) => {
            tracing::warn!(error = %err, "WAIC not available");
            None
        }
        Err(err) => return Err(err),
    };
    report.predictive = Some(posterior_predictive(trace, data)?);
    if !request.events.is_empty() {
        report.events = associate_events(trace, request.events, config.summary.event_window)?;
    }
    Ok(report)
}

#[derive(Clone, Debug)]
pub struct AnalysisOutcome {
    pub jobs: Vec<FitJob>,
    pub report: AnalysisReport,
}

/// Series, covariates and validated specifications of one analysis.
#[derive(Clone, Debug)]
pub struct PreparedAnalysis {
    pub observations: ObservationSet,
    pub covariates: Option<CovariateTable>,
    pub specs: Vec<ChangePointSpec>,
    pub events: Vec<DatedEvent>,
}

/// Builds every specification of `config` against the input series.
///
/// Nothing is sampled; any invalid variant fails the whole analysis.
pub fn prepare_analysis(
    input: &AnalysisInput,
    config: &AnalysisConfig,
) -> Result<PreparedAnalysis, BcpError> {
    config.validate()?;
    let series = input.series()?;
    let observations = ObservationSet::from_values(&series)?;
    let n = observations.len();

    let covariates = if config.needs_covariates() {
        let rows = build_event_features(n, &input.event_records(), &config.features)?;
        Some(CovariateTable::from_rows(&observations, &rows)?)
    } else {
        None
    };
    let specs = config
        .variants
        .iter()
        .map(|variant| variant.build(n, &config.features, covariates.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PreparedAnalysis {
        observations,
        covariates,
        specs,
        events: input.dated_events(),
    })
}

/// Fits every configured variant on the same series and compares them.
///
/// All specifications are validated before the first fit starts. Runs that
/// produced a trace are published to `store`; failed runs leave it untouched.
pub fn run_analysis(
    input: &AnalysisInput,
    config: &AnalysisConfig,
    store: &ResultsStore,
    ctx: &ExecutionContext<'_>,
) -> Result<AnalysisOutcome, BcpError> {
    let PreparedAnalysis {
        observations,
        covariates,
        specs,
        events,
    } = prepare_analysis(input, config)?;
    let fit_config = FitConfig::from(config);

    tracing::info!(
        n = observations.len(),
        variants = specs.len(),
        events = events.len(),
        "analysis starting"
    );

    let mut outcomes = Vec::with_capacity(specs.len());
    for spec in &specs {
        let request = FitRequest {
            run_id: spec.name(),
            spec,
            observations: &observations,
            covariates: covariates.as_ref(),
            events: &events,
        };
        outcomes.push(run_fit(request, &fit_config, ctx)?);
    }

    let mut warnings = vec![];
    for outcome in &outcomes {
        match outcome.report.state {
            JobState::NonConvergent => warnings.push(format!(
                "run '{}' did not meet convergence thresholds",
                outcome.report.run_id
            )),
            JobState::Failed => warnings.push(format!(
                "run '{}' failed and was not published",
                outcome.report.run_id
            )),
            JobState::Cancelled => warnings.push(format!(
                "run '{}' was cancelled; its trace is incomplete",
                outcome.report.run_id
            )),
            _ => {}
        }
    }

    let candidates: Vec<Candidate<'_>> = specs
        .iter()
        .zip(&outcomes)
        .filter_map(|(spec, outcome)| {
            let trace = outcome.trace.as_ref().filter(|trace| trace.is_complete())?;
            Some(Candidate {
                name: spec.name(),
                spec,
                trace,
            })
        })
        .collect();
    let comparison = if candidates.len() >= 2 {
        match compare(&candidates) {
            Ok(comparison) => Some(comparison),
            Err(err) => {
                tracing::warn!(error = %err, "model comparison skipped");
                warnings.push(format!("model comparison skipped: {err}"));
                None
            }
        }
    } else {
        None
    };

    let mut jobs = Vec::with_capacity(outcomes.len());
    let mut runs = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        if outcome.report.state.has_trace() {
            store.put(outcome.report.clone());
        }
        jobs.push(outcome.job);
        runs.push(outcome.report);
    }

    Ok(AnalysisOutcome {
        jobs,
        report: AnalysisReport {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            runs,
            comparison,
            warnings,
        },
    })
}
