// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, CovariateTable, ExecutionContext, ObservationSet, segment_of};
use bcp_model::{ChangePointSpec, ModelData, NormalPrior};
use bcp_report::{
    BreakEstimate, DatedEvent, SummaryConfig, associate_events, posterior_predictive, summarize,
};
use bcp_sampler::{ChangePointSampler, SamplerConfig, Trace};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

fn noise(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n).map(|_| rng.sample(StandardNormal)).collect()
}

fn bind(spec: &ChangePointSpec, values: &[f64], table: Option<&CovariateTable>) -> ModelData {
    let obs = ObservationSet::from_values(values).expect("finite values");
    ModelData::bind(spec, &obs, table).expect("bind should succeed")
}

fn fit(spec: &ChangePointSpec, values: &[f64], table: Option<&CovariateTable>) -> Trace {
    let data = bind(spec, values, table);
    ChangePointSampler::new(SamplerConfig {
        draws: 600,
        tune: 300,
        chains: 2,
        seed: 13,
        ..SamplerConfig::default()
    })
    .expect("valid config")
    .sample(spec, &data, &ExecutionContext::new())
    .expect("sampling should succeed")
}

fn two_break_series() -> Vec<f64> {
    noise(300, 4)
        .into_iter()
        .enumerate()
        .map(|(t, z)| {
            let (mean, sd) = match t {
                0..100 => (0.0, 0.3),
                100..220 => (1.5, 0.6),
                _ => (-0.5, 0.3),
            };
            mean + sd * z
        })
        .collect()
}

#[test]
fn summary_recovers_breaks_and_segment_parameters() {
    let values = two_break_series();
    let spec = ChangePointSpec::builder(2)
        .build(values.len(), None)
        .expect("spec should build");
    let trace = fit(&spec, &values, None);
    let summary = summarize(&spec, &trace, &SummaryConfig::default())
        .expect("summary should succeed");

    assert_eq!(summary.n_draws, 1200);
    assert_eq!(summary.breaks.len(), 2);
    for (summary, truth) in summary.breaks.iter().zip([100usize, 220]) {
        assert!(summary.time_index.abs_diff(truth) <= 5, "{summary:?}");
        assert!(summary.hdi.contains(truth as f64) || summary.hdi.width() <= 6.0);
        assert!(summary.hdi.lower <= summary.median as f64);
        assert!(summary.median as f64 <= summary.hdi.upper);
    }

    assert_eq!(summary.segments.len(), 3);
    assert_eq!(summary.segments[0].start, 0);
    assert_eq!(summary.segments[2].end, values.len());
    for pair in summary.segments.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    assert!((summary.segments[1].mean.mean - 1.5).abs() < 0.2);
    assert!(summary.segments[1].volatility.mean > summary.segments[0].volatility.mean);

    let estimates: Vec<usize> = summary.breaks.iter().map(|b| b.time_index).collect();
    assert_eq!(summary.regime_path.len(), values.len());
    for (t, &segment) in summary.regime_path.iter().enumerate() {
        assert_eq!(segment, segment_of(t, &estimates));
    }
    assert!(summary.coefficients.is_empty());
    assert!(summary.warnings.is_empty());
}

#[test]
fn mode_estimate_stays_ordered() {
    let values = two_break_series();
    let spec = ChangePointSpec::builder(2)
        .build(values.len(), None)
        .expect("spec should build");
    let trace = fit(&spec, &values, None);
    let summary = summarize(
        &spec,
        &trace,
        &SummaryConfig {
            break_estimate: BreakEstimate::Mode,
            hdi_prob: 0.5,
            ..SummaryConfig::default()
        },
    )
    .expect("summary should succeed");
    assert!(summary.breaks[0].time_index < summary.breaks[1].time_index);
    assert_eq!(summary.hdi_prob, 0.5);
    for b in &summary.breaks {
        assert_eq!(b.time_index, b.mode);
    }
}

#[test]
fn coefficient_significance_follows_the_interval() {
    let n = 400;
    let strong: Vec<f64> = (0..n).map(|t| if t % 25 < 4 { 1.0 } else { 0.0 }).collect();
    let irrelevant = noise(n, 77);
    let values: Vec<f64> = noise(n, 5)
        .into_iter()
        .enumerate()
        .map(|(t, z)| if t < 200 { 0.0 } else { 0.5 } + 2.0 * strong[t] + 0.3 * z)
        .collect();
    let table = CovariateTable::from_columns(
        n,
        vec![
            ("war_30".to_string(), strong),
            ("opec_30".to_string(), irrelevant),
        ],
    )
    .expect("valid columns");
    let spec = ChangePointSpec::builder(1)
        .covariate("war_30", NormalPrior::weakly_informative())
        .covariate("opec_30", NormalPrior::weakly_informative())
        .build(n, Some(&table))
        .expect("spec should build");
    let trace = fit(&spec, &values, Some(&table));
    let summary = summarize(&spec, &trace, &SummaryConfig::default())
        .expect("summary should succeed");

    assert_eq!(summary.coefficients.len(), 2);
    let war = &summary.coefficients[0];
    assert_eq!(war.feature, "war_30");
    assert_eq!(war.name, "beta[war_30]");
    assert_eq!(war.segment, None);
    assert!(war.significant);
    assert!((war.stat.mean - 2.0).abs() < 0.2);
    let opec = &summary.coefficients[1];
    assert!(opec.stat.mean.abs() < 0.1);
}

#[test]
fn events_near_a_break_score_higher_than_distant_ones() {
    let values = two_break_series();
    let spec = ChangePointSpec::builder(2)
        .build(values.len(), None)
        .expect("spec should build");
    let trace = fit(&spec, &values, None);
    let events = vec![
        DatedEvent {
            time_index: 98,
            label: "embargo".to_string(),
            category: Some("war".to_string()),
        },
        DatedEvent {
            time_index: 160,
            label: "summit".to_string(),
            category: None,
        },
    ];
    let associations = associate_events(&trace, &events, 5).expect("association should succeed");
    assert_eq!(associations.len(), 2);
    assert!(associations[0].probability > 0.9);
    assert_eq!(associations[0].nearest_break, 0);
    assert!(associations[0].distance <= 7);
    assert!(associations[1].probability < 0.05);
    assert_eq!(associations[1].window, 5);

    let outside = [DatedEvent {
        time_index: 300,
        label: "late".to_string(),
        category: None,
    }];
    assert!(associate_events(&trace, &outside, 5).is_err());
}

#[test]
fn summary_rejects_trace_of_another_specification() {
    let values = two_break_series();
    let one = ChangePointSpec::builder(1)
        .build(values.len(), None)
        .expect("spec should build");
    let two = ChangePointSpec::builder(2)
        .build(values.len(), None)
        .expect("spec should build");
    let trace = fit(&one, &values, None);
    assert!(summarize(&two, &trace, &SummaryConfig::default()).is_err());
}

#[test]
fn predictive_fit_tracks_segment_means() {
    let values = two_break_series();
    let spec = ChangePointSpec::builder(2)
        .build(values.len(), None)
        .expect("spec should build");
    let trace = fit(&spec, &values, None);
    let check = posterior_predictive(&trace, &bind(&spec, &values, None))
        .expect("predictive check should succeed");

    assert_eq!(check.n_draws, 1200);
    assert_eq!(check.fitted.len(), values.len());
    assert_eq!(check.residuals.len(), values.len());
    assert!(check.fitted[50].abs() < 0.15, "fitted[50]={}", check.fitted[50]);
    assert!((check.fitted[160] - 1.5).abs() < 0.2, "fitted[160]={}", check.fitted[160]);
    assert!((check.fitted[280] + 0.5).abs() < 0.15, "fitted[280]={}", check.fitted[280]);
    assert!(check.residual_mean.abs() < 0.05);
    assert!((0.3..0.5).contains(&check.residual_sd), "sd={}", check.residual_sd);
    assert!((values[7] - check.fitted[7] - check.residuals[7]).abs() < 1e-12);
}

#[test]
fn predictive_fit_includes_covariate_effects() {
    let n = 400;
    let pulses: Vec<f64> = (0..n).map(|t| if t % 25 < 4 { 1.0 } else { 0.0 }).collect();
    let values: Vec<f64> = noise(n, 5)
        .into_iter()
        .enumerate()
        .map(|(t, z)| if t < 200 { 0.0 } else { 0.5 } + 2.0 * pulses[t] + 0.3 * z)
        .collect();
    let table = CovariateTable::from_columns(n, vec![("war_30".to_string(), pulses)])
        .expect("valid column");
    let spec = ChangePointSpec::builder(1)
        .covariate("war_30", NormalPrior::weakly_informative())
        .build(n, Some(&table))
        .expect("spec should build");
    let trace = fit(&spec, &values, Some(&table));
    let check = posterior_predictive(&trace, &bind(&spec, &values, Some(&table)))
        .expect("predictive check should succeed");

    assert!((check.fitted[0] - 2.0).abs() < 0.2, "pulse fit {}", check.fitted[0]);
    assert!(check.fitted[10].abs() < 0.1, "baseline fit {}", check.fitted[10]);
    assert!(check.residual_mean.abs() < 0.05);
    assert!((0.25..0.36).contains(&check.residual_sd), "sd={}", check.residual_sd);
}

#[test]
fn predictive_check_rejects_other_data() {
    let values = two_break_series();
    let spec = ChangePointSpec::builder(1)
        .build(values.len(), None)
        .expect("spec should build");
    let trace = fit(&spec, &values, None);
    let shifted: Vec<f64> = values.iter().map(|v| v + 1.0).collect();
    assert!(matches!(
        posterior_predictive(&trace, &bind(&spec, &shifted, None)),
        Err(BcpError::InvalidInput(_))
    ));

    let shorter = ChangePointSpec::builder(1)
        .build(values.len() - 10, None)
        .expect("spec should build");
    assert!(matches!(
        posterior_predictive(&trace, &bind(&shorter, &values[10..], None)),
        Err(BcpError::InvalidInput(_))
    ));
}
