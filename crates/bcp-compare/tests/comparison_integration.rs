// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_compare::{Candidate, compare, waic};
use bcp_core::{BcpError, CancelToken, CovariateTable, ExecutionContext, ObservationSet};
use bcp_model::{ChangePointSpec, ModelData, NormalPrior};
use bcp_sampler::{ChangePointSampler, SamplerConfig, Trace};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

fn normal_draws(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n).map(|_| rng.sample(StandardNormal)).collect()
}

fn piecewise(n: usize, breaks: &[usize], means: &[f64], sd: f64, seed: u64) -> Vec<f64> {
    normal_draws(n, seed)
        .into_iter()
        .enumerate()
        .map(|(t, z)| {
            let segment = breaks.iter().filter(|b| **b <= t).count();
            means[segment] + sd * z
        })
        .collect()
}

fn config(seed: u64) -> SamplerConfig {
    SamplerConfig {
        draws: 500,
        tune: 300,
        chains: 2,
        seed,
        ..SamplerConfig::default()
    }
}

fn fit(
    spec: &ChangePointSpec,
    values: &[f64],
    table: Option<&CovariateTable>,
    ctx: &ExecutionContext<'_>,
) -> Trace {
    let obs = ObservationSet::from_values(values).expect("finite values");
    let data = ModelData::bind(spec, &obs, table).expect("bind should succeed");
    ChangePointSampler::new(config(7))
        .expect("valid config")
        .sample(spec, &data, ctx)
        .expect("sampling should succeed")
}

fn plain_spec(k: usize, n: usize) -> ChangePointSpec {
    ChangePointSpec::builder(k)
        .build(n, None)
        .expect("spec should build")
}

#[test]
fn nested_model_with_noise_covariate_is_not_preferred() {
    let n = 400;
    let values = piecewise(n, &[200], &[0.0, 0.6], 0.5, 31);
    let noise = normal_draws(n, 99);
    let table = CovariateTable::from_columns(n, vec![("noise_30".to_string(), noise)])
        .expect("valid column");

    let simple = plain_spec(1, n);
    let complex = ChangePointSpec::builder(1)
        .covariate("noise_30", NormalPrior::weakly_informative())
        .build(n, Some(&table))
        .expect("spec should build");
    let ctx = ExecutionContext::new();
    let simple_trace = fit(&simple, &values, None, &ctx);
    let complex_trace = fit(&complex, &values, Some(&table), &ctx);

    let comparison = compare(&[
        Candidate {
            name: "baseline",
            spec: &simple,
            trace: &simple_trace,
        },
        Candidate {
            name: "events",
            spec: &complex,
            trace: &complex_trace,
        },
    ])
    .expect("comparison should succeed");

    assert_eq!(comparison.ranking.len(), 2);
    let baseline = comparison.get("baseline").expect("baseline should be ranked");
    let events = comparison.get("events").expect("events should be ranked");
    assert!(events.n_params > baseline.n_params);
    if comparison.best().name == "events" {
        assert!(
            baseline.indistinguishable,
            "complex model preferred by {} with se {}",
            baseline.delta,
            baseline.delta_se
        );
    }
    for model in &comparison.ranking {
        assert!(model.waic.se > 0.0);
        assert!(model.waic.p_waic > 0.0);
    }
}

#[test]
fn two_break_model_wins_on_two_break_data() {
    let n = 300;
    let values = piecewise(n, &[100, 200], &[0.0, 2.0, -1.0], 0.5, 5);
    let one = plain_spec(1, n);
    let two = plain_spec(2, n);
    let ctx = ExecutionContext::new();
    let one_trace = fit(&one, &values, None, &ctx);
    let two_trace = fit(&two, &values, None, &ctx);

    let comparison = compare(&[
        Candidate {
            name: "one",
            spec: &one,
            trace: &one_trace,
        },
        Candidate {
            name: "two",
            spec: &two,
            trace: &two_trace,
        },
    ])
    .expect("comparison should succeed");

    assert_eq!(comparison.best().name, "two");
    assert_eq!(comparison.best().delta, 0.0);
    let runner_up = &comparison.ranking[1];
    assert_eq!(runner_up.rank, 1);
    assert!(runner_up.delta > 0.0);
    assert!(!runner_up.indistinguishable);
    assert!(!comparison.has_ties());
}

#[test]
fn traces_from_different_observations_are_incomparable() {
    let a_values = piecewise(120, &[60], &[0.0, 1.0], 0.5, 1);
    let mut b_values = a_values.clone();
    b_values[7] += 0.25;
    let spec = plain_spec(1, 120);
    let ctx = ExecutionContext::new();
    let a = fit(&spec, &a_values, None, &ctx);
    let b = fit(&spec, &b_values, None, &ctx);

    let err = compare(&[
        Candidate {
            name: "a",
            spec: &spec,
            trace: &a,
        },
        Candidate {
            name: "b",
            spec: &spec,
            trace: &b,
        },
    ])
    .expect_err("different data should be incomparable");
    assert!(matches!(err, BcpError::IncomparableModels(_)));

    let shorter = plain_spec(1, 100);
    let c = fit(&shorter, &a_values[..100], None, &ctx);
    let err = compare(&[
        Candidate {
            name: "a",
            spec: &spec,
            trace: &a,
        },
        Candidate {
            name: "c",
            spec: &shorter,
            trace: &c,
        },
    ])
    .expect_err("different lengths should be incomparable");
    assert!(matches!(err, BcpError::IncomparableModels(_)));
}

#[test]
fn comparison_rejects_malformed_candidate_lists() {
    let values = piecewise(80, &[40], &[0.0, 1.0], 0.5, 2);
    let spec = plain_spec(1, 80);
    let ctx = ExecutionContext::new();
    let trace = fit(&spec, &values, None, &ctx);
    let candidate = Candidate {
        name: "only",
        spec: &spec,
        trace: &trace,
    };

    assert!(matches!(
        compare(&[candidate]),
        Err(BcpError::InvalidInput(_))
    ));
    let err = compare(&[candidate, candidate]).expect_err("duplicate names should fail");
    assert!(err.to_string().contains("more than once"));

    let token = CancelToken::new();
    token.cancel();
    let empty = fit(&spec, &values, None, &ExecutionContext::new().with_cancel(&token));
    assert!(waic(&empty).is_err());
    let err = compare(&[
        candidate,
        Candidate {
            name: "cancelled",
            spec: &spec,
            trace: &empty,
        },
    ])
    .expect_err("trace without draws should not be scored");
    assert!(matches!(err, BcpError::IncomparableModels(_)));
}
