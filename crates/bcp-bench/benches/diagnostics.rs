// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_compare::waic;
use bcp_core::{ExecutionContext, ObservationSet};
use bcp_diagnostics::{ConvergenceThresholds, diagnose, effective_sample_size};
use bcp_model::{ChangePointSpec, ModelData};
use bcp_sampler::{ChangePointSampler, SamplerConfig, Trace};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn fitted_trace(n: usize) -> Trace {
    let values: Vec<f64> = (0..n)
        .map(|t| {
            let level = if t < n / 2 { 0.0 } else { 1.0 };
            level + 0.05 * ((t % 5) as f64 - 2.0)
        })
        .collect();
    let spec = ChangePointSpec::builder(1)
        .build(n, None)
        .expect("benchmark spec should build");
    let observations = ObservationSet::from_values(&values).expect("benchmark values are finite");
    let data = ModelData::bind(&spec, &observations, None).expect("benchmark data should bind");
    ChangePointSampler::new(SamplerConfig {
        draws: 1_000,
        tune: 200,
        chains: 4,
        seed: 7,
        ..SamplerConfig::default()
    })
    .expect("sampler config should be valid")
    .sample(&spec, &data, &ExecutionContext::new())
    .expect("benchmark fit should succeed")
}

fn benchmark_diagnose(c: &mut Criterion) {
    let trace = fitted_trace(400);
    let thresholds = ConvergenceThresholds::default();
    c.bench_function("diagnose_k1_4x1000", |b| {
        b.iter(|| diagnose(black_box(&trace), &thresholds).expect("diagnose should succeed"))
    });
}

fn benchmark_ess(c: &mut Criterion) {
    let trace = fitted_trace(400);
    let chains = trace.param_draws(1);
    c.bench_function("ess_4x1000", |b| {
        b.iter(|| effective_sample_size(black_box(&chains)))
    });
}

fn benchmark_waic(c: &mut Criterion) {
    let trace = fitted_trace(400);
    c.bench_function("waic_n400", |b| {
        b.iter(|| waic(black_box(&trace)).expect("waic should succeed"))
    });
}

criterion_group!(benches, benchmark_diagnose, benchmark_ess, benchmark_waic);
criterion_main!(benches);
