// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{ExecutionContext, ObservationSet};
use bcp_model::{ChangePointSpec, ModelData};
use bcp_sampler::{BreakMove, ChangePointSampler, SamplerConfig};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn step_series(n: usize) -> Vec<f64> {
    (0..n)
        .map(|t| {
            let level = if t < n / 3 {
                0.0
            } else if t < 2 * n / 3 {
                0.5
            } else {
                -0.25
            };
            level + 0.1 * ((t * 31 % 17) as f64 / 8.0 - 1.0)
        })
        .collect()
}

fn bench_fit(c: &mut Criterion, case_id: &str, n: usize, break_move: BreakMove) {
    let values = step_series(n);
    let spec = ChangePointSpec::builder(2)
        .min_segment_len(5)
        .build(n, None)
        .expect("benchmark spec should build");
    let observations = ObservationSet::from_values(&values).expect("benchmark values are finite");
    let data = ModelData::bind(&spec, &observations, None).expect("benchmark data should bind");
    let sampler = ChangePointSampler::new(SamplerConfig {
        draws: 200,
        tune: 100,
        chains: 2,
        seed: 42,
        break_move,
        ..SamplerConfig::default()
    })
    .expect("sampler config should be valid");
    let ctx = ExecutionContext::new();

    c.bench_function(case_id, |b| {
        b.iter(|| {
            sampler
                .sample(black_box(&spec), black_box(&data), &ctx)
                .expect("benchmark fit should succeed");
        })
    });
}

fn benchmark_fit_enumerate_n500(c: &mut Criterion) {
    bench_fit(c, "fit_enumerate_n500_k2", 500, BreakMove::Enumerate);
}

fn benchmark_fit_random_walk_n500(c: &mut Criterion) {
    bench_fit(c, "fit_random_walk_n500_k2", 500, BreakMove::random_walk());
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = benchmark_fit_enumerate_n500, benchmark_fit_random_walk_n500
}
criterion_main!(benches);
