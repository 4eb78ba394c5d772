// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use bcp_core::{ExecutionContext, ObservationSet};
use bcp_model::{ChangePointSpec, ModelData};
use bcp_sampler::{ChangePointSampler, SamplerConfig, Trace};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Gaussian series whose mean jumps from `before` to `after` at `break_at`.
pub fn step_series(
    n: usize,
    break_at: usize,
    before: f64,
    after: f64,
    sd: f64,
    seed: u64,
) -> Vec<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n)
        .map(|t| {
            let mean = if t < break_at { before } else { after };
            let z: f64 = rng.sample(StandardNormal);
            mean + sd * z
        })
        .collect()
}

pub fn bind(values: &[f64], spec: &ChangePointSpec) -> ModelData {
    let obs = ObservationSet::from_values(values).expect("synthetic values should be finite");
    ModelData::bind(spec, &obs, None).expect("synthetic data should bind")
}

pub fn fit(values: &[f64], n_breaks: usize, config: SamplerConfig) -> Trace {
    let spec = ChangePointSpec::builder(n_breaks)
        .build(values.len(), None)
        .expect("synthetic spec should build");
    let data = bind(values, &spec);
    ChangePointSampler::new(config)
        .expect("test config should validate")
        .sample(&spec, &data, &ExecutionContext::new())
        .expect("sampling should succeed")
}

pub fn small_config(seed: u64) -> SamplerConfig {
    SamplerConfig {
        draws: 200,
        tune: 100,
        chains: 2,
        seed,
        ..SamplerConfig::default()
    }
}

/// Pooled posterior median of break `k`.
pub fn break_median(trace: &Trace, k: usize) -> usize {
    let mut draws: Vec<usize> = trace.samples().map(|sample| sample.breaks()[k]).collect();
    assert!(!draws.is_empty(), "trace should hold draws");
    draws.sort_unstable();
    draws[draws.len() / 2]
}
