// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use bcp_core::{ExecutionContext, ObservationSet, validate_breaks};
use bcp_model::{ChangePointSpec, ModelData, ScalePrior, SegmentPrior};
use bcp_sampler::{BreakMove, ChangePointSampler, SamplerConfig};
use libfuzzer_sys::fuzz_target;

fn build_value(mode_seed: u8, raw_seed: i16) -> f64 {
    let bounded = f64::from(raw_seed) / 64.0;
    match mode_seed % 9 {
        0 => 0.0,
        1 => bounded * 1e150,
        2 => f64::MIN_POSITIVE,
        3 => 1e-300,
        _ => bounded,
    }
}

fn build_segment_prior(kind_seed: u8, value_seed: u8) -> SegmentPrior {
    let value = 0.01 + f64::from(value_seed) / 32.0;
    let scale = match kind_seed % 3 {
        0 => ScalePrior::InverseGamma {
            shape: value,
            rate: value / 4.0,
        },
        1 => ScalePrior::HalfNormal { sd: value },
        _ => ScalePrior::InverseGamma {
            shape: -value,
            rate: 0.0,
        },
    };
    SegmentPrior {
        scale,
        ..SegmentPrior::default()
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let n = common::bounded(cursor.next_u8(), 0, 96);
    let n_breaks = common::bounded(cursor.next_u8(), 0, 6);
    let min_segment_len = common::bounded(cursor.next_u8(), 0, 12);
    let prior = build_segment_prior(cursor.next_u8(), cursor.next_u8());

    let values: Vec<f64> = (0..n)
        .map(|_| build_value(cursor.next_u8(), cursor.next_i16()))
        .collect();

    let Ok(spec) = ChangePointSpec::builder(n_breaks)
        .min_segment_len(min_segment_len)
        .segment_priors(prior)
        .build(n, None)
    else {
        return;
    };
    let Ok(observations) = ObservationSet::from_values(&values) else {
        return;
    };
    let Ok(model_data) = ModelData::bind(&spec, &observations, None) else {
        return;
    };

    let break_move = if cursor.next_u8() & 1 == 0 {
        BreakMove::Enumerate
    } else {
        BreakMove::RandomWalk {
            max_step: common::bounded(cursor.next_u8(), 1, 16),
        }
    };
    let config = SamplerConfig {
        draws: common::bounded(cursor.next_u8(), 1, 8),
        tune: common::bounded(cursor.next_u8(), 0, 8),
        chains: common::bounded(cursor.next_u8(), 1, 3),
        seed: cursor.next_u64(),
        break_move,
        parallel: false,
        ..SamplerConfig::default()
    };
    let Ok(sampler) = ChangePointSampler::new(config) else {
        return;
    };

    if let Ok(trace) = sampler.sample(&spec, &model_data, &ExecutionContext::new()) {
        for sample in trace.samples() {
            assert!(validate_breaks(n, sample.breaks(), spec.min_segment_len()).is_ok());
        }
    }
});
