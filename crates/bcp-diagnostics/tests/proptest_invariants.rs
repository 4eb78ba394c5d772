// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_diagnostics::{effective_sample_size, rhat};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn chains_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..5, 4usize..120).prop_flat_map(|(m, n)| {
        prop::collection::vec(prop::collection::vec(-50.0f64..50.0, n), m)
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        ..ProptestConfig::default()
    })]

    #[test]
    fn ess_is_positive_and_capped_at_draw_count(chains in chains_strategy()) {
        let total = chains.iter().map(Vec::len).sum::<usize>() as f64;
        if let Some(ess) = effective_sample_size(&chains) {
            prop_assert!(ess.is_finite());
            prop_assert!(ess > 0.0);
            prop_assert!(ess <= total);
        }
    }

    #[test]
    fn rhat_is_finite_and_non_negative_when_computable(chains in chains_strategy()) {
        match rhat(&chains).value() {
            Some(value) => {
                prop_assert!(value.is_finite());
                prop_assert!(value >= 0.0);
                prop_assert!(chains.len() >= 2);
            }
            None => prop_assert!(chains.len() < 2 || chains.iter().all(|c| c.iter().all(|v| *v == c[0]))),
        }
    }
}
