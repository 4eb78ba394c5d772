// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use bcp_core::{CancelToken, ProgressSink, TelemetrySink};
use std::sync::Mutex;

/// Cancels its token once reported progress reaches `threshold`.
pub struct CancelAtFraction {
    pub token: CancelToken,
    pub threshold: f32,
    pub seen: Mutex<Vec<f32>>,
}

impl CancelAtFraction {
    pub fn new(token: CancelToken, threshold: f32) -> Self {
        Self {
            token,
            threshold,
            seen: Mutex::new(vec![]),
        }
    }
}

impl ProgressSink for CancelAtFraction {
    fn on_progress(&self, fraction: f32) {
        self.seen
            .lock()
            .expect("progress mutex should lock")
            .push(fraction);
        if fraction >= self.threshold {
            self.token.cancel();
        }
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    pub values: Mutex<Vec<(&'static str, f64)>>,
}

impl RecordingTelemetry {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values
            .lock()
            .expect("telemetry mutex should lock")
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record_scalar(&self, key: &'static str, value: f64) {
        self.values
            .lock()
            .expect("telemetry mutex should lock")
            .push((key, value));
    }
}
