// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Receives fractional progress in `[0, 1]` while a fit runs.
///
/// Sinks are shared across parallel chains and must tolerate concurrent calls.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, fraction: f32);
}

/// Receives named scalar measurements (acceptance rates, step sizes, timings).
pub trait TelemetrySink: Send + Sync {
    fn record_scalar(&self, key: &'static str, value: f64);
}
