// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::control::CancelToken;
use crate::observability::{ProgressSink, TelemetrySink};

/// Unified execution context passed through sampler calls.
#[derive(Clone, Copy, Default)]
pub struct ExecutionContext<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub progress: Option<&'a dyn ProgressSink>,
    pub telemetry: Option<&'a dyn TelemetrySink>,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context with no optional hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the optional cancellation token.
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Sets an optional progress sink.
    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets an optional telemetry sink.
    pub fn with_telemetry_sink(mut self, telemetry: &'a dyn TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Returns true when cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Polls cancellation every `every` iterations.
    ///
    /// When `every` is zero, it is treated as one (always poll).
    pub fn cancelled_at(&self, iteration: usize, every: usize) -> bool {
        let every = every.max(1);
        if !iteration.is_multiple_of(every) {
            return false;
        }
        self.is_cancelled()
    }

    /// Emits clamped progress to the sink, if configured.
    pub fn report_progress(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }

        if let Some(sink) = self.progress {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }

    /// Emits a scalar telemetry value to the sink, if configured.
    pub fn record_scalar(&self, key: &'static str, value: f64) {
        if let Some(sink) = self.telemetry {
            sink.record_scalar(key, value);
        }
    }
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionContext;
    use crate::control::CancelToken;
    use crate::observability::{ProgressSink, TelemetrySink};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockProgressSink {
        values: Mutex<Vec<f32>>,
    }

    impl ProgressSink for MockProgressSink {
        fn on_progress(&self, fraction: f32) {
            self.values
                .lock()
                .expect("progress mutex should lock")
                .push(fraction);
        }
    }

    #[derive(Default)]
    struct MockTelemetrySink {
        values: Mutex<Vec<(&'static str, f64)>>,
    }

    impl TelemetrySink for MockTelemetrySink {
        fn record_scalar(&self, key: &'static str, value: f64) {
            self.values
                .lock()
                .expect("telemetry mutex should lock")
                .push((key, value));
        }
    }

    #[test]
    fn execution_context_new_has_no_hooks() {
        let ctx = ExecutionContext::new();
        assert!(ctx.cancel.is_none());
        assert!(ctx.progress.is_none());
        assert!(ctx.telemetry.is_none());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn is_cancelled_tracks_the_token() {
        let cancel = CancelToken::new();
        let ctx = ExecutionContext::new().with_cancel(&cancel);
        assert!(!ctx.is_cancelled());
        cancel.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn cancelled_at_polls_on_cadence() {
        let cancel = CancelToken::new();
        let ctx = ExecutionContext::new().with_cancel(&cancel);
        cancel.cancel();

        assert!(!ctx.cancelled_at(3, 2));
        assert!(ctx.cancelled_at(4, 2));
        assert!(ctx.cancelled_at(7, 0), "every=0 should behave like every=1");
    }

    #[test]
    fn report_progress_clamps_and_ignores_non_finite_values() {
        let progress = MockProgressSink::default();
        let ctx = ExecutionContext::new().with_progress_sink(&progress);

        ctx.report_progress(-0.2);
        ctx.report_progress(0.25);
        ctx.report_progress(1.2);
        ctx.report_progress(f32::NAN);
        ctx.report_progress(f32::INFINITY);

        let got = progress
            .values
            .lock()
            .expect("progress values should lock")
            .clone();
        assert_eq!(got, vec![0.0, 0.25, 1.0]);
    }

    #[test]
    fn record_scalar_writes_to_telemetry_sink_when_present() {
        let telemetry = MockTelemetrySink::default();
        let ctx = ExecutionContext::new().with_telemetry_sink(&telemetry);

        ctx.record_scalar("acceptance_rate", 0.42);
        ExecutionContext::new().record_scalar("ignored", 1.0);

        let got = telemetry
            .values
            .lock()
            .expect("telemetry values should lock")
            .clone();
        assert_eq!(got, vec![("acceptance_rate", 0.42)]);
    }
}
