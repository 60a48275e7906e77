//! Session telemetry. Nothing is emitted unless a sink is installed via
//! `set_telemetry_sink`.

pub mod types;

pub use types::*;

use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Implement this to receive one record per finished relay session.
///
/// Implementations must be thread-safe: `record_session` runs on whichever
/// runtime worker finished the session.
pub trait TelemetrySink: Send + Sync + 'static {
    fn record_session(&self, log: SessionLog);
}

static TELEMETRY_SINK: OnceCell<Arc<dyn TelemetrySink>> = OnceCell::new();

// In tests, gate emission to the calling test thread to avoid cross-test interference.
#[cfg(test)]
thread_local! {
    static TEST_CAPTURE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Install the global sink. Returns `false` if one is already installed.
/// Write-once for the process lifetime.
pub fn set_telemetry_sink(sink: Arc<dyn TelemetrySink>) -> bool {
    TELEMETRY_SINK.set(sink).is_ok()
}

#[inline]
pub(crate) fn emit_session(log: SessionLog) {
    #[cfg(test)]
    {
        if !TEST_CAPTURE.with(|c| c.get()) {
            return;
        }
    }
    if let Some(sink) = TELEMETRY_SINK.get() {
        sink.record_session(log);
    }
}

#[cfg(test)]
/// Test-only: enable or disable capture for the current thread.
pub fn test_set_capture_enabled(enabled: bool) {
    TEST_CAPTURE.with(|c| c.set(enabled));
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_is_gated_per_thread() {
        let sink = test_sink::install();

        emit_session(SessionLog::new().model("gated-model"));
        assert!(sink.logs_for("gated-model").is_empty());

        test_set_capture_enabled(true);
        emit_session(SessionLog::new().model("captured-model"));
        test_set_capture_enabled(false);
        emit_session(SessionLog::new().model("captured-model"));

        assert_eq!(sink.logs_for("captured-model").len(), 1);
    }
}
