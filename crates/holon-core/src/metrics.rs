//! Metrics collection for Holon
//!
//! TigerStyle: Explicit metric names with units, type-safe recording.
//!
//! Recording functions are always callable; they only export through
//! OpenTelemetry/Prometheus when the `otel` feature is enabled.

#[cfg(feature = "otel")]
use crate::constants::*;
#[cfg(feature = "otel")]
use once_cell::sync::Lazy;
#[cfg(feature = "otel")]
use opentelemetry::metrics::{Counter, Histogram};
#[cfg(feature = "otel")]
use opentelemetry::{global, KeyValue};

#[cfg(feature = "otel")]
static PASSES_COUNTER: Lazy<Counter<u64>> = Lazy::new(|| {
    global::meter("holon")
        .u64_counter(METRIC_NAME_PASSES_TOTAL)
        .with_description("Total number of scheduling passes")
        .init()
});

#[cfg(feature = "otel")]
static PASS_DURATION_HISTOGRAM: Lazy<Histogram<f64>> = Lazy::new(|| {
    global::meter("holon")
        .f64_histogram(METRIC_NAME_PASS_DURATION_SECONDS)
        .with_description("Scheduling pass duration in seconds")
        .init()
});

#[cfg(feature = "otel")]
static MEMBER_FAULTS_COUNTER: Lazy<Counter<u64>> = Lazy::new(|| {
    global::meter("holon")
        .u64_counter(METRIC_NAME_MEMBER_FAULTS_TOTAL)
        .with_description("Total number of member faults caught")
        .init()
});

#[cfg(feature = "otel")]
static MAILBOX_DELIVERED_COUNTER: Lazy<Counter<u64>> = Lazy::new(|| {
    global::meter("holon")
        .u64_counter(METRIC_NAME_MAILBOX_DELIVERED_TOTAL)
        .with_description("Total number of messages made visible by a synchronize")
        .init()
});

#[cfg(feature = "otel")]
static MAILBOX_REJECTED_COUNTER: Lazy<Counter<u64>> = Lazy::new(|| {
    global::meter("holon")
        .u64_counter(METRIC_NAME_MAILBOX_REJECTED_TOTAL)
        .with_description("Total number of messages rejected by a full mailbox")
        .init()
});

/// Record a scheduling pass
///
/// # Arguments
/// * `stage` - "initialization", "live" or "destruction"
/// * `severity` - Severity of the packed pass outcome
/// * `duration_seconds` - Duration in seconds
#[cfg(feature = "otel")]
pub fn record_pass(stage: &str, severity: &str, duration_seconds: f64) {
    PASSES_COUNTER.add(
        1,
        &[
            KeyValue::new("stage", stage.to_string()),
            KeyValue::new("severity", severity.to_string()),
        ],
    );

    PASS_DURATION_HISTOGRAM.record(
        duration_seconds,
        &[KeyValue::new("stage", stage.to_string())],
    );
}

/// Record a fault caught at the activator boundary
#[cfg(feature = "otel")]
pub fn record_member_fault(stage: &str) {
    MEMBER_FAULTS_COUNTER.add(1, &[KeyValue::new("stage", stage.to_string())]);
}

/// Record messages folded into a live queue
#[cfg(feature = "otel")]
pub fn record_mailbox_delivered(count: u64) {
    MAILBOX_DELIVERED_COUNTER.add(count, &[]);
}

/// Record a message rejected by a full mailbox
#[cfg(feature = "otel")]
pub fn record_mailbox_rejected() {
    MAILBOX_REJECTED_COUNTER.add(1, &[]);
}

// No-op implementations when otel feature is disabled
#[cfg(not(feature = "otel"))]
pub fn record_pass(_stage: &str, _severity: &str, _duration_seconds: f64) {}

#[cfg(not(feature = "otel"))]
pub fn record_member_fault(_stage: &str) {}

#[cfg(not(feature = "otel"))]
pub fn record_mailbox_delivered(_count: u64) {}

#[cfg(not(feature = "otel"))]
pub fn record_mailbox_rejected() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_functions_dont_panic() {
        record_pass("live", "ok", 0.001);
        record_member_fault("initialization");
        record_mailbox_delivered(3);
        record_mailbox_rejected();
    }
}
