//! Prometheus metrics for dispatch rounds

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use shutter_shared::RoundResult;

pub static ROUNDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "shutter_rounds_total",
        "Dispatch rounds completed",
        &["kind", "result"]
    )
    .unwrap()
});

pub static OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "shutter_outcomes_total",
        "Per-endpoint toggle outcomes",
        &["kind", "outcome"]
    )
    .unwrap()
});

pub static ROUND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "shutter_round_duration_seconds",
        "Time from first request to last reply (or deadline)",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]
    )
    .unwrap()
});

fn kind(enabled: bool) -> &'static str {
    if enabled {
        "enable"
    } else {
        "disable"
    }
}

pub fn record_round(result: &RoundResult) {
    let kind = kind(result.enabled);
    let verdict = if result.success { "success" } else { "failure" };
    ROUNDS_TOTAL.with_label_values(&[kind, verdict]).inc();
    for o in &result.outcomes {
        OUTCOMES_TOTAL
            .with_label_values(&[kind, o.outcome.kind()])
            .inc();
    }
    ROUND_DURATION
        .with_label_values(&[kind])
        .observe(result.elapsed_ms as f64 / 1000.0);
}

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
