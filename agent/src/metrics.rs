//! Prometheus metrics for the agent

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder};

pub static TOGGLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "shutter_agent_toggles_total",
        "Toggle RPCs handled by this agent",
        &["state", "result"]
    )
    .unwrap()
});

pub static PROFILING: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "shutter_agent_profiling",
        "1 while the local profiler is enabled"
    )
    .unwrap()
});

/// Record one handled toggle.
pub fn record_toggle(enabled: bool, ok: bool) {
    let state = if enabled { "on" } else { "off" };
    let result = if ok { "ok" } else { "rejected" };
    TOGGLES_TOTAL.with_label_values(&[state, result]).inc();
    if ok {
        PROFILING.set(if enabled { 1.0 } else { 0.0 });
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_toggle_shows_up_in_export() {
        record_toggle(true, true);
        let text = encode_metrics();
        assert!(text.contains("shutter_agent_toggles_total"));
        assert!(text.contains("shutter_agent_profiling"));
    }
}
