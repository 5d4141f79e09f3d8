//! Utility functions and helpers

use anyhow::Result;
use std::time::Duration;

/// Parse a duration string (e.g., "30s", "5m", "1h", "1.5s")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let secs = parse_secs(s)?;
    if secs < 0.0 {
        anyhow::bail!("Duration must not be negative: {}", s);
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow::anyhow!("Duration out of range: {}", s))
}

/// Like [`parse_duration`] but keeps the sign, for options where a
/// non-positive value carries meaning (e.g. "-1" = until told to stop).
pub fn parse_secs(s: &str) -> Result<f64> {
    let s = s.trim();

    let (num_str, scale) = if let Some(num_str) = s.strip_suffix("ms") {
        (num_str, 0.001)
    } else if let Some(num_str) = s.strip_suffix('s') {
        (num_str, 1.0)
    } else if let Some(num_str) = s.strip_suffix('m') {
        (num_str, 60.0)
    } else if let Some(num_str) = s.strip_suffix('h') {
        (num_str, 3600.0)
    } else {
        // Default to seconds if no suffix
        (s, 1.0)
    };

    let value: f64 = num_str.trim().parse()?;
    if !value.is_finite() {
        anyhow::bail!("Duration must be finite: {}", s);
    }
    Ok(value * scale)
}

/// Convert a seconds value into a positive `Duration`, or `None` when it is
/// zero, negative, not finite, or too large to represent.
pub fn positive_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}
