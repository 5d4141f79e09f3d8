//! Audit logging for security and operational events.
//!
//! All events are emitted via `tracing` with a dedicated target so they can be
//! filtered and formatted (e.g. JSON) for audit pipelines.

use tracing::{info, warn};

pub const AUDIT_TARGET: &str = "shutter::audit";

/// Log gRPC authentication success (valid Bearer token or auth disabled).
pub fn grpc_auth_success() {
    info!(
        target: AUDIT_TARGET,
        event = "grpc_auth_success",
        result = "ok",
    );
}

/// Log gRPC authentication failure.
pub fn grpc_auth_failure(reason: &str) {
    warn!(
        target: AUDIT_TARGET,
        event = "grpc_auth_failure",
        result = "denied",
        reason = %reason,
    );
}

/// Log a profiler state change requested over RPC.
pub fn profiler_toggled(enabled: bool, output_path: &str, ok: bool) {
    let result = if ok { "ok" } else { "rejected" };
    info!(
        target: AUDIT_TARGET,
        event = "profiler_toggled",
        enabled = enabled,
        output_path = %output_path,
        result = result,
    );
}

/// Log admin HTTP request (sensitive endpoints: metrics, readiness).
pub fn admin_http_request(path: &str, status: u16) {
    info!(
        target: AUDIT_TARGET,
        event = "admin_http_request",
        path = %path,
        status = %status,
    );
}
