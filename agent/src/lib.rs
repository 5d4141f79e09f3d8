//! Shutter profiler control agent
//!
//! Runs inside (or alongside) every profiled process and exposes the
//! `ProfilerControl` gRPC service through which a coordinator switches the
//! local profiler on and off.

pub mod audit;
pub mod config;
pub mod metrics;
pub mod profiler;
pub mod server;

pub use config::AgentConfig;
pub use profiler::{LocalProfiler, ProfilerState, RecordingProfiler};

use anyhow::{Context, Result};
use server::grpc::ProfilerControlService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{info, warn};

/// Serve the control and admin endpoints until `shutdown` resolves.
pub async fn run_agent<F>(
    config: AgentConfig,
    profiler: Arc<dyn LocalProfiler>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listen_addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Invalid listen address")?;
    let admin_addr: SocketAddr = config
        .admin_addr
        .parse()
        .context("Invalid admin address")?;

    if config.auth_token.is_none() {
        warn!("No auth token configured; any client can toggle the profiler");
    }

    let admin_profiler = profiler.clone();
    let admin = tokio::spawn(async move {
        if let Err(e) = server::http::serve_admin(admin_addr, admin_profiler).await {
            warn!("Admin HTTP server stopped: {}", e);
        }
    });

    info!("ProfilerControl listening on {}", listen_addr);
    let service = ProfilerControlService::new(profiler, config).into_server();
    let result = Server::builder()
        .add_service(service)
        .serve_with_shutdown(listen_addr, shutdown)
        .await
        .context("gRPC server error");

    admin.abort();
    result
}
