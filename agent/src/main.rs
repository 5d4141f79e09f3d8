//! Shutter Agent
//!
//! Exposes a process's profiler over gRPC so a coordinator can switch it on
//! and off across a fleet.

use anyhow::Result;
use clap::Parser;
use shutter_agent::{run_agent, AgentConfig, RecordingProfiler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "shutter-agent")]
#[command(about = "Remote profiler control endpoint", long_about = None)]
#[command(version)]
struct Args {
    /// gRPC listen address (overrides SHUTTER_AGENT_LISTEN)
    #[arg(short, long)]
    listen: Option<String>,

    /// Admin HTTP listen address (overrides SHUTTER_ADMIN_LISTEN)
    #[arg(long)]
    admin_listen: Option<String>,

    /// Bearer token required from callers (overrides SHUTTER_AUTH_TOKEN)
    #[arg(long)]
    auth_token: Option<String>,

    /// Directory for relative artifact paths (overrides SHUTTER_OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().map_err(|e| anyhow::anyhow!("{}", e))?;

    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = AgentConfig::default();
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(admin) = args.admin_listen {
        config.admin_addr = admin;
    }
    if args.auth_token.is_some() {
        config.auth_token = args.auth_token;
    }
    if args.output_dir.is_some() {
        config.output_dir = args.output_dir;
    }

    info!("Starting Shutter agent");

    let profiler = Arc::new(RecordingProfiler::new());
    run_agent(config, profiler, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
