//! Run command: a full profiling session

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use shutter_agent::RecordingProfiler;
use shutter_coordinator::{build_grpc_controller, DirectoryConfig, SessionState, WorkloadConfig};
use shutter_shared::utils::{parse_duration, parse_secs};
use shutter_shared::{Endpoint, RoundResult};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::output;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Wait before switching profiling on (e.g. "30s")
    #[arg(long)]
    pub initial_delay: Option<String>,

    /// How long to profile; zero or negative waits for the finish signal
    #[arg(short, long, allow_hyphen_values = true)]
    pub duration: Option<String>,

    /// Harness client id; client 0 coordinates the fleet
    #[arg(long)]
    pub client_id: Option<u32>,

    /// Fleet member (repeatable)
    #[arg(short, long = "endpoint", conflicts_with = "membership")]
    pub endpoints: Vec<String>,

    /// Membership file, one host:port per line
    #[arg(short, long)]
    pub membership: Option<PathBuf>,

    /// Budget for each enable/disable round (e.g. "60s")
    #[arg(long)]
    pub round_timeout: Option<String>,

    /// Address of this process, used to name its own artifact
    #[arg(long)]
    pub local_addr: Option<SocketAddr>,

    /// Directory for artifact paths
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Bearer token presented to agents
    #[arg(long, env = "SHUTTER_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Send the finish signal after this long instead of waiting for Ctrl-C
    #[arg(long)]
    pub finish_after: Option<String>,

    /// Print round reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Write coordinator metrics (Prometheus text) here when done
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Serialize)]
struct SessionReport<'a> {
    success: bool,
    enable: Option<&'a RoundResult>,
    disable: Option<&'a RoundResult>,
    possibly_still_profiling: Vec<Endpoint>,
}

fn resolve_config(args: &RunArgs) -> Result<WorkloadConfig> {
    let mut config = WorkloadConfig::load(args.config.as_deref())?;

    if let Some(delay) = &args.initial_delay {
        config.initial_delay_secs = parse_duration(delay)
            .context("Failed to parse initial delay")?
            .as_secs_f64();
    }
    if let Some(duration) = &args.duration {
        config.duration_secs = parse_secs(duration).context("Failed to parse duration")?;
    }
    if let Some(timeout) = &args.round_timeout {
        config.round_timeout_secs = parse_duration(timeout)
            .context("Failed to parse round timeout")?
            .as_secs_f64();
    }
    if let Some(client_id) = args.client_id {
        config.client_id = client_id;
    }
    if let Some(local_addr) = args.local_addr {
        config.local_addr = local_addr;
    }
    if args.output_dir.is_some() {
        config.output_dir = args.output_dir.clone();
    }
    if args.auth_token.is_some() {
        config.auth_token = args.auth_token.clone();
    }
    if !args.endpoints.is_empty() {
        config.directory = DirectoryConfig::Static {
            endpoints: super::parse_endpoints(&args.endpoints)?,
        };
    }
    if let Some(path) = &args.membership {
        config.directory = DirectoryConfig::File { path: path.clone() };
    }

    config.validate()?;
    Ok(config)
}

async fn finish_signal(finish_after: Option<&str>) -> Result<()> {
    match finish_after {
        Some(after) => {
            let after = parse_duration(after).context("Failed to parse finish-after")?;
            output::info(&format!("Finishing in {:?}", after));
            tokio::time::sleep(after).await;
        }
        None => {
            output::info("Profiling; press Ctrl-C to finish");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }
    Ok(())
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let profiler = Arc::new(RecordingProfiler::new());
    let mut controller = build_grpc_controller(&config, profiler)?;

    controller.start().await?;

    if controller.state() == SessionState::AwaitingFinish {
        finish_signal(args.finish_after.as_deref()).await?;
    }
    let success = controller.finish().await;

    if args.json {
        output::json(&SessionReport {
            success,
            enable: controller.enable_report(),
            disable: controller.disable_report(),
            possibly_still_profiling: controller.possibly_still_profiling(),
        })?;
    } else {
        if let Some(report) = controller.enable_report() {
            output::round(report);
        }
        if let Some(report) = controller.disable_report() {
            output::round(report);
        }
        for endpoint in controller.possibly_still_profiling() {
            output::warning(&format!("{} may still be profiling", endpoint));
        }
    }

    if let Some(path) = &args.metrics_out {
        std::fs::write(path, shutter_coordinator::metrics::encode_metrics())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    if success {
        output::success("Profiler enabled on every endpoint");
        Ok(())
    } else {
        output::error("Profiler was not enabled on every endpoint");
        anyhow::bail!("profiling session failed")
    }
}
