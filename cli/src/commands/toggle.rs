//! Toggle command: one dispatch round

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use shutter_coordinator::{GrpcToggleClient, ToggleDispatcher};
use shutter_shared::naming::ArtifactNaming;
use shutter_shared::utils::parse_duration;
use std::path::PathBuf;
use std::sync::Arc;

use crate::output;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("switch").required(true).args(["on", "off"])))]
pub struct ToggleArgs {
    /// Switch profiling on
    #[arg(long)]
    pub on: bool,

    /// Switch profiling off
    #[arg(long)]
    pub off: bool,

    /// Target endpoint (repeatable)
    #[arg(short, long = "endpoint", required = true)]
    pub endpoints: Vec<String>,

    /// Budget for the round
    #[arg(long, default_value = "60s")]
    pub round_timeout: String,

    /// Connect timeout per endpoint
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,

    /// Directory for artifact paths
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Bearer token presented to agents
    #[arg(long, env = "SHUTTER_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Print the round report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ToggleArgs) -> Result<()> {
    let endpoints = super::parse_endpoints(&args.endpoints)?;
    let round_timeout =
        parse_duration(&args.round_timeout).context("Failed to parse round timeout")?;
    let connect_timeout =
        parse_duration(&args.connect_timeout).context("Failed to parse connect timeout")?;

    let client = Arc::new(GrpcToggleClient::new(connect_timeout, args.auth_token));
    let dispatcher = ToggleDispatcher::new(
        client,
        ArtifactNaming::new(args.output_dir),
        round_timeout,
    );

    let result = dispatcher.dispatch(&endpoints, args.on).await;

    if args.json {
        output::json(&result)?;
    } else {
        output::round(&result);
    }

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("{} endpoint(s) did not acknowledge", result.unacknowledged().count())
    }
}
