//! State command: ask each endpoint what its profiler is doing

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use shutter_coordinator::GrpcToggleClient;
use shutter_shared::utils::parse_duration;

use crate::output;

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Endpoint to query (repeatable)
    #[arg(short, long = "endpoint", required = true)]
    pub endpoints: Vec<String>,

    /// Connect timeout per endpoint
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,

    /// Bearer token presented to agents
    #[arg(long, env = "SHUTTER_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

pub async fn run(args: StateArgs) -> Result<()> {
    let endpoints = super::parse_endpoints(&args.endpoints)?;
    let connect_timeout =
        parse_duration(&args.connect_timeout).context("Failed to parse connect timeout")?;
    let client = GrpcToggleClient::new(connect_timeout, args.auth_token);

    let replies =
        futures::future::join_all(endpoints.iter().map(|endpoint| client.state(endpoint))).await;

    let mut failures = 0;
    for (endpoint, reply) in endpoints.iter().zip(replies) {
        match reply {
            Ok(state) if state.enabled => println!(
                "  {:<24} {} -> {} (sessions: {})",
                endpoint.to_string(),
                "profiling".green(),
                state.output_path,
                state.sessions
            ),
            Ok(state) => println!(
                "  {:<24} {} (sessions: {})",
                endpoint.to_string(),
                "idle".dimmed(),
                state.sessions
            ),
            Err(e) => {
                failures += 1;
                output::error(&format!("{}: {}", endpoint, e));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} endpoint(s) could not be queried", failures);
    }
    Ok(())
}
