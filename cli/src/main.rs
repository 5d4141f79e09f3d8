//! CLI for Shutter
//!
//! - run: run a profiling session across the fleet (harness workload)
//! - toggle: send a single enable or disable round
//! - state: show each endpoint's profiler state

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "shutter")]
#[command(about = "Shutter - fleet-wide profiler switch", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a timed profiling session across the fleet
    Run(commands::run::RunArgs),

    /// Switch profiling on or off once, on the given endpoints
    Toggle(commands::toggle::ToggleArgs),

    /// Show the profiler state of the given endpoints
    State(commands::state::StateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Toggle(args) => commands::toggle::run(args).await,
        Commands::State(args) => commands::state::run(args).await,
    }
}

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
