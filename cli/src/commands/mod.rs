//! Subcommands

pub mod run;
pub mod state;
pub mod toggle;

use anyhow::{Context, Result};
use shutter_shared::Endpoint;

/// Parse `--endpoint` values.
pub fn parse_endpoints(values: &[String]) -> Result<Vec<Endpoint>> {
    values
        .iter()
        .map(|v| {
            v.parse::<Endpoint>()
                .with_context(|| format!("Invalid endpoint '{}'", v))
        })
        .collect()
}
