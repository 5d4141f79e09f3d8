//! Workload configuration
//!
//! Values come from (in increasing precedence) built-in defaults, an
//! optional TOML file, and `SHUTTER_*` environment variables.

use serde::{Deserialize, Serialize};
use shutter_shared::utils::positive_secs;
use shutter_shared::{Endpoint, ToggleError};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deadline::DEFAULT_ROUND_BUDGET;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Seconds to wait before switching profiling on
    pub initial_delay_secs: f64,

    /// Seconds to profile for; <= 0 means until the harness calls finish
    pub duration_secs: f64,

    /// Budget for each enable/disable round
    pub round_timeout_secs: f64,

    /// Harness client id; client 0 coordinates the fleet
    pub client_id: u32,

    /// Directory for artifact paths handed to endpoints
    pub output_dir: Option<PathBuf>,

    /// This process's address, used to name its own artifact
    pub local_addr: SocketAddr,

    /// Connect timeout for each endpoint
    pub connect_timeout_secs: f64,

    /// Bearer token presented to agents
    pub auth_token: Option<String>,

    /// Where fleet membership comes from
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryConfig {
    Static { endpoints: Vec<Endpoint> },
    File { path: PathBuf },
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig::Static {
            endpoints: Vec::new(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 0.0,
            duration_secs: -1.0,
            round_timeout_secs: DEFAULT_ROUND_BUDGET.as_secs_f64(),
            client_id: 0,
            output_dir: None,
            local_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            connect_timeout_secs: 5.0,
            auth_token: None,
            directory: DirectoryConfig::default(),
        }
    }
}

/// When to switch profiling on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub initial_delay: Duration,

    /// `None` = wait for an explicit finish
    pub duration: Option<Duration>,
}

impl WorkloadConfig {
    /// Load from an optional TOML file plus `SHUTTER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ToggleError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("SHUTTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: WorkloadConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ToggleError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ToggleError> {
        if !self.initial_delay_secs.is_finite() || self.initial_delay_secs < 0.0 {
            return Err(ToggleError::Config(format!(
                "initial_delay_secs must be a non-negative number, got {}",
                self.initial_delay_secs
            )));
        }
        if self.initial_delay_secs > 0.0 && positive_secs(self.initial_delay_secs).is_none() {
            return Err(ToggleError::Config(format!(
                "initial_delay_secs is out of range: {}",
                self.initial_delay_secs
            )));
        }
        if !self.duration_secs.is_finite()
            || (self.duration_secs > 0.0 && positive_secs(self.duration_secs).is_none())
        {
            return Err(ToggleError::Config(format!(
                "duration_secs must be a finite, representable number, got {}",
                self.duration_secs
            )));
        }
        if positive_secs(self.round_timeout_secs).is_none() {
            return Err(ToggleError::Config(format!(
                "round_timeout_secs must be positive, got {}",
                self.round_timeout_secs
            )));
        }
        if positive_secs(self.connect_timeout_secs).is_none() {
            return Err(ToggleError::Config(format!(
                "connect_timeout_secs must be positive, got {}",
                self.connect_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn timing(&self) -> Timing {
        Timing {
            initial_delay: positive_secs(self.initial_delay_secs).unwrap_or(Duration::ZERO),
            duration: positive_secs(self.duration_secs),
        }
    }

    pub fn round_timeout(&self) -> Duration {
        positive_secs(self.round_timeout_secs).unwrap_or(DEFAULT_ROUND_BUDGET)
    }

    pub fn connect_timeout(&self) -> Duration {
        positive_secs(self.connect_timeout_secs).unwrap_or(Duration::from_secs(5))
    }
}
