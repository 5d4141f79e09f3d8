//! Agent configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Listen address for the ProfilerControl gRPC server
    pub listen_addr: String,

    /// Admin HTTP listen address (health checks + metrics)
    pub admin_addr: String,

    /// Optional bearer token required on every gRPC call
    pub auth_token: Option<String>,

    /// Directory that relative artifact paths are resolved against
    pub output_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_addr: std::env::var("SHUTTER_AGENT_LISTEN")
                .unwrap_or_else(|_| "0.0.0.0:7140".to_string()),
            admin_addr: std::env::var("SHUTTER_ADMIN_LISTEN")
                .unwrap_or_else(|_| "0.0.0.0:9140".to_string()),
            auth_token: std::env::var("SHUTTER_AUTH_TOKEN").ok(),
            output_dir: std::env::var("SHUTTER_OUTPUT_DIR").ok().map(PathBuf::from),
        }
    }
}

impl AgentConfig {
    /// Resolve an artifact path sent by the coordinator.
    pub fn resolve_output(&self, output_path: &str) -> String {
        match &self.output_dir {
            Some(dir) if Path::new(output_path).is_relative() => {
                dir.join(output_path).to_string_lossy().into_owned()
            }
            _ => output_path.to_string(),
        }
    }
}
