//! Local toggle: the same switch, applied to this process

use shutter_agent::LocalProfiler;
use shutter_shared::naming::ArtifactNaming;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Applies toggles to the current process's own profiler. Runs on every
/// participant, whatever happened to the fleet-wide round.
pub struct LocalToggle {
    profiler: Arc<dyn LocalProfiler>,
    output_path: String,
}

impl LocalToggle {
    /// The artifact is named after `local_addr`, so it cannot collide with
    /// any other participant's.
    pub fn new(profiler: Arc<dyn LocalProfiler>, local_addr: SocketAddr, naming: &ArtifactNaming) -> Self {
        Self {
            profiler,
            output_path: naming.path_for(local_addr),
        }
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn apply(&self, enabled: bool) {
        debug!("Local profiler -> {} ({})", enabled, self.output_path);
        self.profiler.set_profiler_state(enabled, &self.output_path);
    }
}
