//! Fleet-wide profiler toggling
//!
//! The coordinator discovers the fleet once, broadcasts an enable request to
//! every endpoint in parallel under a deadline, and later switches exactly
//! the same endpoints off again. Every participant also toggles its own
//! profiler locally.

pub mod config;
pub mod controller;
pub mod deadline;
pub mod directory;
pub mod dispatch;
pub mod fleet;
pub mod local;
pub mod metrics;
pub mod transport;

pub use config::{DirectoryConfig, Timing, WorkloadConfig};
pub use controller::{Role, SessionState, TimingController};
pub use deadline::{with_deadline, DeadlineElapsed, DeadlineGuard, DEFAULT_ROUND_BUDGET};
pub use directory::{EndpointDirectory, FileDirectory, StaticDirectory};
pub use dispatch::ToggleDispatcher;
pub use fleet::Fleet;
pub use local::LocalToggle;
pub use transport::{GrpcToggleClient, ToggleClient};

use shutter_agent::LocalProfiler;
use shutter_shared::naming::ArtifactNaming;
use shutter_shared::ToggleError;
use std::sync::Arc;
use tracing::info;

/// Wire up a controller from configuration.
///
/// The fleet (directory + dispatcher over `client`) is only built for the
/// coordinating client.
pub fn build_controller(
    config: &WorkloadConfig,
    profiler: Arc<dyn LocalProfiler>,
    client: Arc<dyn ToggleClient>,
) -> Result<TimingController, ToggleError> {
    config.validate()?;

    let role = Role::from_client_id(config.client_id);
    let naming = ArtifactNaming::new(config.output_dir.clone());
    let local = LocalToggle::new(profiler, config.local_addr, &naming);

    let fleet = match role {
        Role::Coordinator => {
            let directory = directory::from_config(&config.directory);
            let dispatcher = ToggleDispatcher::new(client, naming, config.round_timeout());
            Some(Fleet::new(directory, dispatcher))
        }
        Role::Participant => None,
    };

    let timing = config.timing();
    info!(
        "Profiler session: role={:?} initial_delay={:?} duration={}",
        role,
        timing.initial_delay,
        timing
            .duration
            .map(|d| format!("{:?}", d))
            .unwrap_or_else(|| "until finish".to_string())
    );

    TimingController::new(timing, role, local, fleet)
}

/// Controller with the production gRPC transport.
pub fn build_grpc_controller(
    config: &WorkloadConfig,
    profiler: Arc<dyn LocalProfiler>,
) -> Result<TimingController, ToggleError> {
    let client = Arc::new(GrpcToggleClient::new(
        config.connect_timeout(),
        config.auth_token.clone(),
    ));
    build_controller(config, profiler, client)
}
