//! Local profiler facility
//!
//! The sampling mechanism itself lives behind [`LocalProfiler`]; this module
//! only tracks which state the process was told to be in and where its
//! profile goes.

use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

/// Switches profiling on or off for the current process.
///
/// Synchronous and infallible from the caller's point of view: failures of
/// the underlying mechanism are reported by the implementation itself.
pub trait LocalProfiler: Send + Sync {
    fn set_profiler_state(&self, enabled: bool, output_path: &str);

    fn state(&self) -> Result<ProfilerState, String>;
}

/// Snapshot of a profiler's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfilerState {
    pub enabled: bool,

    /// Artifact path of the current (or most recent) session
    pub output_path: Option<String>,

    /// Number of sessions started so far
    pub sessions: u64,
}

/// A single call to [`LocalProfiler::set_profiler_state`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub enabled: bool,
    pub output_path: String,
}

/// Profiler facility that records every transition in memory and logs it.
#[derive(Debug, Default)]
pub struct RecordingProfiler {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    state: ProfilerState,
    transitions: Vec<Transition>,
}

impl RecordingProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Result<Vec<Transition>, String> {
        let inner = self.inner.lock().map_err(|e| e.to_string())?;
        Ok(inner.transitions.clone())
    }
}

impl LocalProfiler for RecordingProfiler {
    fn set_profiler_state(&self, enabled: bool, output_path: &str) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(e) => {
                warn!("Profiler state lock poisoned: {}", e);
                return;
            }
        };

        inner.transitions.push(Transition {
            enabled,
            output_path: output_path.to_string(),
        });

        match (inner.state.enabled, enabled) {
            (false, true) => {
                inner.state.sessions += 1;
                info!("Profiler enabled, writing to {}", output_path);
            }
            (true, true) => {
                info!("Profiler already enabled, switching output to {}", output_path);
            }
            (true, false) => info!("Profiler disabled, output at {}", output_path),
            (false, false) => info!("Profiler already disabled"),
        }

        inner.state.enabled = enabled;
        inner.state.output_path = Some(output_path.to_string());
    }

    fn state(&self) -> Result<ProfilerState, String> {
        let inner = self.inner.lock().map_err(|e| e.to_string())?;
        Ok(inner.state.clone())
    }
}
