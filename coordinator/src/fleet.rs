//! Fleet-wide rounds: discovery on enable, snapshot reuse on disable

use crate::directory::EndpointDirectory;
use crate::dispatch::{self, ToggleDispatcher};
use chrono::Utc;
use shutter_shared::{Endpoint, RoundResult, ToggleError};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::error;

/// What the coordinator needs to reach the rest of the fleet.
pub struct Fleet {
    directory: Arc<dyn EndpointDirectory>,
    dispatcher: ToggleDispatcher,
}

impl Fleet {
    pub fn new(directory: Arc<dyn EndpointDirectory>, dispatcher: ToggleDispatcher) -> Self {
        Self {
            directory,
            dispatcher,
        }
    }

    /// Discover the current membership and switch profiling on across it.
    ///
    /// Discovery and the dispatch share one deadline. Returns the snapshot
    /// the matching disable round must target; it is empty if discovery failed.
    pub async fn enable(&self) -> (Vec<Endpoint>, RoundResult) {
        let started_at = Utc::now();
        let start = Instant::now();
        let guard = self.dispatcher.guard();

        let (reason, timed_out) = match guard.run(self.directory.list_endpoints()).await {
            Ok(Ok(endpoints)) => {
                let result = self.dispatcher.dispatch_guarded(&endpoints, true, &guard).await;
                return (endpoints, result);
            }
            Ok(Err(e)) => (e.to_string(), false),
            Err(_) => {
                let e = ToggleError::RoundTimeout {
                    budget: guard.budget(),
                    outstanding: 0,
                };
                (format!("endpoint discovery: {}", e), true)
            }
        };

        error!("Cannot enable profiler: {}", reason);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let result = RoundResult::aborted(true, reason, timed_out, started_at, elapsed_ms);
        dispatch::conclude(&result, guard.budget());
        (Vec::new(), result)
    }

    /// Switch profiling off on exactly the endpoints a previous enable targeted.
    pub async fn disable(&self, snapshot: &[Endpoint]) -> RoundResult {
        self.dispatcher.dispatch(snapshot, false).await
    }
}
