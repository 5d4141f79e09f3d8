//! Toggle dispatcher: fan one request out to every endpoint, fan the
//! outcomes back in.

use crate::deadline::DeadlineGuard;
use crate::metrics;
use crate::transport::ToggleClient;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use shutter_shared::naming::ArtifactNaming;
use shutter_shared::{
    Endpoint, EndpointOutcome, RoundResult, ToggleError, ToggleOutcome, ToggleRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub struct ToggleDispatcher {
    client: Arc<dyn ToggleClient>,
    naming: ArtifactNaming,
    budget: Duration,
}

impl ToggleDispatcher {
    pub fn new(client: Arc<dyn ToggleClient>, naming: ArtifactNaming, budget: Duration) -> Self {
        Self {
            client,
            naming,
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Start a guard for one round with this dispatcher's budget.
    pub fn guard(&self) -> DeadlineGuard {
        DeadlineGuard::start(self.budget)
    }

    /// Run one round under a fresh deadline.
    pub async fn dispatch(&self, endpoints: &[Endpoint], enabled: bool) -> RoundResult {
        let guard = self.guard();
        self.dispatch_guarded(endpoints, enabled, &guard).await
    }

    /// Run one round under an existing deadline.
    ///
    /// Every endpoint gets exactly one request, issued without waiting on the
    /// others. Each request runs as its own task, so on timeout the round
    /// stops waiting but the requests are not torn down; late replies are
    /// discarded.
    pub async fn dispatch_guarded(
        &self,
        endpoints: &[Endpoint],
        enabled: bool,
        guard: &DeadlineGuard,
    ) -> RoundResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut slots: Vec<Option<ToggleOutcome>> = vec![None; endpoints.len()];

        let mut pending: FuturesUnordered<_> = endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                let client = self.client.clone();
                let endpoint = *endpoint;
                let request = ToggleRequest {
                    enabled,
                    output_path: self.naming.path_for_endpoint(&endpoint),
                };
                debug!("Sending toggle({}) to {} -> {}", enabled, endpoint, request.output_path);
                let task = tokio::spawn(async move { client.toggle(&endpoint, request).await });
                async move { (index, task.await) }
            })
            .collect();

        let timed_out = guard
            .run(async {
                while let Some((index, joined)) = pending.next().await {
                    slots[index] = Some(fold_outcome(joined));
                }
            })
            .await
            .is_err();
        drop(pending);

        let outcomes: Vec<EndpointOutcome> = endpoints
            .iter()
            .zip(slots)
            .map(|(endpoint, slot)| EndpointOutcome {
                endpoint: *endpoint,
                outcome: slot.unwrap_or(ToggleOutcome::TimedOut),
            })
            .collect();

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let result = RoundResult::aggregate(enabled, outcomes, timed_out, started_at, elapsed_ms);
        conclude(&result, guard.budget());
        result
    }
}

fn fold_outcome(joined: Result<Result<(), ToggleError>, JoinError>) -> ToggleOutcome {
    match joined {
        Ok(Ok(())) => ToggleOutcome::Acknowledged,
        Ok(Err(e)) => ToggleOutcome::Failed(e.reason()),
        Err(e) => ToggleOutcome::Failed(format!("request task failed: {}", e)),
    }
}

/// Log and count a finished round, including rounds that never got past
/// discovery.
pub(crate) fn conclude(result: &RoundResult, budget: Duration) {
    report(result, budget);
    metrics::record_round(result);
}

fn report(result: &RoundResult, budget: Duration) {
    let action = if result.enabled { "enable" } else { "disable" };

    for o in &result.outcomes {
        if !o.outcome.is_acknowledged() {
            warn!("Profiler {} on {} {}", action, o.endpoint, o.outcome);
        }
    }

    if result.timed_out {
        let err = ToggleError::RoundTimeout {
            budget,
            outstanding: result.outstanding(),
        };
        if result.enabled {
            error!("Profiler {} round failed: {}", action, err);
        } else {
            warn!("Profiler {} round: {}", action, err);
        }
    }

    info!(
        "DoneSignalingProfiler: {} {}/{} acknowledged in {} ms, success={}",
        action,
        result.acknowledged(),
        result.outcomes.len(),
        result.elapsed_ms,
        result.success
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// How a scripted endpoint reacts.
    #[derive(Debug, Clone)]
    pub enum Behavior {
        Ack,
        AckAfter(Duration),
        Reject(&'static str),
        /// Acknowledges enable, rejects disable
        RejectOff(&'static str),
        Unreachable,
        Hang,
    }

    /// Fake transport that replies per endpoint and records every request.
    #[derive(Default)]
    pub struct ScriptedClient {
        behaviors: HashMap<Endpoint, Behavior>,
        calls: Mutex<Vec<(Endpoint, ToggleRequest)>>,
    }

    impl ScriptedClient {
        pub fn new(behaviors: impl IntoIterator<Item = (Endpoint, Behavior)>) -> Self {
            Self {
                behaviors: behaviors.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(Endpoint, ToggleRequest)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToggleClient for ScriptedClient {
        async fn toggle(&self, endpoint: &Endpoint, request: ToggleRequest) -> Result<(), ToggleError> {
            self.calls.lock().unwrap().push((*endpoint, request.clone()));
            match self.behaviors.get(endpoint).cloned().unwrap_or(Behavior::Ack) {
                Behavior::Ack => Ok(()),
                Behavior::AckAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                Behavior::Reject(reason) => Err(ToggleError::ToggleRejected {
                    endpoint: *endpoint,
                    reason: reason.to_string(),
                }),
                Behavior::RejectOff(reason) if !request.enabled => {
                    Err(ToggleError::ToggleRejected {
                        endpoint: *endpoint,
                        reason: reason.to_string(),
                    })
                }
                Behavior::RejectOff(_) => Ok(()),
                Behavior::Unreachable => Err(ToggleError::EndpointUnreachable {
                    endpoint: *endpoint,
                    reason: "connection refused".to_string(),
                }),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    pub fn ep(name: u8) -> Endpoint {
        format!("10.0.0.{}:4500", name).parse().unwrap()
    }

    fn dispatcher(client: Arc<ScriptedClient>) -> ToggleDispatcher {
        ToggleDispatcher::new(client, ArtifactNaming::default(), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_acknowledge_for_any_fleet_size() {
        for n in 0..6u8 {
            let endpoints: Vec<Endpoint> = (1..=n).map(ep).collect();
            let client = Arc::new(ScriptedClient::default());
            let result = dispatcher(client.clone()).dispatch(&endpoints, true).await;

            assert!(result.success, "fleet of {} should succeed", n);
            assert_eq!(result.outcomes.len(), n as usize);
            assert_eq!(client.calls().len(), n as usize);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_round_is_immediate_success() {
        let client = Arc::new(ScriptedClient::default());
        let result = dispatcher(client).dispatch(&[], true).await;
        assert!(result.success);
        assert!(!result.timed_out);
        assert_eq!(result.elapsed_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_failure_fails_enable_but_all_are_observed() {
        let endpoints = vec![ep(1), ep(2), ep(3), ep(4)];
        let client = Arc::new(ScriptedClient::new([
            (ep(2), Behavior::Reject("profiler unavailable")),
            (ep(4), Behavior::AckAfter(Duration::from_secs(5))),
        ]));
        let result = dispatcher(client.clone()).dispatch(&endpoints, true).await;

        assert!(!result.success);
        assert_eq!(result.outcomes.len(), 4);
        assert_eq!(result.acknowledged(), 3);
        assert_eq!(
            result.outcome_for(&ep(2)),
            Some(&ToggleOutcome::Failed("profiler unavailable".to_string()))
        );
        assert_eq!(result.outcome_for(&ep(4)), Some(&ToggleOutcome::Acknowledged));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_maps_to_failed() {
        let client = Arc::new(ScriptedClient::new([(ep(1), Behavior::Unreachable)]));
        let result = dispatcher(client).dispatch(&[ep(1)], true).await;
        assert_eq!(
            result.outcome_for(&ep(1)),
            Some(&ToggleOutcome::Failed("connection refused".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_round_always_succeeds() {
        let endpoints = vec![ep(1), ep(2), ep(3)];
        let client = Arc::new(ScriptedClient::new([
            (ep(1), Behavior::Unreachable),
            (ep(2), Behavior::Reject("not profiling")),
            (ep(3), Behavior::Hang),
        ]));
        let result = dispatcher(client.clone()).dispatch(&endpoints, false).await;

        assert!(result.success);
        assert_eq!(result.acknowledged(), 0);
        assert_eq!(client.calls().len(), 3);
        assert!(client.calls().iter().all(|(_, req)| !req.enabled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_marks_stragglers_timed_out() {
        let endpoints = vec![ep(1), ep(2), ep(3)];
        let client = Arc::new(ScriptedClient::new([(ep(3), Behavior::Hang)]));
        let start = Instant::now();
        let result = dispatcher(client).dispatch(&endpoints, true).await;

        assert!(!result.success);
        assert!(result.timed_out);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(61));
        assert_eq!(result.outcome_for(&ep(1)), Some(&ToggleOutcome::Acknowledged));
        assert_eq!(result.outcome_for(&ep(2)), Some(&ToggleOutcome::Acknowledged));
        assert_eq!(result.outcome_for(&ep(3)), Some(&ToggleOutcome::TimedOut));
        assert_eq!(result.outstanding(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reply_past_deadline_is_timed_out() {
        let endpoints = vec![ep(1), ep(2)];
        let client = Arc::new(ScriptedClient::new([
            (ep(1), Behavior::AckAfter(Duration::from_secs(90))),
            (ep(2), Behavior::AckAfter(Duration::from_secs(61))),
        ]));
        let result = dispatcher(client).dispatch(&endpoints, true).await;
        assert_eq!(result.outstanding(), 2);
        assert!(!result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_issued_concurrently() {
        let endpoints: Vec<Endpoint> = (1..=10).map(ep).collect();
        let client = Arc::new(ScriptedClient::new(
            endpoints
                .iter()
                .map(|e| (*e, Behavior::AckAfter(Duration::from_secs(30)))),
        ));
        let start = Instant::now();
        let result = dispatcher(client).dispatch(&endpoints, true).await;

        assert!(result.success);
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_paths_are_per_endpoint() {
        let endpoints = vec![ep(1), ep(2)];
        let client = Arc::new(ScriptedClient::default());
        dispatcher(client.clone()).dispatch(&endpoints, true).await;

        let mut paths: Vec<String> = client
            .calls()
            .into_iter()
            .map(|(_, req)| req.output_path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["10.0.0.1.4500.prof", "10.0.0.2.4500.prof"]);
    }
}
