//! Timing controller
//!
//! Sequences one profiling session: wait, switch on, then switch off either
//! after a fixed duration or when the harness says the run is finished.
//!
//! ```text
//! Idle -> AwaitingStart -> Enabling -> Enabled -> AwaitingStop   -> Disabling -> Disabled
//!                                             \-> AwaitingFinish -/
//! ```

use crate::config::Timing;
use crate::fleet::Fleet;
use crate::local::LocalToggle;
use shutter_shared::{Endpoint, RoundResult, ToggleError};
use std::fmt;
use tracing::{debug, info, warn};

/// Which part a process plays in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Discovers the fleet and dispatches rounds to it
    Coordinator,
    /// Only toggles its own profiler
    Participant,
}

impl Role {
    pub fn from_client_id(client_id: u32) -> Self {
        if client_id == 0 {
            Role::Coordinator
        } else {
            Role::Participant
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingStart,
    Enabling,
    Enabled,
    AwaitingStop,
    AwaitingFinish,
    Disabling,
    Disabled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingStart => "awaiting start",
            SessionState::Enabling => "enabling",
            SessionState::Enabled => "enabled",
            SessionState::AwaitingStop => "awaiting stop",
            SessionState::AwaitingFinish => "awaiting finish",
            SessionState::Disabling => "disabling",
            SessionState::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

pub struct TimingController {
    timing: Timing,
    role: Role,
    local: LocalToggle,
    fleet: Option<Fleet>,
    state: SessionState,

    /// Endpoints targeted by the enable round; reused verbatim to disable
    snapshot: Option<Vec<Endpoint>>,

    success: bool,
    enable_report: Option<RoundResult>,
    disable_report: Option<RoundResult>,
}

impl TimingController {
    /// A coordinator must be given the fleet; a participant must not.
    pub fn new(
        timing: Timing,
        role: Role,
        local: LocalToggle,
        fleet: Option<Fleet>,
    ) -> Result<Self, ToggleError> {
        match (role, fleet.is_some()) {
            (Role::Coordinator, false) => {
                return Err(ToggleError::Config(
                    "the coordinator needs a fleet to dispatch to".to_string(),
                ))
            }
            (Role::Participant, true) => {
                return Err(ToggleError::Config(
                    "only the coordinator dispatches to the fleet".to_string(),
                ))
            }
            _ => {}
        }

        let mut controller = Self {
            timing,
            role,
            local,
            fleet,
            state: SessionState::Idle,
            snapshot: None,
            success: true,
            enable_report: None,
            disable_report: None,
        };
        controller.transition(SessionState::AwaitingStart);
        Ok(controller)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The verdict of the enable round. Disable rounds never change it.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Endpoint snapshot of the live session, if any.
    pub fn snapshot(&self) -> Option<&[Endpoint]> {
        self.snapshot.as_deref()
    }

    pub fn enable_report(&self) -> Option<&RoundResult> {
        self.enable_report.as_ref()
    }

    pub fn disable_report(&self) -> Option<&RoundResult> {
        self.disable_report.as_ref()
    }

    /// Endpoints that did not acknowledge being switched off, and so may
    /// still be profiling.
    pub fn possibly_still_profiling(&self) -> Vec<Endpoint> {
        self.disable_report
            .as_ref()
            .map(|r| r.unacknowledged().copied().collect())
            .unwrap_or_default()
    }

    /// Run the timed part of the session.
    ///
    /// Returns once profiling is on and, with a fixed duration, once it is off
    /// again. Round failures are folded into [`success`](Self::success); only
    /// calling this twice is an error.
    pub async fn start(&mut self) -> Result<(), ToggleError> {
        if self.state != SessionState::AwaitingStart {
            return Err(ToggleError::InvalidTransition {
                from: self.state.to_string(),
                action: "start",
            });
        }

        tokio::time::sleep(self.timing.initial_delay).await;
        self.enable().await;

        match self.timing.duration {
            Some(duration) => {
                self.transition(SessionState::AwaitingStop);
                tokio::time::sleep(duration).await;
                self.disable().await;
            }
            None => self.transition(SessionState::AwaitingFinish),
        }
        Ok(())
    }

    /// The harness's completion signal. Switches profiling off if the session
    /// is waiting for it; otherwise does nothing. Returns the session verdict.
    pub async fn finish(&mut self) -> bool {
        if self.state == SessionState::AwaitingFinish {
            self.disable().await;
        } else {
            debug!("Finish signal ignored while {}", self.state);
        }
        self.success
    }

    async fn enable(&mut self) {
        self.transition(SessionState::Enabling);

        if let Some(fleet) = &self.fleet {
            info!("SignalProfilerOn");
            let (snapshot, report) = fleet.enable().await;
            self.success = report.success;
            self.snapshot = Some(snapshot);
            self.enable_report = Some(report);
        }
        self.local.apply(true);

        self.transition(SessionState::Enabled);
    }

    async fn disable(&mut self) {
        self.transition(SessionState::Disabling);

        if let Some(fleet) = &self.fleet {
            info!("SignalProfilerOff");
            let snapshot = self.snapshot.take().unwrap_or_default();
            let report = fleet.disable(&snapshot).await;
            self.disable_report = Some(report);
        }
        self.local.apply(false);

        let lingering = self.possibly_still_profiling();
        if !lingering.is_empty() {
            warn!(
                "{} endpoint(s) may still be profiling: {:?}",
                lingering.len(),
                lingering
            );
        }

        self.transition(SessionState::Disabled);
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Profiler session: {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{EndpointDirectory, StaticDirectory};
    use crate::dispatch::tests::{ep, Behavior, ScriptedClient};
    use crate::dispatch::ToggleDispatcher;
    use async_trait::async_trait;
    use shutter_agent::{LocalProfiler, RecordingProfiler};
    use shutter_shared::naming::ArtifactNaming;
    use shutter_shared::ToggleOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Directory whose membership changes after every query.
    struct ChurningDirectory {
        generations: Mutex<Vec<Vec<Endpoint>>>,
        queries: AtomicUsize,
    }

    impl ChurningDirectory {
        fn new(generations: Vec<Vec<Endpoint>>) -> Self {
            Self {
                generations: Mutex::new(generations),
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EndpointDirectory for ChurningDirectory {
        async fn list_endpoints(&self) -> Result<Vec<Endpoint>, ToggleError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            let mut generations = self.generations.lock().unwrap();
            if generations.len() > 1 {
                Ok(generations.remove(0))
            } else {
                Ok(generations[0].clone())
            }
        }
    }

    struct FailingDirectory;

    #[async_trait]
    impl EndpointDirectory for FailingDirectory {
        async fn list_endpoints(&self) -> Result<Vec<Endpoint>, ToggleError> {
            Err(ToggleError::Directory("cluster controller unavailable".to_string()))
        }
    }

    struct Harness {
        client: Arc<ScriptedClient>,
        profiler: Arc<RecordingProfiler>,
        controller: TimingController,
    }

    fn timing(initial_delay: u64, duration: Option<u64>) -> Timing {
        Timing {
            initial_delay: Duration::from_secs(initial_delay),
            duration: duration.map(Duration::from_secs),
        }
    }

    fn coordinator(
        timing: Timing,
        directory: Arc<dyn EndpointDirectory>,
        client: ScriptedClient,
    ) -> Harness {
        let client = Arc::new(client);
        let profiler = Arc::new(RecordingProfiler::new());
        let naming = ArtifactNaming::default();
        let dispatcher =
            ToggleDispatcher::new(client.clone(), naming.clone(), Duration::from_secs(60));
        let local = LocalToggle::new(profiler.clone(), "10.9.9.9:4000".parse().unwrap(), &naming);
        let controller = TimingController::new(
            timing,
            Role::Coordinator,
            local,
            Some(Fleet::new(directory, dispatcher)),
        )
        .unwrap();
        Harness {
            client,
            profiler,
            controller,
        }
    }

    fn static_fleet(endpoints: Vec<Endpoint>) -> Arc<dyn EndpointDirectory> {
        Arc::new(StaticDirectory::new(endpoints))
    }

    fn calls_with(client: &ScriptedClient, enabled: bool) -> Vec<Endpoint> {
        let mut eps: Vec<Endpoint> = client
            .calls()
            .into_iter()
            .filter(|(_, req)| req.enabled == enabled)
            .map(|(ep, _)| ep)
            .collect();
        eps.sort();
        eps
    }

    #[test]
    fn test_role_from_client_id() {
        assert_eq!(Role::from_client_id(0), Role::Coordinator);
        assert_eq!(Role::from_client_id(1), Role::Participant);
    }

    #[test]
    fn test_construction_awaits_start() {
        let h = coordinator(timing(0, None), static_fleet(vec![]), ScriptedClient::default());
        assert_eq!(h.controller.state(), SessionState::AwaitingStart);
        assert_eq!(h.controller.role(), Role::Coordinator);
    }

    #[test]
    fn test_role_and_fleet_must_agree() {
        let profiler: Arc<dyn LocalProfiler> = Arc::new(RecordingProfiler::new());
        let local = LocalToggle::new(
            profiler,
            "10.9.9.9:4000".parse().unwrap(),
            &ArtifactNaming::default(),
        );
        let result = TimingController::new(timing(0, None), Role::Coordinator, local, None);
        assert!(matches!(result, Err(ToggleError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_duration_session() {
        let mut h = coordinator(
            timing(10, Some(30)),
            static_fleet(vec![ep(1), ep(2)]),
            ScriptedClient::default(),
        );
        let start = Instant::now();
        h.controller.start().await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(40));
        assert_eq!(h.controller.state(), SessionState::Disabled);
        assert!(h.controller.success());
        assert_eq!(calls_with(&h.client, true), vec![ep(1), ep(2)]);
        assert_eq!(calls_with(&h.client, false), vec![ep(1), ep(2)]);
        assert!(h.controller.snapshot().is_none());

        let transitions = h.profiler.transitions().unwrap();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].output_path, "10.9.9.9.4000.prof");
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_does_not_trigger_fixed_duration_disable() {
        let mut h = coordinator(
            timing(0, Some(30)),
            static_fleet(vec![ep(1)]),
            ScriptedClient::default(),
        );
        h.controller.start().await.unwrap();
        let calls_before = h.client.calls().len();

        assert!(h.controller.finish().await);
        assert_eq!(h.client.calls().len(), calls_before);
        assert_eq!(h.controller.state(), SessionState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_finish_session() {
        let mut h = coordinator(
            timing(5, None),
            static_fleet(vec![ep(1), ep(2), ep(3)]),
            ScriptedClient::default(),
        );
        h.controller.start().await.unwrap();

        assert_eq!(h.controller.state(), SessionState::AwaitingFinish);
        assert!(calls_with(&h.client, false).is_empty());
        assert_eq!(h.controller.snapshot().map(<[Endpoint]>::len), Some(3));

        // Time passing alone never disables.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(calls_with(&h.client, false).is_empty());

        assert!(h.controller.finish().await);
        assert_eq!(h.controller.state(), SessionState::Disabled);
        assert_eq!(calls_with(&h.client, false).len(), 3);

        // A second finish is a no-op.
        assert!(h.controller.finish().await);
        assert_eq!(calls_with(&h.client, false).len(), 3);
        assert_eq!(h.controller.state(), SessionState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_reuses_enable_snapshot_under_churn() {
        let directory = Arc::new(ChurningDirectory::new(vec![
            vec![ep(1), ep(2), ep(3)],
            vec![ep(2), ep(3), ep(4), ep(5)],
        ]));
        let mut h = coordinator(timing(0, None), directory.clone(), ScriptedClient::default());

        h.controller.start().await.unwrap();
        h.controller.finish().await;

        assert_eq!(directory.queries.load(Ordering::SeqCst), 1);
        assert_eq!(calls_with(&h.client, true), vec![ep(1), ep(2), ep(3)]);
        assert_eq!(calls_with(&h.client, false), vec![ep(1), ep(2), ep(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_failure_is_the_reported_verdict() {
        let mut h = coordinator(
            timing(0, None),
            static_fleet(vec![ep(1), ep(2), ep(3)]),
            ScriptedClient::new([(ep(3), Behavior::Hang)]),
        );
        h.controller.start().await.unwrap();

        let report = h.controller.enable_report().unwrap();
        assert!(report.timed_out);
        assert_eq!(report.outcome_for(&ep(1)), Some(&ToggleOutcome::Acknowledged));
        assert_eq!(report.outcome_for(&ep(2)), Some(&ToggleOutcome::Acknowledged));
        assert_eq!(report.outcome_for(&ep(3)), Some(&ToggleOutcome::TimedOut));
        assert_eq!(h.controller.state(), SessionState::AwaitingFinish);

        // Local profiling still switched on despite the failed round.
        assert!(h.profiler.state().unwrap().enabled);

        assert!(!h.controller.finish().await);
        assert_eq!(h.controller.possibly_still_profiling(), vec![ep(3)]);
        assert!(h.controller.disable_report().unwrap().success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_failures_do_not_change_verdict() {
        let mut h = coordinator(
            timing(0, Some(10)),
            static_fleet(vec![ep(1), ep(2)]),
            ScriptedClient::new([(ep(2), Behavior::RejectOff("not profiling"))]),
        );
        h.controller.start().await.unwrap();

        assert_eq!(h.controller.state(), SessionState::Disabled);
        assert!(h.controller.success());
        assert!(h.controller.disable_report().unwrap().success);
        assert_eq!(h.controller.possibly_still_profiling(), vec![ep(2)]);
        assert!(!h.profiler.state().unwrap().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_failure_fails_enable() {
        let mut h = coordinator(
            timing(0, None),
            Arc::new(FailingDirectory),
            ScriptedClient::default(),
        );
        let failed_enables = || {
            crate::metrics::ROUNDS_TOTAL
                .with_label_values(&["enable", "failure"])
                .get()
        };
        let before = failed_enables();
        h.controller.start().await.unwrap();

        assert!(failed_enables() >= before + 1.0);
        let report = h.controller.enable_report().unwrap();
        assert!(!report.timed_out);
        assert!(report.error.as_deref().unwrap().contains("cluster controller unavailable"));
        assert!(!h.controller.success());
        assert!(h.client.calls().is_empty());
        assert_eq!(h.controller.snapshot().map(<[Endpoint]>::len), Some(0));
        assert!(!h.controller.finish().await);
        assert_eq!(h.controller.state(), SessionState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let mut h = coordinator(timing(0, Some(1)), static_fleet(vec![]), ScriptedClient::default());
        h.controller.start().await.unwrap();
        let err = h.controller.start().await.unwrap_err();
        assert!(matches!(err, ToggleError::InvalidTransition { action: "start", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_participant_only_toggles_itself() {
        let profiler = Arc::new(RecordingProfiler::new());
        let local = LocalToggle::new(
            profiler.clone(),
            "10.9.9.10:4000".parse().unwrap(),
            &ArtifactNaming::default(),
        );
        let mut controller =
            TimingController::new(timing(2, None), Role::Participant, local, None).unwrap();

        controller.start().await.unwrap();
        assert!(profiler.state().unwrap().enabled);
        assert!(controller.enable_report().is_none());

        assert!(controller.finish().await);
        assert!(!profiler.state().unwrap().enabled);
        assert_eq!(
            profiler.state().unwrap().output_path.as_deref(),
            Some("10.9.9.10.4000.prof")
        );
    }
}
