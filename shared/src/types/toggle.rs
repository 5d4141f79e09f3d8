//! Toggle requests, per-endpoint outcomes and round aggregation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::endpoint::Endpoint;

/// Request sent to one endpoint to switch its profiler on or off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,

    /// Where the endpoint writes its profile; unique per endpoint
    pub output_path: String,
}

/// What one endpoint did with one toggle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Acknowledged,
    Failed(String),
    /// No reply before the round's deadline
    TimedOut,
}

impl ToggleOutcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, ToggleOutcome::Acknowledged)
    }

    /// Stable short name, used for metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ToggleOutcome::Acknowledged => "acknowledged",
            ToggleOutcome::Failed(_) => "failed",
            ToggleOutcome::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for ToggleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleOutcome::Acknowledged => write!(f, "acknowledged"),
            ToggleOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            ToggleOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// How the outcomes of a round fold into one verdict.
///
/// Enabling is strict: a process that never started profiling means the
/// profile is incomplete. Disabling is best-effort cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPolicy {
    Strict,
    BestEffort,
}

impl RoundPolicy {
    pub fn for_toggle(enabled: bool) -> Self {
        if enabled {
            RoundPolicy::Strict
        } else {
            RoundPolicy::BestEffort
        }
    }

    /// `round_error` is set when the round itself broke down (deadline hit,
    /// directory unavailable) rather than an individual endpoint.
    pub fn judge<'a, I>(&self, outcomes: I, round_error: bool) -> bool
    where
        I: IntoIterator<Item = &'a ToggleOutcome>,
    {
        match self {
            RoundPolicy::Strict => {
                !round_error && outcomes.into_iter().all(ToggleOutcome::is_acknowledged)
            }
            RoundPolicy::BestEffort => true,
        }
    }
}

/// Outcome for a single endpoint within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOutcome {
    pub endpoint: Endpoint,
    #[serde(flatten)]
    pub outcome: ToggleOutcome,
}

/// Aggregate over every endpoint's outcome for one dispatch round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub enabled: bool,
    pub policy: RoundPolicy,
    pub success: bool,

    /// The deadline elapsed before every endpoint replied
    pub timed_out: bool,

    /// Round-level failure that is not attributable to one endpoint
    pub error: Option<String>,

    /// One entry per endpoint, in dispatch order
    pub outcomes: Vec<EndpointOutcome>,

    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RoundResult {
    /// Fold per-endpoint outcomes into a verdict using the policy implied
    /// by `enabled`.
    pub fn aggregate(
        enabled: bool,
        outcomes: Vec<EndpointOutcome>,
        timed_out: bool,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
    ) -> Self {
        let policy = RoundPolicy::for_toggle(enabled);
        let success = policy.judge(outcomes.iter().map(|o| &o.outcome), timed_out);
        let error = timed_out.then(|| "round deadline elapsed".to_string());
        Self {
            enabled,
            policy,
            success,
            timed_out,
            error,
            outcomes,
            started_at,
            elapsed_ms,
        }
    }

    /// A round that never reached any endpoint. `timed_out` is set when the
    /// deadline ran out before the endpoints were known.
    pub fn aborted(
        enabled: bool,
        error: impl Into<String>,
        timed_out: bool,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
    ) -> Self {
        let policy = RoundPolicy::for_toggle(enabled);
        Self {
            enabled,
            policy,
            success: policy.judge(std::iter::empty::<&ToggleOutcome>(), true),
            timed_out,
            error: Some(error.into()),
            outcomes: Vec::new(),
            started_at,
            elapsed_ms,
        }
    }

    pub fn acknowledged(&self) -> usize {
        self.count(|o| o.is_acknowledged())
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ToggleOutcome::Failed(_)))
    }

    pub fn outstanding(&self) -> usize {
        self.count(|o| matches!(o, ToggleOutcome::TimedOut))
    }

    /// Endpoints that did not acknowledge, whatever the reason.
    pub fn unacknowledged(&self) -> impl Iterator<Item = &Endpoint> {
        self.outcomes
            .iter()
            .filter(|o| !o.outcome.is_acknowledged())
            .map(|o| &o.endpoint)
    }

    pub fn outcome_for(&self, endpoint: &Endpoint) -> Option<&ToggleOutcome> {
        self.outcomes
            .iter()
            .find(|o| &o.endpoint == endpoint)
            .map(|o| &o.outcome)
    }

    fn count(&self, pred: impl Fn(&ToggleOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }
}
