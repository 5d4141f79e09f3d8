//! Error taxonomy shared by the coordinator and the agent

use std::time::Duration;
use thiserror::Error;

use crate::types::endpoint::Endpoint;

#[derive(Debug, Clone, Error)]
pub enum ToggleError {
    /// Transport-level failure reaching an endpoint
    #[error("endpoint {endpoint} unreachable: {reason}")]
    EndpointUnreachable { endpoint: Endpoint, reason: String },

    /// The endpoint replied with an explicit negative acknowledgment
    #[error("endpoint {endpoint} rejected toggle: {reason}")]
    ToggleRejected { endpoint: Endpoint, reason: String },

    #[error("round timed out after {budget:?} with {outstanding} endpoint(s) outstanding")]
    RoundTimeout { budget: Duration, outstanding: usize },

    #[error("endpoint directory error: {0}")]
    Directory(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot {action} while {from}")]
    InvalidTransition { from: String, action: &'static str },
}

impl ToggleError {
    /// Short reason string, used when folding into `ToggleOutcome::Failed`.
    pub fn reason(&self) -> String {
        match self {
            ToggleError::EndpointUnreachable { reason, .. }
            | ToggleError::ToggleRejected { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
