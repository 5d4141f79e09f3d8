//! Deadline guard for dispatch rounds
//!
//! A guard fixes its deadline when it is created, so every wait performed
//! under it (discovery, then the fan-in) shares one budget.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Default per-round budget.
pub const DEFAULT_ROUND_BUDGET: Duration = Duration::from_secs(60);

/// Deadline used when `now + budget` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {budget:?} elapsed")]
pub struct DeadlineElapsed {
    pub budget: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct DeadlineGuard {
    budget: Duration,
    deadline: Instant,
}

impl DeadlineGuard {
    /// Start the clock now.
    pub fn start(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            budget,
            deadline: now.checked_add(budget).unwrap_or(now + FAR_FUTURE),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Wait for `fut`, giving up once the deadline passes. The future is
    /// dropped on timeout; work it spawned keeps running unobserved.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineElapsed> {
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .map_err(|_| DeadlineElapsed {
                budget: self.budget,
            })
    }
}

/// Run `fut` under a fresh guard of `budget`.
pub async fn with_deadline<F: Future>(budget: Duration, fut: F) -> Result<F::Output, DeadlineElapsed> {
    DeadlineGuard::start(budget).run(fut).await
}
