//! Lifecycle of externally executed work (SQL queries, batch jobs).
//!
//! Queries are driven to completion in-process: submit, then check the state
//! until it is terminal. Checking is bounded by [`PollPolicy::max_attempts`];
//! the delay between checks grows by `multiplier` up to `max_interval`.
//!
//! Batch jobs are never awaited. Their state is reported by a separate
//! invocation using the same [`ExecutionState`] vocabulary.

use crate::error::{ActionError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    Submitted,
    Running,
    Succeeded,
    Failed { reason: Option<String> },
    Cancelled,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed { .. } | ExecutionState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Submitted => "submitted",
            ExecutionState::Running => "running",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::Failed { .. } => "failed",
            ExecutionState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PollPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub multiplier: u32,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2,
            max_interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

impl PollPolicy {
    /// Delay after the `attempt`-th (zero-based) non-terminal check.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_interval;
        for _ in 0..attempt {
            if delay >= self.max_interval {
                break;
            }
            delay = delay.saturating_mul(self.multiplier.max(1));
        }
        delay.min(self.max_interval)
    }
}

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct Poller<'a> {
    policy: &'a PollPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Poller<'a> {
    pub fn new(policy: &'a PollPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Self { policy, sleeper }
    }

    /// Call `check` until it reports a terminal state or the attempt budget
    /// runs out.
    pub async fn until_terminal<F, Fut>(&self, what: &str, mut check: F) -> Result<ExecutionState>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ExecutionState>>,
    {
        let attempts = self.policy.max_attempts;
        for attempt in 0..attempts {
            let state = check().await?;
            if state.is_terminal() {
                debug!(what, attempt, state = %state, "reached terminal state");
                return Ok(state);
            }
            if attempt + 1 < attempts {
                let delay = self.policy.delay_for(attempt);
                debug!(what, attempt, state = %state, delay_ms = delay.as_millis() as u64, "waiting");
                self.sleeper.sleep(delay).await;
            }
        }
        Err(ActionError::PollTimeout {
            what: what.to_string(),
            attempts,
        })
    }
}
