//! Retry policy and failure classification for generation sessions.

use std::sync::Arc;
use std::time::Duration;

use super::session::{GenerationSession, SessionPhase};
use crate::error::LoomError;
use crate::notification::{Notification, NotificationSink};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Retries immediately. Used by tests and batch callers.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry_index` (0 for the first retry).
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_index);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Intentional cancellation. Nothing is reported.
    Suppress,
    /// Try again after `delay`.
    Retry { delay: Duration },
    /// Give up and report `error`.
    Surface(LoomError),
}

/// Classifies attempt failures and reports the ones that end a session.
pub struct RetryCoordinator {
    policy: RetryPolicy,
    notifier: Arc<dyn NotificationSink>,
}

impl RetryCoordinator {
    pub fn new(policy: RetryPolicy, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { policy, notifier }
    }

    /// Decides the fate of a failed attempt.
    ///
    /// The session phase is checked first: once `cancel()` ran, any error
    /// the transport raises afterwards is a consequence of the abort. Only
    /// interrupted streams are charged to the attempt budget.
    pub fn decide(&self, session: &GenerationSession, error: LoomError) -> RetryDecision {
        if session.phase() == SessionPhase::Cancelled || error.is_cancelled() {
            return RetryDecision::Suppress;
        }

        match error {
            LoomError::StreamInterrupted { .. } => {
                let attempts = session.record_attempt();
                if attempts < self.policy.max_attempts {
                    RetryDecision::Retry {
                        delay: self.policy.backoff_delay(attempts - 1),
                    }
                } else {
                    RetryDecision::Surface(error)
                }
            }
            other => RetryDecision::Surface(other),
        }
    }

    /// Moves the session to `Failed` and emits exactly one error
    /// notification. Does nothing if the session already ended.
    pub fn surface(&self, session: &GenerationSession, error: LoomError) -> bool {
        let message = error.to_string();
        let code = error.code();
        if !session.fail(error) {
            return false;
        }
        tracing::warn!(
            session_id = %session.id(),
            attempts = session.attempt_count(),
            code,
            "Generation failed: {}",
            message
        );
        self.notifier.notify(Notification::error(message));
        true
    }
}
