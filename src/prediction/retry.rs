//! Retry/backoff for the external generative call, as an explicit state machine.
//!
//! ```text
//! NotAttempted --enabled--> Calling(0) --ok--> Succeeded
//!      |                      |   ^
//!   disabled            throttled |backoff elapsed
//!      v                      v   |
//!  FallenBack <--n=max--  Retrying(n+1)
//! ```
//!
//! `Calling(n)` carries the retries already spent, so the service is called
//! at most `max_retries + 1` times. Any non-throttling failure or an invalid
//! response goes straight to `FallenBack`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why the deterministic path was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No credentials or configuration for the external service
    Disabled,
    RetriesExhausted,
    NonRetryable,
    SchemaMismatch,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FallbackReason::Disabled => "external generation disabled",
            FallbackReason::RetriesExhausted => "throttled on every attempt",
            FallbackReason::NonRetryable => "non-retryable failure",
            FallbackReason::SchemaMismatch => "response did not match the schema",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    NotAttempted,
    Calling(u32),
    Retrying(u32),
    Succeeded,
    FallenBack(FallbackReason),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::FallenBack(_))
    }
}

/// Inputs driving [`AttemptState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    Start { enabled: bool },
    Succeeded,
    Throttled,
    Failed,
    Malformed,
    BackoffElapsed,
}

/// Backoff schedule for throttled calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each one after
    #[serde(with = "crate::config::duration_serde")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-based): base, 2×base, 4×base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Worst-case total wait across all retries.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries).fold(Duration::ZERO, |acc, n| acc.saturating_add(self.delay_for(n)))
    }

    /// Next state after `event`. Events that do not apply leave the state unchanged.
    pub fn next(&self, state: AttemptState, event: AttemptEvent) -> AttemptState {
        use AttemptEvent as E;
        use AttemptState as S;

        match (state, event) {
            (S::NotAttempted, E::Start { enabled: true }) => S::Calling(0),
            (S::NotAttempted, E::Start { enabled: false }) => {
                S::FallenBack(FallbackReason::Disabled)
            }
            (S::Calling(_), E::Succeeded) => S::Succeeded,
            (S::Calling(n), E::Throttled) if n < self.max_retries => S::Retrying(n + 1),
            (S::Calling(_), E::Throttled) => S::FallenBack(FallbackReason::RetriesExhausted),
            (S::Calling(_), E::Failed) => S::FallenBack(FallbackReason::NonRetryable),
            (S::Calling(_), E::Malformed) => S::FallenBack(FallbackReason::SchemaMismatch),
            (S::Retrying(n), E::BackoffElapsed) => S::Calling(n),
            (state, _) => state,
        }
    }
}

/// Suspends the caller between retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real waiting on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::RecordingSleeper;

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use super::Sleeper;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records requested waits and returns immediately.
    #[derive(Debug, Default)]
    pub struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn waits(&self) -> Vec<Duration> {
            self.waits.lock().map(|w| w.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            if let Ok(mut waits) = self.waits.lock() {
                waits.push(duration);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.total_backoff(), Duration::from_secs(7));
    }

    #[test]
    fn test_disabled_falls_back_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next(AttemptState::NotAttempted, AttemptEvent::Start { enabled: false }),
            AttemptState::FallenBack(FallbackReason::Disabled)
        );
    }

    #[test]
    fn test_throttle_path_to_exhaustion() {
        let policy = RetryPolicy::default();
        let mut state = policy.next(AttemptState::NotAttempted, AttemptEvent::Start { enabled: true });
        assert_eq!(state, AttemptState::Calling(0));

        for n in 1..=3 {
            state = policy.next(state, AttemptEvent::Throttled);
            assert_eq!(state, AttemptState::Retrying(n));
            state = policy.next(state, AttemptEvent::BackoffElapsed);
            assert_eq!(state, AttemptState::Calling(n));
        }

        state = policy.next(state, AttemptEvent::Throttled);
        assert_eq!(state, AttemptState::FallenBack(FallbackReason::RetriesExhausted));
        assert!(state.is_terminal());
    }

    #[test]
    fn test_non_retryable_and_malformed() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next(AttemptState::Calling(1), AttemptEvent::Failed),
            AttemptState::FallenBack(FallbackReason::NonRetryable)
        );
        assert_eq!(
            policy.next(AttemptState::Calling(0), AttemptEvent::Malformed),
            AttemptState::FallenBack(FallbackReason::SchemaMismatch)
        );
        assert_eq!(
            policy.next(AttemptState::Calling(2), AttemptEvent::Succeeded),
            AttemptState::Succeeded
        );
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next(AttemptState::Succeeded, AttemptEvent::Throttled),
            AttemptState::Succeeded
        );
        let fallen = AttemptState::FallenBack(FallbackReason::NonRetryable);
        assert_eq!(policy.next(fallen, AttemptEvent::Succeeded), fallen);
    }

    #[tokio::test]
    async fn test_recording_sleeper() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(Duration::from_secs(2)).await;
        sleeper.sleep(Duration::from_secs(4)).await;
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }
}
