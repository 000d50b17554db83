//! In-process analysis outcome counters.
//!
//! Counts how analyses were served (external service or deterministic
//! fallback) without keeping any event or task content. Nothing is written
//! to disk.

use crate::prediction::retry::{AttemptState, FallbackReason};
use crate::prediction::strategy::PredictionOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcome counters for the current process.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Analyses completed
    analyses: AtomicU64,
    /// Analyses served by the external service
    external_successes: AtomicU64,
    /// Analyses served by the fallback after an external attempt
    fallbacks: AtomicU64,
    /// Analyses where the external service was disabled
    disabled: AtomicU64,
    /// Backoff waits taken after throttling
    throttle_retries: AtomicU64,
    /// Malformed events skipped
    malformed_events: AtomicU64,
    started_at: DateTime<Utc>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            analyses: AtomicU64::new(0),
            external_successes: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            disabled: AtomicU64::new(0),
            throttle_retries: AtomicU64::new(0),
            malformed_events: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Record a finished analysis.
    pub fn record_analysis(&self, outcome: &PredictionOutcome, malformed_events: usize) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
        self.throttle_retries
            .fetch_add(outcome.waits.len() as u64, Ordering::Relaxed);
        self.malformed_events
            .fetch_add(malformed_events as u64, Ordering::Relaxed);

        match outcome.final_state {
            AttemptState::Succeeded => {
                self.external_successes.fetch_add(1, Ordering::Relaxed);
            }
            AttemptState::FallenBack(FallbackReason::Disabled) => {
                self.disabled.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            analyses: self.analyses.load(Ordering::Relaxed),
            external_successes: self.external_successes.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            disabled: self.disabled.load(Ordering::Relaxed),
            throttle_retries: self.throttle_retries.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Analysis Statistics:\n\
             - Analyses completed: {}\n\
             - Served by generative service: {}\n\
             - Fell back after an external attempt: {}\n\
             - Deterministic only (service disabled): {}\n\
             - Throttling retries: {}\n\
             - Malformed events skipped: {}\n\
             \n\
             Data handling:\n\
             - Events and tasks are analyzed per request and never stored\n\
             - The generative service only sees a truncated digest",
            stats.analyses,
            stats.external_successes,
            stats.fallbacks,
            stats.disabled,
            stats.throttle_retries,
            stats.malformed_events
        )
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.analyses,
            &self.external_successes,
            &self.fallbacks,
            &self.disabled,
            &self.throttle_retries,
            &self.malformed_events,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub analyses: u64,
    pub external_successes: u64,
    pub fallbacks: u64,
    pub disabled: u64,
    pub throttle_retries: u64,
    pub malformed_events: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assessment::PredictionSource;
    use crate::prediction::strategy::PredictionOutput;
    use std::time::Duration;

    fn outcome(state: AttemptState, waits: usize) -> PredictionOutcome {
        PredictionOutcome {
            output: PredictionOutput {
                predictions: Vec::new(),
                interventions: Vec::new(),
            },
            source: if state == AttemptState::Succeeded {
                PredictionSource::External
            } else {
                PredictionSource::Fallback
            },
            final_state: state,
            calls: waits as u32 + 1,
            waits: vec![Duration::from_secs(1); waits],
        }
    }

    #[test]
    fn test_counting() {
        let log = TransparencyLog::new();

        log.record_analysis(&outcome(AttemptState::Succeeded, 2), 1);
        log.record_analysis(
            &outcome(AttemptState::FallenBack(FallbackReason::RetriesExhausted), 3),
            0,
        );
        log.record_analysis(&outcome(AttemptState::FallenBack(FallbackReason::Disabled), 0), 0);

        let stats = log.stats();
        assert_eq!(stats.analyses, 3);
        assert_eq!(stats.external_successes, 1);
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.disabled, 1);
        assert_eq!(stats.throttle_retries, 5);
        assert_eq!(stats.malformed_events, 1);
    }

    #[test]
    fn test_reset() {
        let log = TransparencyLog::new();
        log.record_analysis(&outcome(AttemptState::Succeeded, 1), 4);
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.analyses, 0);
        assert_eq!(stats.malformed_events, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = TransparencyLog::new().summary();
        assert!(summary.contains("Analyses completed: 0"));
        assert!(summary.contains("never stored"));
    }
}
