//! Per-workflow circuit breaker.
//!
//! Tracks execution outcomes by workflow name and short-circuits new
//! executions after repeated failures. Entries are created lazily on the
//! first failure and live for the lifetime of the engine instance; nothing is
//! persisted.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use toolflow_types::circuit::{CircuitSnapshot, CircuitState};
use toolflow_types::config::CircuitBreakerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit rejects executions before probing.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&CircuitBreakerSettings::default())
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            reset_timeout: Duration::from_millis(settings.reset_timeout_ms),
        }
    }
}

#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    failure_count: u32,
    last_failure: Instant,
    last_failure_at: DateTime<Utc>,
}

/// Failure tracker keyed by workflow name.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    entries: DashMap<String, BreakerEntry>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Whether new executions of `name` must be rejected.
    ///
    /// An open circuit whose reset timeout has elapsed moves to half-open and
    /// admits the caller as a trial execution.
    pub fn is_open(&self, name: &str) -> bool {
        let Some(mut entry) = self.entries.get_mut(name) else {
            return false;
        };
        if entry.state != CircuitState::Open {
            return false;
        }
        if entry.last_failure.elapsed() >= self.config.reset_timeout {
            entry.state = CircuitState::HalfOpen;
            tracing::info!(workflow = name, "circuit half-open, admitting trial execution");
            false
        } else {
            true
        }
    }

    /// Count a failed execution. Opens the circuit at the threshold, or
    /// immediately when the failed execution ran half-open.
    pub fn record_failure(&self, name: &str) {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| BreakerEntry {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: now,
                last_failure_at: Utc::now(),
            });
        entry.failure_count = entry.failure_count.saturating_add(1);
        entry.last_failure = now;
        entry.last_failure_at = Utc::now();

        let should_open = entry.state == CircuitState::HalfOpen
            || entry.failure_count >= self.config.failure_threshold;
        if should_open && entry.state != CircuitState::Open {
            entry.state = CircuitState::Open;
            tracing::warn!(
                workflow = name,
                failures = entry.failure_count,
                "circuit opened"
            );
        }
    }

    /// Count a successful execution: resets the failure count and closes the
    /// circuit.
    pub fn record_success(&self, name: &str) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            if entry.state != CircuitState::Closed {
                tracing::info!(workflow = name, "circuit closed");
            }
            entry.failure_count = 0;
            entry.state = CircuitState::Closed;
        }
    }

    /// Current state for observability. Does not perform the open to
    /// half-open transition; an expired open circuit is reported as
    /// half-open.
    pub fn snapshot(&self, name: &str) -> CircuitSnapshot {
        match self.entries.get(name) {
            Some(entry) => {
                let state = if entry.state == CircuitState::Open
                    && entry.last_failure.elapsed() >= self.config.reset_timeout
                {
                    CircuitState::HalfOpen
                } else {
                    entry.state
                };
                CircuitSnapshot {
                    workflow_name: name.to_string(),
                    state,
                    failure_count: entry.failure_count,
                    last_failure_at: Some(entry.last_failure_at),
                }
            }
            None => CircuitSnapshot {
                workflow_name: name.to_string(),
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: Duration::from_millis(reset_ms),
        })
    }

    #[test]
    fn test_unknown_workflow_is_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open("etl"));
        let snap = cb.snapshot("etl");
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert!(snap.last_failure_at.is_none());
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(3, 60_000);
        cb.record_failure("etl");
        cb.record_failure("etl");
        assert!(!cb.is_open("etl"));
        cb.record_failure("etl");
        assert!(cb.is_open("etl"));
        assert_eq!(cb.snapshot("etl").failure_count, 3);
        assert!(!cb.is_open("other"));
    }

    #[test]
    fn test_half_open_after_reset_timeout_then_closes_on_success() {
        let cb = breaker(1, 30);
        cb.record_failure("etl");
        assert!(cb.is_open("etl"));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cb.snapshot("etl").state, CircuitState::HalfOpen);
        assert!(!cb.is_open("etl"));

        cb.record_success("etl");
        let snap = cb.snapshot("etl");
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
    }

    #[test]
    fn test_half_open_failure_reopens_immediately() {
        let cb = breaker(5, 30);
        for _ in 0..5 {
            cb.record_failure("etl");
        }
        std::thread::sleep(Duration::from_millis(50));
        assert!(!cb.is_open("etl"));

        cb.record_failure("etl");
        assert!(cb.is_open("etl"));
    }

    #[test]
    fn test_success_resets_count_below_threshold() {
        let cb = breaker(2, 60_000);
        cb.record_failure("etl");
        cb.record_success("etl");
        cb.record_failure("etl");
        assert!(!cb.is_open("etl"));
    }
}
