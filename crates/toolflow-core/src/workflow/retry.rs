//! Retry executor: one step invocation with bounded retries.
//!
//! Each attempt runs under its own timeout. Failed attempts back off
//! exponentially (`retry_delay * 2^attempt`, attempt counted from 0) before
//! the next try. Every tool error, unknown tool IDs included, counts as a
//! failed attempt.

use std::time::Duration;

use serde_json::Value;
use toolflow_types::config::RetrySettings;
use toolflow_types::workflow::RetryOverride;

use crate::tool::{BoxToolExecutor, ToolError};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Apply a step's overrides on top of this policy.
    pub fn with_override(mut self, overrides: Option<&RetryOverride>) -> Self {
        if let Some(o) = overrides {
            if let Some(max_retries) = o.max_retries {
                self.max_retries = max_retries;
            }
            if let Some(delay_ms) = o.retry_delay_ms {
                self.retry_delay = Duration::from_millis(delay_ms);
            }
            if let Some(timeout_ms) = o.timeout_ms {
                self.timeout = Duration::from_millis(timeout_ms);
            }
        }
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

// ---------------------------------------------------------------------------
// RetryExecutor
// ---------------------------------------------------------------------------

/// Final result of a step invocation and how many tool calls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub result: Result<Value, ToolError>,
    pub attempts: u32,
}

/// Wraps the tool executor with the retry/timeout loop.
///
/// Cheap to clone; the scheduler hands a clone to every step task.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    tools: BoxToolExecutor,
}

impl RetryExecutor {
    pub fn new(tools: BoxToolExecutor) -> Self {
        Self { tools }
    }

    /// Invoke `tool_id` until it succeeds or the policy runs out of retries.
    /// Exhaustion surfaces the last error.
    pub async fn run_step(&self, tool_id: &str, params: &Value, policy: &RetryPolicy) -> StepOutcome {
        let mut attempt: u32 = 0;
        loop {
            let result =
                match tokio::time::timeout(policy.timeout, self.tools.execute(tool_id, params)).await
                {
                    Ok(result) => result,
                    Err(_elapsed) => Err(ToolError::Timeout(policy.timeout)),
                };
            let attempts = attempt + 1;

            match result {
                Ok(value) => {
                    return StepOutcome {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(err) if attempt >= policy.max_retries => {
                    return StepOutcome {
                        result: Err(err),
                        attempts,
                    };
                }
                Err(err) => {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        tool = tool_id,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "tool call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
