//! Engine configuration types for Toolflow.
//!
//! `EngineConfig` represents the top-level `config.toml` that tunes
//! concurrency, retries, the circuit breaker, timeouts, and caching.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workflow::DEFAULT_CONCURRENCY_LIMIT;

/// Top-level configuration for the orchestration engine.
///
/// Loaded from `~/.toolflow/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Concurrency limit for definitions that do not set one.
    #[serde(default = "default_concurrency_limit")]
    pub default_concurrency_limit: u32,

    /// Default retry policy for step invocations.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Per-workflow circuit breaker tuning.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Whole-execution timeout (also the execution lock expiry).
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// TTL for registry and execution cache entries.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Base URL of the tool-routing endpoint used by the HTTP tool executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_endpoint: Option<String>,
}

fn default_concurrency_limit() -> u32 {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_execution_timeout_secs() -> u64 {
    1800
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_concurrency_limit: default_concurrency_limit(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            execution_timeout_secs: default_execution_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            tool_endpoint: None,
        }
    }
}

impl EngineConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Retry policy defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay; attempt `n` waits `retry_delay_ms * 2^n`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Timeout for a single tool invocation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive execution failures before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long the breaker stays open before admitting a trial execution.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_ms() -> u64 {
    60_000
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.default_concurrency_limit, 5);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retry_delay_ms, 1000);
        assert_eq!(config.retry.timeout_ms, 30_000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout_ms, 60_000);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert!(config.tool_endpoint.is_none());
    }

    #[test]
    fn test_engine_config_deserialize_empty() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_deserialize_partial_sections() {
        let toml_str = r#"
execution_timeout_secs = 60
tool_endpoint = "http://localhost:8080/tools"

[retry]
max_retries = 1

[circuit_breaker]
failure_threshold = 2
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.execution_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.retry_delay_ms, 1000);
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.reset_timeout_ms, 60_000);
        assert_eq!(
            config.tool_endpoint.as_deref(),
            Some("http://localhost:8080/tools")
        );
    }
}
