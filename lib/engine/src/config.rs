//! Engine configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables (prefix-free, `__`-separated nesting). Every knob
//! carries a serde default so a bare environment still runs.

use amber_relay_publish::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Seconds between scheduler ticks. Together with queue latency this
    /// bounds how late a firing can start; the default keeps firings well
    /// inside the 60-second delivery window.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// Target upper bound, in seconds, between a scheduled instant and its
    /// firing under normal load.
    #[serde(default = "default_fire_window_seconds")]
    pub fire_window_seconds: u64,

    /// Maximum nodes of one execution running concurrently.
    #[serde(default = "default_worker_capacity")]
    pub worker_capacity: usize,

    /// Per-node deadline in milliseconds.
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// Per-external-call timeout in milliseconds (generator, media store).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Delay before a lock-contended job is offered again, in milliseconds.
    #[serde(default = "default_requeue_delay_ms")]
    pub requeue_delay_ms: u64,

    /// Age in seconds after which an unreleased lock claim is considered
    /// abandoned (coordinator crash) and may be reclaimed.
    #[serde(default = "default_lock_staleness_secs")]
    pub lock_staleness_secs: u64,

    /// Publish retry budget.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Publish retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_retry_max_ms")]
    pub max_delay_ms: u64,
}

fn default_tick_seconds() -> u64 {
    10
}

fn default_fire_window_seconds() -> u64 {
    60
}

fn default_worker_capacity() -> usize {
    4
}

fn default_node_timeout_ms() -> u64 {
    30_000
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_requeue_delay_ms() -> u64 {
    500
}

fn default_lock_staleness_secs() -> u64 {
    300
}

fn default_retry_attempts() -> u32 {
    4
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_ms(),
            max_delay_ms: default_retry_max_ms(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            fire_window_seconds: default_fire_window_seconds(),
            worker_capacity: default_worker_capacity(),
            node_timeout_ms: default_node_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            requeue_delay_ms: default_requeue_delay_ms(),
            lock_staleness_secs: default_lock_staleness_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if present configuration values fail to parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the per-node deadline.
    #[must_use]
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    /// Returns the per-external-call timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Returns the contended-job requeue delay.
    #[must_use]
    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    /// Returns the lock staleness threshold.
    #[must_use]
    pub fn lock_staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_staleness_secs as i64)
    }

    /// Returns the publish retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_seconds, 10);
        assert_eq!(config.fire_window_seconds, 60);
        assert!(config.worker_capacity > 0);
        assert_eq!(config.lock_staleness_secs, 300);
    }

    #[test]
    fn retry_policy_reflects_config() {
        let config = EngineConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }
}
