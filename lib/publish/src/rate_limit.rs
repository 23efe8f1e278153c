//! Client-side rate limiting for publish calls.
//!
//! Respects external API constraints before a request leaves the process.
//! Windows are tracked per connection; exhausting a window is reported as a
//! retriable outcome, not an error.

use amber_relay_core::ConnectionId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Rate limit configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration in seconds.
    pub window_seconds: u32,
}

impl RateLimitConfig {
    /// Creates a new rate limit configuration.
    #[must_use]
    pub fn new(max_requests: u32, window_seconds: u32) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    /// Common limit: requests per minute.
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }

    /// Common limit: requests per hour.
    #[must_use]
    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(max_requests, 3600)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed { remaining: u32 },
    /// The window is exhausted; wait before the next attempt.
    Exceeded { retry_after: std::time::Duration },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: DateTime<Utc>,
}

/// A per-connection rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<RwLock<HashMap<ConnectionId, WindowState>>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Checks whether a request for the connection is allowed and, if so,
    /// counts it against the current window.
    pub fn check_and_increment(&self, connection: ConnectionId) -> RateLimitResult {
        let mut state = self.state.write().unwrap();
        let now = Utc::now();
        let window = Duration::seconds(i64::from(self.config.window_seconds));

        let entry = state.entry(connection).or_insert_with(|| WindowState {
            count: 0,
            window_start: now,
        });

        if now - entry.window_start >= window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.config.max_requests {
            let resets_at = entry.window_start + window;
            let retry_after = (resets_at - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            return RateLimitResult::Exceeded { retry_after };
        }

        entry.count += 1;
        RateLimitResult::Allowed {
            remaining: self.config.max_requests - entry.count,
        }
    }

    /// Clears the window for a connection.
    pub fn reset(&self, connection: ConnectionId) {
        self.state.write().unwrap().remove(&connection);
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            state: Arc::clone(&self.state),
        }
    }
}
