//! The delivery driver: retry with exponential backoff.
//!
//! Retry budgets travel in the policy passed to each delivery, not in
//! ambient middleware. Transient failures are retried up to the ceiling and
//! then surface as a permanent failure; permanent failures are never
//! retried.

use crate::connection::ConnectionHandle;
use crate::error::PublishError;
use crate::format::FormattedPost;
use crate::publisher::{PublishReceipt, Publisher};
use crate::rate_limit::{RateLimitResult, RateLimiter};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry budget for one delivery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given ceiling and delays.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Returns the backoff delay before retrying after `attempt` (1-based).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(500), Duration::from_secs(30))
    }
}

/// Delivers a post, retrying transient failures with exponential backoff.
///
/// The dedupe key makes retried attempts safe: a conforming publisher never
/// posts the same key twice. A rate-limiter window exhaustion counts as a
/// transient outcome and waits for the window (bounded by the backoff cap).
///
/// # Errors
///
/// Returns a permanent failure immediately, or once the transient retry
/// ceiling is exhausted.
pub async fn deliver(
    publisher: &dyn Publisher,
    post: &FormattedPost,
    connection: &ConnectionHandle,
    dedupe_key: &str,
    policy: RetryPolicy,
    limiter: Option<&RateLimiter>,
) -> Result<PublishReceipt, PublishError> {
    let mut last_transient = String::new();

    for attempt in 1..=policy.max_attempts {
        if let Some(limiter) = limiter
            && let RateLimitResult::Exceeded { retry_after } =
                limiter.check_and_increment(connection.id)
        {
            last_transient = "local rate limit window exhausted".to_string();
            tracing::warn!(
                connection = %connection.id,
                attempt,
                "rate limit window exhausted before publish"
            );
            if attempt < policy.max_attempts {
                tokio::time::sleep(retry_after.min(policy.max_delay)).await;
            }
            continue;
        }

        match publisher.publish(post, connection, dedupe_key).await {
            Ok(receipt) => return Ok(receipt),
            Err(PublishError::Transient {
                reason,
                retry_after,
            }) => {
                tracing::warn!(
                    platform = %post.platform,
                    connection = %connection.id,
                    attempt,
                    %reason,
                    "transient publish failure"
                );
                last_transient = reason;
                if attempt < policy.max_attempts {
                    let delay = retry_after.unwrap_or_else(|| policy.backoff_delay(attempt));
                    tokio::time::sleep(delay.min(policy.max_delay)).await;
                }
            }
            Err(permanent @ PublishError::Permanent { .. }) => {
                tracing::error!(
                    platform = %post.platform,
                    connection = %connection.id,
                    attempt,
                    error = %permanent,
                    "permanent publish failure"
                );
                return Err(permanent);
            }
        }
    }

    Err(PublishError::Permanent {
        reason: format!(
            "gave up after {} attempts; last transient failure: {last_transient}",
            policy.max_attempts
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{FailingPublisher, ScriptedPublisher};
    use crate::rate_limit::RateLimitConfig;
    use amber_relay_core::ConnectionId;
    use amber_relay_workflow::Platform;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5))
    }

    fn sample_post() -> FormattedPost {
        FormattedPost {
            platform: Platform::X,
            text: "hello".to_string(),
            media: vec![],
        }
    }

    fn connection() -> ConnectionHandle {
        ConnectionHandle::valid(ConnectionId::new(), Platform::X)
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_to_success() {
        let publisher = ScriptedPublisher::new(vec![
            Err(PublishError::Transient {
                reason: "503".to_string(),
                retry_after: None,
            }),
            Err(PublishError::Transient {
                reason: "network".to_string(),
                retry_after: Some(Duration::from_millis(1)),
            }),
            Ok(()),
        ]);

        let receipt = deliver(
            &publisher,
            &sample_post(),
            &connection(),
            "exec_1:node_1",
            fast_policy(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(publisher.attempts(), 3);
        assert_eq!(receipt.dedupe_key, "exec_1:node_1");
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let publisher = FailingPublisher::new(PublishError::from_http_status(401, "expired"));

        let result = deliver(
            &publisher,
            &sample_post(),
            &connection(),
            "exec_1:node_1",
            fast_policy(),
            None,
        )
        .await;

        assert!(matches!(result, Err(PublishError::Permanent { .. })));
        assert_eq!(publisher.attempts(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_become_permanent() {
        let publisher = FailingPublisher::new(PublishError::Transient {
            reason: "always 503".to_string(),
            retry_after: None,
        });

        let result = deliver(
            &publisher,
            &sample_post(),
            &connection(),
            "exec_1:node_1",
            fast_policy(),
            None,
        )
        .await;

        assert_eq!(publisher.attempts(), 3);
        match result {
            Err(PublishError::Permanent { reason }) => {
                assert!(reason.contains("3 attempts"));
                assert!(reason.contains("always 503"));
            }
            other => panic!("expected permanent failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_local_window_counts_as_transient() {
        let publisher = ScriptedPublisher::new(vec![Ok(())]);
        let limiter = RateLimiter::new(RateLimitConfig::new(0, 1));

        let result = deliver(
            &publisher,
            &sample_post(),
            &connection(),
            "exec_1:node_1",
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
            Some(&limiter),
        )
        .await;

        // The window never opens within the budget, so no publish happens.
        assert_eq!(publisher.attempts(), 0);
        assert!(matches!(result, Err(PublishError::Permanent { .. })));
    }
}
