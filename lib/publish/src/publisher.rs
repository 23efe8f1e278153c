//! The publisher trait and its test doubles.
//!
//! Every publish call carries a dedupe key (`executionId:nodeId`). A
//! conforming publisher treats a repeated key as the original delivery and
//! returns the same receipt without posting again.

use crate::connection::ConnectionHandle;
use crate::error::PublishError;
use crate::format::FormattedPost;
use amber_relay_workflow::Platform;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Proof of a delivered post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Platform-assigned post identifier.
    pub post_id: String,
    /// The platform that accepted the post.
    pub platform: Platform,
    /// The dedupe key the delivery was keyed by.
    pub dedupe_key: String,
}

/// Trait for platform publishers.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a formatted post through a connection.
    ///
    /// # Errors
    ///
    /// Returns a classified transient or permanent failure.
    async fn publish(
        &self,
        post: &FormattedPost,
        connection: &ConnectionHandle,
        dedupe_key: &str,
    ) -> Result<PublishReceipt, PublishError>;
}

/// A publisher that logs deliveries instead of calling a platform.
///
/// The development default: post IDs are derived from the dedupe key, so
/// repeated delivery of the same key is naturally idempotent.
pub struct TracingPublisher;

#[async_trait]
impl Publisher for TracingPublisher {
    async fn publish(
        &self,
        post: &FormattedPost,
        connection: &ConnectionHandle,
        dedupe_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        tracing::info!(
            platform = %post.platform,
            connection = %connection.id,
            chars = post.text.chars().count(),
            media = post.media.len(),
            %dedupe_key,
            "published post"
        );
        Ok(PublishReceipt {
            post_id: format!("post_{dedupe_key}"),
            platform: post.platform,
            dedupe_key: dedupe_key.to_string(),
        })
    }
}

/// A recording publisher for tests.
///
/// Remembers every delivered post and collapses duplicate dedupe keys into
/// the original receipt.
#[derive(Default)]
pub struct RecordingPublisher {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    posts: Vec<(String, FormattedPost)>,
    receipts: HashMap<String, PublishReceipt>,
}

impl RecordingPublisher {
    /// Creates an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every post actually delivered (duplicates excluded).
    #[must_use]
    pub fn posts(&self) -> Vec<FormattedPost> {
        self.state
            .lock()
            .unwrap()
            .posts
            .iter()
            .map(|(_, post)| post.clone())
            .collect()
    }

    /// Returns the number of distinct deliveries.
    #[must_use]
    pub fn delivery_count(&self) -> usize {
        self.state.lock().unwrap().posts.len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        post: &FormattedPost,
        _connection: &ConnectionHandle,
        dedupe_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let mut state = self.state.lock().unwrap();
        if let Some(receipt) = state.receipts.get(dedupe_key) {
            return Ok(receipt.clone());
        }

        let receipt = PublishReceipt {
            post_id: format!("post_{dedupe_key}"),
            platform: post.platform,
            dedupe_key: dedupe_key.to_string(),
        };
        state
            .posts
            .push((dedupe_key.to_string(), post.clone()));
        state
            .receipts
            .insert(dedupe_key.to_string(), receipt.clone());
        Ok(receipt)
    }
}

/// A publisher that always fails with a fixed error.
pub struct FailingPublisher {
    /// The error returned for every attempt.
    pub error: PublishError,
    attempts: Mutex<u32>,
}

impl FailingPublisher {
    /// Creates a publisher failing with `error`.
    #[must_use]
    pub fn new(error: PublishError) -> Self {
        Self {
            error,
            attempts: Mutex::new(0),
        }
    }

    /// Returns how many attempts were made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(
        &self,
        _post: &FormattedPost,
        _connection: &ConnectionHandle,
        _dedupe_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        *self.attempts.lock().unwrap() += 1;
        Err(self.error.clone())
    }
}

/// A publisher that replays a scripted sequence of outcomes.
pub struct ScriptedPublisher {
    script: Mutex<Vec<Result<(), PublishError>>>,
    attempts: Mutex<u32>,
}

impl ScriptedPublisher {
    /// Creates a publisher that pops outcomes from `script` in order and
    /// succeeds once the script is exhausted.
    #[must_use]
    pub fn new(script: Vec<Result<(), PublishError>>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: Mutex::new(script),
            attempts: Mutex::new(0),
        }
    }

    /// Returns how many attempts were made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(
        &self,
        post: &FormattedPost,
        _connection: &ConnectionHandle,
        dedupe_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        *self.attempts.lock().unwrap() += 1;
        match self.script.lock().unwrap().pop() {
            Some(Err(error)) => Err(error),
            Some(Ok(())) | None => Ok(PublishReceipt {
                post_id: format!("post_{dedupe_key}"),
                platform: post.platform,
                dedupe_key: dedupe_key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_relay_core::ConnectionId;

    fn sample_post() -> FormattedPost {
        FormattedPost {
            platform: Platform::LinkedIn,
            text: "hello".to_string(),
            media: vec![],
        }
    }

    fn connection() -> ConnectionHandle {
        ConnectionHandle::valid(ConnectionId::new(), Platform::LinkedIn)
    }

    #[tokio::test]
    async fn recording_publisher_collapses_duplicate_keys() {
        let publisher = RecordingPublisher::new();
        let post = sample_post();
        let conn = connection();

        let first = publisher.publish(&post, &conn, "exec_1:node_1").await.unwrap();
        let second = publisher.publish(&post, &conn, "exec_1:node_1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(publisher.delivery_count(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_produce_distinct_deliveries() {
        let publisher = RecordingPublisher::new();
        let post = sample_post();
        let conn = connection();

        publisher.publish(&post, &conn, "exec_1:node_1").await.unwrap();
        publisher.publish(&post, &conn, "exec_2:node_1").await.unwrap();

        assert_eq!(publisher.delivery_count(), 2);
    }

    #[tokio::test]
    async fn scripted_publisher_replays_outcomes() {
        let publisher = ScriptedPublisher::new(vec![
            Err(PublishError::Transient {
                reason: "503".to_string(),
                retry_after: None,
            }),
            Ok(()),
        ]);
        let post = sample_post();
        let conn = connection();

        assert!(publisher.publish(&post, &conn, "k").await.is_err());
        assert!(publisher.publish(&post, &conn, "k").await.is_ok());
        assert_eq!(publisher.attempts(), 2);
    }
}
