//! The job type produced by triggers and consumed by the worker pool.
//!
//! Jobs are ephemeral: they exist only in the queue between enqueue and
//! dequeue. The idempotency key lets the queue collapse duplicate enqueues
//! (scheduler restarts, multiple scheduler instances) into a single
//! execution.

use amber_relay_core::{ScheduleId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// A unit of work: one requested execution of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// The workflow to execute.
    pub workflow_id: WorkflowId,
    /// Duplicate-detection key; two jobs sharing a key produce at most one
    /// execution.
    pub idempotency_key: String,
    /// Trigger payload (manual data or webhook body), if any.
    pub payload: Option<JsonValue>,
    /// The instant the firing was scheduled for. A late fire still carries
    /// the instant it was due.
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a job for a scheduled firing.
    ///
    /// The key is derived from the schedule and the scheduled instant, so a
    /// replayed firing of the same instant dedupes away.
    #[must_use]
    pub fn scheduled(
        schedule_id: ScheduleId,
        workflow_id: WorkflowId,
        scheduled_for: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_id,
            idempotency_key: format!("{schedule_id}:{}", scheduled_for.timestamp()),
            payload: None,
            scheduled_for: Some(scheduled_for),
        }
    }

    /// Creates a job for a manual trigger. Every manual request is a fresh
    /// nonce — repeating the click is a new execution by design.
    #[must_use]
    pub fn manual(workflow_id: WorkflowId, payload: Option<JsonValue>) -> Self {
        Self {
            workflow_id,
            idempotency_key: format!("manual:{}", Ulid::new()),
            payload,
            scheduled_for: None,
        }
    }

    /// Creates a job for an inbound webhook; the body rides along verbatim.
    #[must_use]
    pub fn webhook(workflow_id: WorkflowId, payload: JsonValue) -> Self {
        Self {
            workflow_id,
            idempotency_key: format!("webhook:{}", Ulid::new()),
            payload: Some(payload),
            scheduled_for: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn scheduled_jobs_share_a_key_for_the_same_instant() {
        let schedule_id = ScheduleId::new();
        let workflow_id = WorkflowId::new();
        let instant = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();

        let first = Job::scheduled(schedule_id, workflow_id, instant);
        let second = Job::scheduled(schedule_id, workflow_id, instant);
        assert_eq!(first.idempotency_key, second.idempotency_key);
    }

    #[test]
    fn different_instants_produce_different_keys() {
        let schedule_id = ScheduleId::new();
        let workflow_id = WorkflowId::new();
        let first = Job::scheduled(
            schedule_id,
            workflow_id,
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
        );
        let second = Job::scheduled(
            schedule_id,
            workflow_id,
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        );
        assert_ne!(first.idempotency_key, second.idempotency_key);
    }

    #[test]
    fn manual_jobs_never_collide() {
        let workflow_id = WorkflowId::new();
        let first = Job::manual(workflow_id, None);
        let second = Job::manual(workflow_id, None);
        assert_ne!(first.idempotency_key, second.idempotency_key);
    }

    #[test]
    fn webhook_job_carries_the_body() {
        let payload = serde_json::json!({"event": "release", "tag": "v1.2.0"});
        let job = Job::webhook(WorkflowId::new(), payload.clone());
        assert_eq!(job.payload, Some(payload));
    }

    #[test]
    fn job_serde_roundtrip() {
        let job = Job::scheduled(
            ScheduleId::new(),
            WorkflowId::new(),
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
        );
        let json = serde_json::to_string(&job).expect("serialize");
        let parsed: Job = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(job, parsed);
    }
}
