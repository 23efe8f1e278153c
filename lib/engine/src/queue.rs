//! The job queue.
//!
//! The scheduler and the service facade enqueue; the worker pool dequeues.
//! Enqueue is idempotent: a job whose idempotency key was already seen is a
//! no-op, which is what guarantees at most one execution per key across
//! scheduler restarts or multiple scheduler instances. Requeue (used for
//! lock contention) re-offers the same job after a delay and intentionally
//! bypasses the duplicate check.

use crate::error::QueueError;
use amber_relay_scheduler::Job;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The job was added to the queue.
    Accepted,
    /// A job with this idempotency key was already seen; nothing was added.
    Duplicate,
}

/// Trait for job queues.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a job, collapsing duplicate idempotency keys into a no-op.
    async fn enqueue(&self, job: Job) -> Result<EnqueueOutcome, QueueError>;

    /// Dequeues the next ready job, if any.
    async fn dequeue(&self) -> Result<Option<Job>, QueueError>;

    /// Re-offers a job after a delay. Used for lock contention; the job is
    /// never dropped and is not treated as a duplicate of itself.
    async fn requeue(&self, job: Job, delay: Duration) -> Result<(), QueueError>;
}

#[derive(Default)]
struct MemoryQueueState {
    ready: VecDeque<Job>,
    delayed: Vec<(DateTime<Utc>, Job)>,
    seen: HashSet<String>,
}

/// An in-memory job queue for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<MemoryQueueState>,
}

impl MemoryJobQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of jobs currently queued (ready or delayed).
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.ready.len() + state.delayed.len()
    }

    /// Returns true when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<EnqueueOutcome, QueueError> {
        let mut state = self.state.lock().unwrap();
        if !state.seen.insert(job.idempotency_key.clone()) {
            tracing::debug!(key = %job.idempotency_key, "duplicate job ignored");
            return Ok(EnqueueOutcome::Duplicate);
        }
        state.ready.push_back(job);
        Ok(EnqueueOutcome::Accepted)
    }

    async fn dequeue(&self) -> Result<Option<Job>, QueueError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        // Promote matured delayed jobs, preserving their delay order.
        let mut matured: Vec<(DateTime<Utc>, Job)> = Vec::new();
        state.delayed.retain(|(ready_at, job)| {
            if *ready_at <= now {
                matured.push((*ready_at, job.clone()));
                false
            } else {
                true
            }
        });
        matured.sort_by_key(|(ready_at, _)| *ready_at);
        for (_, job) in matured {
            state.ready.push_back(job);
        }

        Ok(state.ready.pop_front())
    }

    async fn requeue(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
        let ready_at = Utc::now()
            + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(1));
        self.state.lock().unwrap().delayed.push((ready_at, job));
        Ok(())
    }
}
