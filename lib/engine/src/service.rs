//! The engine service facade.
//!
//! Callers (API handlers, the daemon, tests) talk to the engine through
//! this type: workflow registration, manual execution, scheduling,
//! webhook ingress, execution history, and the scheduler/worker entry
//! points.

use crate::config::EngineConfig;
use crate::coordinator::{Coordinator, RunOutcome};
use crate::error::{EngineError, LedgerError};
use crate::ledger::ExecutionLedger;
use crate::queue::{EnqueueOutcome, JobQueue};
use amber_relay_core::{ScheduleId, WorkflowId};
use amber_relay_scheduler::{Job, ScheduleRegistry};
use amber_relay_workflow::{
    Execution, NodeConfig, TriggerConfig, Workflow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Trait for workflow storage.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Fetches a workflow by ID.
    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, LedgerError>;

    /// Stores a workflow (insert or replace with a newer version).
    async fn put(&self, workflow: Workflow) -> Result<(), LedgerError>;
}

/// In-memory workflow repository.
#[derive(Default)]
pub struct MemoryWorkflowRepository {
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
}

impl MemoryWorkflowRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRepository for MemoryWorkflowRepository {
    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, LedgerError> {
        Ok(self.workflows.lock().unwrap().get(&id).cloned())
    }

    async fn put(&self, workflow: Workflow) -> Result<(), LedgerError> {
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.id, workflow);
        Ok(())
    }
}

/// Synchronous acceptance of an execution request; completion is
/// asynchronous and lands in the execution history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    /// The workflow the job targets.
    pub workflow_id: WorkflowId,
    /// The job's idempotency key.
    pub idempotency_key: String,
    /// True when an identical job was already queued and this request
    /// collapsed into it.
    pub duplicate: bool,
}

/// The engine facade.
pub struct EngineService {
    workflows: Arc<dyn WorkflowRepository>,
    queue: Arc<dyn JobQueue>,
    ledger: Arc<dyn ExecutionLedger>,
    coordinator: Arc<Coordinator>,
    registry: Mutex<ScheduleRegistry>,
    webhooks: Mutex<HashMap<String, WorkflowId>>,
    /// Target upper bound between a scheduled instant and its firing.
    fire_window: chrono::Duration,
}

impl EngineService {
    /// Creates the service over its collaborators.
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        queue: Arc<dyn JobQueue>,
        ledger: Arc<dyn ExecutionLedger>,
        coordinator: Arc<Coordinator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            workflows,
            queue,
            ledger,
            coordinator,
            registry: Mutex::new(ScheduleRegistry::new()),
            webhooks: Mutex::new(HashMap::new()),
            fire_window: chrono::Duration::seconds(config.fire_window_seconds as i64),
        }
    }

    /// Registers a workflow after validating its graph, and indexes any
    /// webhook trigger paths for ingress routing.
    ///
    /// # Errors
    ///
    /// Returns the full finding list when the graph is invalid.
    pub async fn register_workflow(&self, workflow: Workflow) -> Result<(), EngineError> {
        let report = workflow.validate();
        if !report.is_valid() {
            return Err(EngineError::InvalidWorkflow {
                errors: report.errors.iter().map(ToString::to_string).collect(),
            });
        }

        let mut webhooks = self.webhooks.lock().unwrap();
        for node in workflow.graph.nodes() {
            if let NodeConfig::Trigger(TriggerConfig::Webhook { path }) = &node.config {
                webhooks.insert(path.clone(), workflow.id);
            }
        }
        drop(webhooks);

        tracing::info!(workflow = %workflow.id, version = workflow.version, "registered workflow");
        self.workflows.put(workflow).await?;
        Ok(())
    }

    /// Requests an execution now (manual trigger).
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow is unknown or the queue fails.
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        payload: Option<JsonValue>,
    ) -> Result<JobTicket, EngineError> {
        self.require_workflow(workflow_id).await?;
        let job = Job::manual(workflow_id, payload);
        self.submit(job).await
    }

    /// Registers a cron schedule for a workflow.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow is unknown or the expression or
    /// timezone is invalid.
    pub async fn schedule_workflow(
        &self,
        workflow_id: WorkflowId,
        cron: &str,
        timezone: Option<&str>,
    ) -> Result<ScheduleId, EngineError> {
        self.require_workflow(workflow_id).await?;
        let id = self
            .registry
            .lock()
            .unwrap()
            .register(workflow_id, cron, timezone, Utc::now())?;
        Ok(id)
    }

    /// Pauses a schedule; in-flight jobs are unaffected.
    ///
    /// # Errors
    ///
    /// Returns an error when the schedule is unknown.
    pub fn pause_schedule(&self, id: ScheduleId) -> Result<(), EngineError> {
        self.registry.lock().unwrap().pause(id)?;
        Ok(())
    }

    /// Resumes a paused schedule.
    ///
    /// # Errors
    ///
    /// Returns an error when the schedule is unknown.
    pub fn resume_schedule(&self, id: ScheduleId) -> Result<(), EngineError> {
        self.registry.lock().unwrap().resume(id, Utc::now())?;
        Ok(())
    }

    /// Cancels a schedule; already-enqueued jobs are unaffected.
    ///
    /// # Errors
    ///
    /// Returns an error when the schedule is unknown.
    pub fn cancel_schedule(&self, id: ScheduleId) -> Result<(), EngineError> {
        self.registry.lock().unwrap().cancel(id)?;
        Ok(())
    }

    /// Routes an inbound webhook to its workflow, carrying the payload
    /// verbatim. Returns `None` when no workflow owns the path.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue fails.
    pub async fn handle_webhook(
        &self,
        path: &str,
        payload: JsonValue,
    ) -> Result<Option<JobTicket>, EngineError> {
        let workflow_id = self.webhooks.lock().unwrap().get(path).copied();
        let Some(workflow_id) = workflow_id else {
            tracing::debug!(%path, "webhook with no matching workflow");
            return Ok(None);
        };

        let ticket = self.submit(Job::webhook(workflow_id, payload)).await?;
        Ok(Some(ticket))
    }

    /// Returns a workflow's executions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error when the ledger fails.
    pub async fn get_execution_history(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<Execution>, EngineError> {
        Ok(self.ledger.history(workflow_id).await?)
    }

    /// One scheduler tick: enqueues every due firing. Returns the number
    /// of jobs accepted (duplicates collapse silently).
    ///
    /// # Errors
    ///
    /// Returns an error when the queue fails.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let jobs = self.registry.lock().unwrap().due(now);
        let mut accepted = 0;
        for job in jobs {
            // Lateness is an availability concern, not a correctness one:
            // the job still carries the instant it was due.
            if let Some(scheduled) = job.scheduled_for
                && now - scheduled > self.fire_window
            {
                tracing::warn!(
                    workflow = %job.workflow_id,
                    scheduled = %scheduled,
                    late_by_secs = (now - scheduled).num_seconds(),
                    "firing outside the delivery window"
                );
            }
            if self.queue.enqueue(job).await? == EnqueueOutcome::Accepted {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// One worker step: dequeues a job (if any) and runs it.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue or coordinator fail.
    pub async fn run_pending(&self) -> Result<Option<RunOutcome>, EngineError> {
        let Some(job) = self.queue.dequeue().await? else {
            return Ok(None);
        };
        Ok(Some(self.coordinator.run(job).await?))
    }

    async fn submit(&self, job: Job) -> Result<JobTicket, EngineError> {
        let workflow_id = job.workflow_id;
        let idempotency_key = job.idempotency_key.clone();
        let outcome = self.queue.enqueue(job).await?;
        Ok(JobTicket {
            workflow_id,
            idempotency_key,
            duplicate: outcome == EnqueueOutcome::Duplicate,
        })
    }

    async fn require_workflow(&self, workflow_id: WorkflowId) -> Result<(), EngineError> {
        if self.workflows.get(workflow_id).await?.is_none() {
            return Err(EngineError::WorkflowNotFound { workflow_id });
        }
        Ok(())
    }
}
