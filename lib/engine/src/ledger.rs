//! The execution ledger: append-only history plus the lock table.
//!
//! The lock table enforces the exclusivity invariant — at most one holder
//! per workflow at any instant. `claim_lock` is a single atomic
//! claim-if-absent; a claim older than the staleness threshold (coordinator
//! crash) is reclaimable by a new attempt, which is the engine's only
//! self-healing mechanism against coordinator failure.

use crate::error::LedgerError;
use amber_relay_core::{ExecutionId, WorkflowId};
use amber_relay_workflow::Execution;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Outcome of a lock claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim succeeded; the caller holds the lock.
    Claimed,
    /// Another execution holds a fresh claim.
    Held { holder: ExecutionId },
}

/// Trait for execution ledgers.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    /// Atomically claims the workflow lock for an execution.
    ///
    /// An absent claim, or one older than `stale_after`, is taken; a fresh
    /// claim by another execution is reported as held.
    async fn claim_lock(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, LedgerError>;

    /// Releases the lock if `execution_id` still holds it.
    async fn release_lock(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
    ) -> Result<(), LedgerError>;

    /// Records a new execution.
    async fn record(&self, execution: &Execution) -> Result<(), LedgerError>;

    /// Writes an execution's terminal snapshot.
    ///
    /// Completed executions are immutable: finalizing twice is an error.
    async fn finalize(&self, execution: &Execution) -> Result<(), LedgerError>;

    /// Returns a workflow's executions, newest first by `started_at`.
    async fn history(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>, LedgerError>;
}

#[derive(Debug, Clone, Copy)]
struct LockClaim {
    holder: ExecutionId,
    claimed_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryLedgerState {
    executions: Vec<Execution>,
    locks: HashMap<WorkflowId, LockClaim>,
}

/// In-memory ledger for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryLedgerState>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current lock holder for a workflow, if any.
    #[must_use]
    pub fn lock_holder(&self, workflow_id: WorkflowId) -> Option<ExecutionId> {
        self.state
            .lock()
            .unwrap()
            .locks
            .get(&workflow_id)
            .map(|claim| claim.holder)
    }
}

#[async_trait]
impl ExecutionLedger for MemoryLedger {
    async fn claim_lock(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, LedgerError> {
        let mut state = self.state.lock().unwrap();

        if let Some(existing) = state.locks.get(&workflow_id)
            && now - existing.claimed_at <= stale_after
        {
            return Ok(ClaimOutcome::Held {
                holder: existing.holder,
            });
        }

        state.locks.insert(
            workflow_id,
            LockClaim {
                holder: execution_id,
                claimed_at: now,
            },
        );
        Ok(ClaimOutcome::Claimed)
    }

    async fn release_lock(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state
            .locks
            .get(&workflow_id)
            .is_some_and(|claim| claim.holder == execution_id)
        {
            state.locks.remove(&workflow_id);
        }
        Ok(())
    }

    async fn record(&self, execution: &Execution) -> Result<(), LedgerError> {
        self.state.lock().unwrap().executions.push(execution.clone());
        Ok(())
    }

    async fn finalize(&self, execution: &Execution) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        let Some(stored) = state
            .executions
            .iter_mut()
            .find(|stored| stored.id == execution.id)
        else {
            return Err(LedgerError::Storage {
                message: format!("execution {} was never recorded", execution.id),
            });
        };

        if stored.completed_at.is_some() {
            return Err(LedgerError::Immutable {
                execution_id: execution.id.to_string(),
            });
        }
        *stored = execution.clone();
        Ok(())
    }

    async fn history(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>, LedgerError> {
        let state = self.state.lock().unwrap();
        let mut executions: Vec<Execution> = state
            .executions
            .iter()
            .filter(|execution| execution.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_relay_workflow::ExecutionStatus;

    fn staleness() -> Duration {
        Duration::seconds(300)
    }

    #[tokio::test]
    async fn claim_is_exclusive_per_workflow() {
        let ledger = MemoryLedger::new();
        let workflow_id = WorkflowId::new();
        let first = ExecutionId::new();
        let second = ExecutionId::new();
        let now = Utc::now();

        assert_eq!(
            ledger
                .claim_lock(workflow_id, first, now, staleness())
                .await
                .unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            ledger
                .claim_lock(workflow_id, second, now, staleness())
                .await
                .unwrap(),
            ClaimOutcome::Held { holder: first }
        );
    }

    #[tokio::test]
    async fn different_workflows_do_not_contend() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();

        let first = ledger
            .claim_lock(WorkflowId::new(), ExecutionId::new(), now, staleness())
            .await
            .unwrap();
        let second = ledger
            .claim_lock(WorkflowId::new(), ExecutionId::new(), now, staleness())
            .await
            .unwrap();
        assert_eq!(first, ClaimOutcome::Claimed);
        assert_eq!(second, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn release_then_reclaim() {
        let ledger = MemoryLedger::new();
        let workflow_id = WorkflowId::new();
        let first = ExecutionId::new();
        let second = ExecutionId::new();
        let now = Utc::now();

        ledger
            .claim_lock(workflow_id, first, now, staleness())
            .await
            .unwrap();
        ledger.release_lock(workflow_id, first).await.unwrap();

        assert_eq!(
            ledger
                .claim_lock(workflow_id, second, now, staleness())
                .await
                .unwrap(),
            ClaimOutcome::Claimed
        );
    }

    #[tokio::test]
    async fn release_by_non_holder_is_ignored() {
        let ledger = MemoryLedger::new();
        let workflow_id = WorkflowId::new();
        let holder = ExecutionId::new();
        let now = Utc::now();

        ledger
            .claim_lock(workflow_id, holder, now, staleness())
            .await
            .unwrap();
        ledger
            .release_lock(workflow_id, ExecutionId::new())
            .await
            .unwrap();

        assert_eq!(ledger.lock_holder(workflow_id), Some(holder));
    }

    #[tokio::test]
    async fn stale_claim_is_reclaimable() {
        let ledger = MemoryLedger::new();
        let workflow_id = WorkflowId::new();
        let crashed = ExecutionId::new();
        let fresh = ExecutionId::new();
        let claimed_at = Utc::now();

        ledger
            .claim_lock(workflow_id, crashed, claimed_at, staleness())
            .await
            .unwrap();

        // Six minutes later the crashed coordinator never released.
        let later = claimed_at + Duration::seconds(360);
        assert_eq!(
            ledger
                .claim_lock(workflow_id, fresh, later, staleness())
                .await
                .unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(ledger.lock_holder(workflow_id), Some(fresh));
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let ledger = MemoryLedger::new();
        let workflow_id = WorkflowId::new();

        let mut first = Execution::begin(ExecutionId::new(), workflow_id);
        first.started_at = Utc::now() - Duration::seconds(60);
        first.finalize(ExecutionStatus::Success);
        let mut second = Execution::begin(ExecutionId::new(), workflow_id);
        second.finalize(ExecutionStatus::Failed);

        ledger.record(&first).await.unwrap();
        ledger.record(&second).await.unwrap();

        let history = ledger.history(workflow_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }

    #[tokio::test]
    async fn finalize_updates_the_recorded_execution() {
        let ledger = MemoryLedger::new();
        let workflow_id = WorkflowId::new();

        let mut execution = Execution::begin(ExecutionId::new(), workflow_id);
        ledger.record(&execution).await.unwrap();

        execution.finalize(ExecutionStatus::Success);
        ledger.finalize(&execution).await.unwrap();

        let history = ledger.history(workflow_id).await.unwrap();
        assert_eq!(history[0].status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn completed_executions_are_immutable() {
        let ledger = MemoryLedger::new();
        let mut execution = Execution::begin(ExecutionId::new(), WorkflowId::new());
        ledger.record(&execution).await.unwrap();

        execution.finalize(ExecutionStatus::Success);
        ledger.finalize(&execution).await.unwrap();

        execution.finalize(ExecutionStatus::Failed);
        let result = ledger.finalize(&execution).await;
        assert!(matches!(result, Err(LedgerError::Immutable { .. })));
    }
}
