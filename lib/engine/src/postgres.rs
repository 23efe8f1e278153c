//! Postgres-backed execution ledger.
//!
//! Executions land in `executions` (node results and top-level errors as
//! JSONB); the lock table is `execution_locks`, one row per workflow. The
//! claim is a single statement: insert, or take over a row whose claim is
//! older than the staleness cutoff.

use crate::error::LedgerError;
use crate::ledger::{ClaimOutcome, ExecutionLedger};
use amber_relay_core::{ExecutionId, WorkflowId};
use amber_relay_workflow::{Execution, ExecutionStatus, NodeResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

fn status_as_str(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Running => "running",
        ExecutionStatus::Success => "success",
        ExecutionStatus::Partial => "partial",
        ExecutionStatus::Failed => "failed",
    }
}

fn status_from_str(value: &str) -> Result<ExecutionStatus, LedgerError> {
    match value {
        "running" => Ok(ExecutionStatus::Running),
        "success" => Ok(ExecutionStatus::Success),
        "partial" => Ok(ExecutionStatus::Partial),
        "failed" => Ok(ExecutionStatus::Failed),
        other => Err(LedgerError::Decode {
            message: format!("unknown execution status '{other}'"),
        }),
    }
}

/// Row type for execution queries.
#[derive(FromRow)]
struct ExecutionRow {
    id: String,
    workflow_id: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    node_results: serde_json::Value,
    errors: serde_json::Value,
}

impl ExecutionRow {
    fn try_into_execution(self) -> Result<Execution, LedgerError> {
        let id = ExecutionId::from_str(&self.id).map_err(|e| LedgerError::Decode {
            message: format!("invalid execution id '{}': {e}", self.id),
        })?;
        let workflow_id =
            WorkflowId::from_str(&self.workflow_id).map_err(|e| LedgerError::Decode {
                message: format!("invalid workflow id '{}': {e}", self.workflow_id),
            })?;
        let node_results: Vec<NodeResult> =
            serde_json::from_value(self.node_results).map_err(|e| LedgerError::Decode {
                message: format!("invalid node results: {e}"),
            })?;
        let errors: Vec<String> =
            serde_json::from_value(self.errors).map_err(|e| LedgerError::Decode {
                message: format!("invalid errors: {e}"),
            })?;

        Ok(Execution {
            id,
            workflow_id,
            status: status_from_str(&self.status)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            node_results,
            errors,
        })
    }
}

/// Postgres implementation of the execution ledger.
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a ledger over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the ledger tables when they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ,
                node_results JSONB NOT NULL DEFAULT '[]'::jsonb,
                errors JSONB NOT NULL DEFAULT '[]'::jsonb
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS executions_workflow_started
            ON executions (workflow_id, started_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_locks (
                workflow_id TEXT PRIMARY KEY,
                execution_id TEXT NOT NULL,
                claimed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }
}

fn storage_error(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage {
        message: e.to_string(),
    }
}

#[async_trait]
impl ExecutionLedger for PostgresLedger {
    async fn claim_lock(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, LedgerError> {
        let stale_before = now - stale_after;

        // One atomic statement: insert the claim, or take over a stale one.
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO execution_locks (workflow_id, execution_id, claimed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (workflow_id) DO UPDATE
                SET execution_id = EXCLUDED.execution_id,
                    claimed_at = EXCLUDED.claimed_at
                WHERE execution_locks.claimed_at < $4
            RETURNING execution_id
            "#,
        )
        .bind(workflow_id.to_string())
        .bind(execution_id.to_string())
        .bind(now)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        if claimed.is_some() {
            return Ok(ClaimOutcome::Claimed);
        }

        let holder: Option<(String,)> = sqlx::query_as(
            "SELECT execution_id FROM execution_locks WHERE workflow_id = $1",
        )
        .bind(workflow_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match holder {
            Some((holder,)) => {
                let holder = ExecutionId::from_str(&holder).map_err(|e| LedgerError::Decode {
                    message: format!("invalid lock holder '{holder}': {e}"),
                })?;
                Ok(ClaimOutcome::Held { holder })
            }
            // The holder released between the two statements; report held
            // and let the requeued job claim cleanly.
            None => Ok(ClaimOutcome::Held {
                holder: execution_id,
            }),
        }
    }

    async fn release_lock(
        &self,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "DELETE FROM execution_locks WHERE workflow_id = $1 AND execution_id = $2",
        )
        .bind(workflow_id.to_string())
        .bind(execution_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn record(&self, execution: &Execution) -> Result<(), LedgerError> {
        let node_results =
            serde_json::to_value(&execution.node_results).map_err(|e| LedgerError::Storage {
                message: format!("failed to serialize node results: {e}"),
            })?;
        let errors = serde_json::to_value(&execution.errors).map_err(|e| LedgerError::Storage {
            message: format!("failed to serialize errors: {e}"),
        })?;

        sqlx::query(
            r#"
            INSERT INTO executions
                (id, workflow_id, status, started_at, completed_at, node_results, errors)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(status_as_str(execution.status))
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(node_results)
        .bind(errors)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn finalize(&self, execution: &Execution) -> Result<(), LedgerError> {
        let node_results =
            serde_json::to_value(&execution.node_results).map_err(|e| LedgerError::Storage {
                message: format!("failed to serialize node results: {e}"),
            })?;
        let errors = serde_json::to_value(&execution.errors).map_err(|e| LedgerError::Storage {
            message: format!("failed to serialize errors: {e}"),
        })?;

        // Completed executions are immutable: the guard refuses a second
        // finalize.
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = $2, completed_at = $3, node_results = $4, errors = $5
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(execution.id.to_string())
        .bind(status_as_str(execution.status))
        .bind(execution.completed_at)
        .bind(node_results)
        .bind(errors)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::Immutable {
                execution_id: execution.id.to_string(),
            });
        }
        Ok(())
    }

    async fn history(&self, workflow_id: WorkflowId) -> Result<Vec<Execution>, LedgerError> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, status, started_at, completed_at, node_results, errors
            FROM executions
            WHERE workflow_id = $1
            ORDER BY started_at DESC
            "#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter().map(ExecutionRow::try_into_execution).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            ExecutionStatus::Running,
            ExecutionStatus::Success,
            ExecutionStatus::Partial,
            ExecutionStatus::Failed,
        ] {
            assert_eq!(status_from_str(status_as_str(status)).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_a_decode_error() {
        assert!(matches!(
            status_from_str("cancelled"),
            Err(LedgerError::Decode { .. })
        ));
    }
}
