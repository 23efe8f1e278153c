//! Execution records.
//!
//! An [`Execution`] is created when a job is claimed and is the sole mutable
//! record during a run. Once `completed_at` is set the record is immutable;
//! the ledger only ever appends.

use crate::content::OutputRef;
use crate::graph::WorkflowGraph;
use crate::node::{NodeId, NodeKind};
use amber_relay_core::{ExecutionId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The overall status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The execution is in progress.
    Running,
    /// Every node succeeded with full-quality output.
    Success,
    /// At least one node succeeded and at least one failed, was skipped,
    /// or produced degraded (fallback) output.
    Partial,
    /// The trigger failed, the graph was invalid, or no publish action
    /// succeeded while something failed.
    Failed,
}

impl ExecutionStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// The terminal status of a single node within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// The node produced its output.
    Success,
    /// The node failed.
    Failed,
    /// The node never ran because an upstream node failed or skipped.
    Skipped,
}

/// The recorded result of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    /// The node this result belongs to.
    pub node_id: NodeId,
    /// Terminal status.
    pub status: NodeStatus,
    /// Pointer to the stored output, when one was produced.
    pub output: Option<OutputRef>,
    /// True when the output came from a fallback rather than the primary
    /// path.
    pub degraded: bool,
    /// Error detail for failed nodes.
    pub error: Option<String>,
}

impl NodeResult {
    /// Records a successful node.
    #[must_use]
    pub fn success(node_id: NodeId, output: Option<OutputRef>, degraded: bool) -> Self {
        Self {
            node_id,
            status: NodeStatus::Success,
            output,
            degraded,
            error: None,
        }
    }

    /// Records a failed node.
    #[must_use]
    pub fn failed(node_id: NodeId, error: impl Into<String>) -> Self {
        Self {
            node_id,
            status: NodeStatus::Failed,
            output: None,
            degraded: false,
            error: Some(error.into()),
        }
    }

    /// Records a skipped node.
    #[must_use]
    pub fn skipped(node_id: NodeId) -> Self {
        Self {
            node_id,
            status: NodeStatus::Skipped,
            output: None,
            degraded: false,
            error: None,
        }
    }
}

/// A record of a single workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Unique identifier for this execution.
    pub id: ExecutionId,
    /// The workflow that was executed.
    pub workflow_id: WorkflowId,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the execution was claimed.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-node results, ordered by completion.
    pub node_results: Vec<NodeResult>,
    /// Top-level errors (graph validation failures).
    pub errors: Vec<String>,
}

impl Execution {
    /// Creates a running execution with a pre-allocated ID.
    ///
    /// The ID is allocated before the lock claim so the lock can name its
    /// holder.
    #[must_use]
    pub fn begin(id: ExecutionId, workflow_id: WorkflowId) -> Self {
        Self {
            id,
            workflow_id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            node_results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Creates an already-failed execution for a graph that did not
    /// validate. No node ran, so there are no node results.
    #[must_use]
    pub fn rejected(id: ExecutionId, workflow_id: WorkflowId, errors: Vec<String>) -> Self {
        Self {
            id,
            workflow_id,
            status: ExecutionStatus::Failed,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            node_results: Vec::new(),
            errors,
        }
    }

    /// Appends a node result.
    pub fn record(&mut self, result: NodeResult) {
        self.node_results.push(result);
    }

    /// Finalizes the execution with the given status.
    pub fn finalize(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Returns true once the execution is terminal.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Returns the result for a node, if recorded.
    #[must_use]
    pub fn node_result(&self, node_id: NodeId) -> Option<&NodeResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }
}

/// Aggregates node results into the execution status.
///
/// - `success`: every node succeeded and nothing was degraded
/// - `failed`: a trigger failed, or the graph has action nodes and none of
///   them succeeded while at least one node failed
/// - `partial`: successes mixed with failures, skips, or degraded outputs
#[must_use]
pub fn aggregate(results: &[NodeResult], graph: &WorkflowGraph) -> ExecutionStatus {
    let all_success = results.iter().all(|r| r.status == NodeStatus::Success);
    let any_degraded = results.iter().any(|r| r.degraded);
    if all_success && !any_degraded {
        return ExecutionStatus::Success;
    }

    let status_of = |node_id: NodeId| {
        results
            .iter()
            .find(|r| r.node_id == node_id)
            .map(|r| r.status)
    };

    let trigger_failed = graph
        .nodes()
        .filter(|n| n.kind() == NodeKind::Trigger)
        .any(|n| status_of(n.id) == Some(NodeStatus::Failed));

    let action_ids: Vec<NodeId> = graph
        .nodes()
        .filter(|n| n.kind() == NodeKind::Action)
        .map(|n| n.id)
        .collect();
    let any_action_succeeded = action_ids
        .iter()
        .any(|id| status_of(*id) == Some(NodeStatus::Success));
    let any_failed = results.iter().any(|r| r.status == NodeStatus::Failed);

    if trigger_failed || (!action_ids.is_empty() && !any_action_succeeded && any_failed) {
        return ExecutionStatus::Failed;
    }

    if results.iter().any(|r| r.status == NodeStatus::Success) {
        ExecutionStatus::Partial
    } else {
        ExecutionStatus::Failed
    }
}
