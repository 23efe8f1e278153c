//! The execution coordinator.
//!
//! `run(job)` owns one execution end to end: lock claim (with requeue on
//! contention), graph re-validation, dependency-ordered evaluation with a
//! bounded worker pool, failure isolation, aggregation, and ledger
//! persistence. Node outcomes are always data; a node failure skips its
//! transitive downstream and leaves independent branches running.

use crate::config::EngineConfig;
use crate::error::CoordinatorError;
use crate::executor::{ExecutionContext, NodeExecutor, NodeOutcome};
use crate::ledger::{ClaimOutcome, ExecutionLedger};
use crate::queue::JobQueue;
use crate::service::WorkflowRepository;
use crate::store::ContentStore;
use amber_relay_core::ExecutionId;
use amber_relay_scheduler::Job;
use amber_relay_workflow::{
    ContentValue, Execution, NodeId, NodeResult, WorkflowGraph, aggregate, validate,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// The result of offering a job to the coordinator.
#[derive(Debug)]
pub enum RunOutcome {
    /// The job ran to completion (successfully or not).
    Completed(Execution),
    /// The workflow lock was held; the job was requeued, never dropped.
    Requeued,
}

/// Dependency bookkeeping for one execution.
///
/// Nodes become ready when every distinct predecessor has completed
/// successfully; a failed or skipped node resolves its entire transitive
/// downstream to skipped immediately, so independent branches keep going
/// while nothing ever waits on a dead branch.
struct EvalPlan {
    pending_deps: HashMap<NodeId, usize>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
    ready: VecDeque<NodeId>,
    executing: HashSet<NodeId>,
    terminal: HashSet<NodeId>,
    total: usize,
}

impl EvalPlan {
    fn new(graph: &WorkflowGraph) -> Self {
        let mut pending_deps: HashMap<NodeId, usize> =
            graph.node_ids().map(|id| (id, 0)).collect();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> =
            graph.node_ids().map(|id| (id, Vec::new())).collect();

        let mut seen_edges = HashSet::new();
        for conn in graph.connections() {
            // Two ports between the same node pair still form one
            // dependency.
            if seen_edges.insert((conn.source_node, conn.target_node)) {
                *pending_deps.entry(conn.target_node).or_default() += 1;
                dependents
                    .entry(conn.source_node)
                    .or_default()
                    .push(conn.target_node);
            }
        }

        let ready = pending_deps
            .iter()
            .filter(|(_, deps)| **deps == 0)
            .map(|(id, _)| *id)
            .collect();
        let total = pending_deps.len();

        Self {
            pending_deps,
            dependents,
            ready,
            executing: HashSet::new(),
            terminal: HashSet::new(),
            total,
        }
    }

    /// Pops the next ready node and marks it executing.
    fn next_ready(&mut self) -> Option<NodeId> {
        let node_id = self.ready.pop_front()?;
        self.executing.insert(node_id);
        Some(node_id)
    }

    /// Marks a node completed, unblocking dependents whose predecessors
    /// are all done.
    fn complete(&mut self, node_id: NodeId) {
        self.executing.remove(&node_id);
        self.terminal.insert(node_id);

        for dependent in self.dependents.get(&node_id).cloned().unwrap_or_default() {
            if self.terminal.contains(&dependent) {
                continue;
            }
            if let Some(deps) = self.pending_deps.get_mut(&dependent) {
                *deps -= 1;
                if *deps == 0 {
                    self.ready.push_back(dependent);
                }
            }
        }
    }

    /// Marks a node failed or skipped and resolves its transitive
    /// downstream to skipped, returning the nodes so resolved.
    fn abandon(&mut self, node_id: NodeId) -> Vec<NodeId> {
        self.executing.remove(&node_id);
        self.terminal.insert(node_id);

        let mut skipped = Vec::new();
        let mut to_visit = vec![node_id];
        while let Some(current) = to_visit.pop() {
            for dependent in self.dependents.get(&current).cloned().unwrap_or_default() {
                if self.terminal.insert(dependent) {
                    skipped.push(dependent);
                    to_visit.push(dependent);
                }
            }
        }
        skipped
    }

    /// Returns true once every node reached a terminal state.
    fn is_done(&self) -> bool {
        self.terminal.len() == self.total
    }
}

/// Coordinates single executions of workflows.
pub struct Coordinator {
    workflows: Arc<dyn WorkflowRepository>,
    ledger: Arc<dyn ExecutionLedger>,
    queue: Arc<dyn JobQueue>,
    content: Arc<dyn ContentStore>,
    executor: Arc<NodeExecutor>,
    config: EngineConfig,
}

impl Coordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        ledger: Arc<dyn ExecutionLedger>,
        queue: Arc<dyn JobQueue>,
        content: Arc<dyn ContentStore>,
        executor: Arc<NodeExecutor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            workflows,
            ledger,
            queue,
            content,
            executor,
            config,
        }
    }

    /// Runs a job to completion, or requeues it on lock contention.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow is unknown or the ledger/queue
    /// fail; node-level problems never surface here — they are captured in
    /// the returned execution.
    pub async fn run(&self, job: Job) -> Result<RunOutcome, CoordinatorError> {
        let execution_id = ExecutionId::new();

        match self
            .ledger
            .claim_lock(
                job.workflow_id,
                execution_id,
                Utc::now(),
                self.config.lock_staleness(),
            )
            .await?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::Held { holder } => {
                tracing::debug!(
                    workflow = %job.workflow_id,
                    %holder,
                    "workflow lock held; requeueing job"
                );
                self.queue
                    .requeue(job, self.config.requeue_delay())
                    .await?;
                return Ok(RunOutcome::Requeued);
            }
        }

        let workflow = match self.workflows.get(job.workflow_id).await? {
            Some(workflow) => workflow,
            None => {
                self.ledger
                    .release_lock(job.workflow_id, execution_id)
                    .await?;
                return Err(CoordinatorError::WorkflowNotFound {
                    workflow_id: job.workflow_id,
                });
            }
        };

        // Defense against stale or externally generated graphs: validate
        // again even though registration already did.
        let report = validate(&workflow.graph);
        if !report.is_valid() {
            let errors = report.errors.iter().map(ToString::to_string).collect();
            let execution = Execution::rejected(execution_id, job.workflow_id, errors);
            self.ledger.record(&execution).await?;
            self.ledger
                .release_lock(job.workflow_id, execution_id)
                .await?;
            tracing::warn!(
                workflow = %job.workflow_id,
                execution = %execution_id,
                "graph failed pre-run validation"
            );
            return Ok(RunOutcome::Completed(execution));
        }

        let mut execution = Execution::begin(execution_id, job.workflow_id);
        self.ledger.record(&execution).await?;

        let ctx = ExecutionContext {
            execution_id,
            workflow_id: job.workflow_id,
            payload: job.payload.clone(),
            scheduled_for: job.scheduled_for,
            call_timeout: self.config.call_timeout(),
        };
        self.evaluate(&workflow.graph, &ctx, &mut execution).await;

        let status = aggregate(&execution.node_results, &workflow.graph);
        execution.finalize(status);
        self.ledger.finalize(&execution).await?;
        self.ledger
            .release_lock(job.workflow_id, execution_id)
            .await?;

        tracing::info!(
            workflow = %job.workflow_id,
            execution = %execution_id,
            status = ?execution.status,
            nodes = execution.node_results.len(),
            "execution finished"
        );
        Ok(RunOutcome::Completed(execution))
    }

    /// Evaluates the graph in dependency order with bounded concurrency.
    async fn evaluate(
        &self,
        graph: &WorkflowGraph,
        ctx: &ExecutionContext,
        execution: &mut Execution,
    ) {
        let mut plan = EvalPlan::new(graph);
        let mut outputs: HashMap<NodeId, ContentValue> = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.config.worker_capacity.max(1)));
        let mut running: JoinSet<(NodeId, NodeOutcome)> = JoinSet::new();

        self.spawn_ready(&mut plan, graph, &outputs, ctx, &semaphore, &mut running);

        while let Some(joined) = running.join_next().await {
            let Ok((node_id, outcome)) = joined else {
                tracing::error!("node task aborted unexpectedly");
                continue;
            };

            match outcome {
                NodeOutcome::Success { output, degraded } => {
                    let mut stored = None;
                    let mut store_failure = None;
                    if let Some(value) = output {
                        match self.content.put(&value).await {
                            Ok(output_ref) => {
                                outputs.insert(node_id, value);
                                stored = Some(output_ref);
                            }
                            Err(error) => {
                                store_failure =
                                    Some(format!("failed to persist node output: {error}"));
                            }
                        }
                    }

                    match store_failure {
                        None => {
                            execution.record(NodeResult::success(node_id, stored, degraded));
                            plan.complete(node_id);
                        }
                        Some(error) => {
                            execution.record(NodeResult::failed(node_id, error));
                            for skipped in plan.abandon(node_id) {
                                execution.record(NodeResult::skipped(skipped));
                            }
                        }
                    }
                }
                NodeOutcome::Failed { error } => {
                    tracing::warn!(node = %node_id, %error, "node failed");
                    execution.record(NodeResult::failed(node_id, error));
                    for skipped in plan.abandon(node_id) {
                        execution.record(NodeResult::skipped(skipped));
                    }
                }
                NodeOutcome::Skipped => {
                    execution.record(NodeResult::skipped(node_id));
                    for skipped in plan.abandon(node_id) {
                        execution.record(NodeResult::skipped(skipped));
                    }
                }
            }

            self.spawn_ready(&mut plan, graph, &outputs, ctx, &semaphore, &mut running);
        }

        debug_assert!(plan.is_done());
    }

    /// Spawns every currently ready node onto the worker pool.
    fn spawn_ready(
        &self,
        plan: &mut EvalPlan,
        graph: &WorkflowGraph,
        outputs: &HashMap<NodeId, ContentValue>,
        ctx: &ExecutionContext,
        semaphore: &Arc<Semaphore>,
        running: &mut JoinSet<(NodeId, NodeOutcome)>,
    ) {
        while let Some(node_id) = plan.next_ready() {
            let Some(node) = graph.node(node_id) else {
                continue;
            };

            // Inputs are fully resolved by the time a node is ready.
            let mut inputs: HashMap<String, ContentValue> = HashMap::new();
            for (predecessor, conn) in graph.predecessors(node_id) {
                if let Some(value) = outputs.get(&predecessor.id) {
                    inputs.insert(conn.target_port.clone(), value.clone());
                }
            }

            let node = node.clone();
            let ctx = ctx.clone();
            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(semaphore);
            let deadline = self.config.node_timeout();

            running.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        node.id,
                        NodeOutcome::Failed {
                            error: "worker pool shut down".to_string(),
                        },
                    );
                };

                let outcome =
                    match tokio::time::timeout(deadline, executor.execute(&node, &inputs, &ctx))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_elapsed) => NodeOutcome::Failed {
                            error: format!(
                                "node '{}' exceeded its {}ms deadline",
                                node.name,
                                deadline.as_millis()
                            ),
                        },
                    };
                (node.id, outcome)
            });
        }
    }
}
