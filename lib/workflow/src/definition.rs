//! Workflow definition types.
//!
//! A workflow is a named, versioned automation owned by its author. The
//! graph is mutated only through [`Workflow::revise`]: candidate graphs are
//! validated, and acceptance produces a new version — an accepted revision
//! never mutates the previous one in place.

use crate::graph::WorkflowGraph;
use crate::validate::{ValidationResult, validate};
use amber_relay_core::{UserId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name for this workflow.
    pub name: String,
    /// Description of what this workflow does.
    pub description: Option<String>,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last revised.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Creates new metadata with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// The workflow's author.
    pub owner: UserId,
    /// Monotonically increasing revision number.
    pub version: u32,
    /// Workflow metadata.
    pub metadata: WorkflowMetadata,
    /// The workflow graph (nodes and connections).
    pub graph: WorkflowGraph,
}

impl Workflow {
    /// Creates a new empty workflow at version 1.
    #[must_use]
    pub fn new(owner: UserId, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            owner,
            version: 1,
            metadata: WorkflowMetadata::new(name),
            graph: WorkflowGraph::new(),
        }
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Validates the current graph.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        validate(&self.graph)
    }

    /// Produces the next version of this workflow with a replacement graph.
    ///
    /// The candidate graph is validated first; a rejected revision returns
    /// the full finding list and leaves `self` untouched.
    ///
    /// # Errors
    ///
    /// Returns the validation result when the candidate graph is invalid.
    pub fn revise(&self, graph: WorkflowGraph) -> Result<Workflow, ValidationResult> {
        let report = validate(&graph);
        if !report.is_valid() {
            return Err(report);
        }

        Ok(Workflow {
            id: self.id,
            owner: self.owner,
            version: self.version + 1,
            metadata: WorkflowMetadata {
                updated_at: Utc::now(),
                ..self.metadata.clone()
            },
            graph,
        })
    }
}
