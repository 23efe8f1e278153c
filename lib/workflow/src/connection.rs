//! Connection types for workflow graphs.
//!
//! Connections carry data from a source node's output port to a target
//! node's input port. They are directional and single-valued at the target:
//! an input port accepts at most one incoming connection.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A connection between two ports, stored as the graph's edge weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The name of the output port on the source node.
    pub source_port: String,
    /// The name of the input port on the target node.
    pub target_port: String,
}

impl Connection {
    /// Creates a new connection between ports.
    #[must_use]
    pub fn new(source_port: impl Into<String>, target_port: impl Into<String>) -> Self {
        Self {
            source_port: source_port.into(),
            target_port: target_port.into(),
        }
    }
}

/// A fully-qualified connection including source and target node IDs.
///
/// This is the import/export representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// The source node ID.
    pub source_node: NodeId,
    /// The source port name.
    pub source_port: String,
    /// The target node ID.
    pub target_node: NodeId,
    /// The target port name.
    pub target_port: String,
}

impl ConnectionSpec {
    /// Creates a new connection spec.
    #[must_use]
    pub fn new(
        source_node: NodeId,
        source_port: impl Into<String>,
        target_node: NodeId,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source_node,
            source_port: source_port.into(),
            target_node,
            target_port: target_port.into(),
        }
    }
}
