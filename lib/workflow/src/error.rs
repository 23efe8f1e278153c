//! Error types for the workflow crate.
//!
//! `GraphError` covers edit-time graph operations (adding nodes and
//! connections); validation findings are reported separately as data through
//! [`crate::validate::ValidationResult`].

use crate::node::NodeId;
use std::fmt;

/// Errors from graph edit operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// Source port not found on the source node.
    SourcePortNotFound { node_id: NodeId, port_name: String },
    /// Target port not found on the target node.
    TargetPortNotFound { node_id: NodeId, port_name: String },
    /// The target input port already has an incoming connection.
    InputAlreadyConnected { node_id: NodeId, port_name: String },
    /// Source and target port types are incompatible.
    IncompatiblePorts {
        source_node: NodeId,
        source_port: String,
        target_node: NodeId,
        target_port: String,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => {
                write!(f, "node not found: {node_id}")
            }
            Self::SourcePortNotFound { node_id, port_name } => {
                write!(f, "source port '{port_name}' not found on node {node_id}")
            }
            Self::TargetPortNotFound { node_id, port_name } => {
                write!(f, "target port '{port_name}' not found on node {node_id}")
            }
            Self::InputAlreadyConnected { node_id, port_name } => {
                write!(
                    f,
                    "input port '{port_name}' on node {node_id} already has an incoming connection"
                )
            }
            Self::IncompatiblePorts {
                source_node,
                source_port,
                target_node,
                target_port,
            } => {
                write!(
                    f,
                    "incompatible port types: {source_node}:{source_port} -> {target_node}:{target_port}"
                )
            }
        }
    }
}

impl std::error::Error for GraphError {}
