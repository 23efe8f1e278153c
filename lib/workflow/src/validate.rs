//! Structural and semantic validation of workflow graphs.
//!
//! Validation is pure and side-effect-free. It runs at edit time (before a
//! revision is accepted) and again before every execution, as a defense
//! against stale or externally generated graphs. Unlike the edit-time
//! `connect` checks, the validator reports the complete list of problems.
//!
//! Checks, in order:
//! 1. acyclicity via Kahn's algorithm — any residual unordered nodes are on
//!    a cycle and are reported by ID
//! 2. every input port has at most one incoming connection
//! 3. connection port types are compatible per the fixed table
//! 4. every node configuration passes its kind's validation
//! 5. every required input port is fed

use crate::graph::WorkflowGraph;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// The graph contains a cycle through these nodes.
    Cycle { node_ids: Vec<NodeId> },
    /// An input port has more than one incoming connection.
    DuplicateInput { node_id: NodeId, port_name: String },
    /// A connection references a port that does not exist on its node.
    UnknownPort { node_id: NodeId, port_name: String },
    /// A connection joins incompatible port types.
    IncompatiblePorts {
        source_node: NodeId,
        source_port: String,
        target_node: NodeId,
        target_port: String,
    },
    /// A node configuration failed its kind's validation.
    InvalidConfig { node_id: NodeId, reason: String },
    /// A required input port has no incoming connection.
    MissingRequiredInput { node_id: NodeId, port_name: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { node_ids } => {
                let ids: Vec<String> = node_ids.iter().map(ToString::to_string).collect();
                write!(f, "graph contains a cycle through: {}", ids.join(", "))
            }
            Self::DuplicateInput { node_id, port_name } => {
                write!(
                    f,
                    "input port '{port_name}' on node {node_id} has multiple incoming connections"
                )
            }
            Self::UnknownPort { node_id, port_name } => {
                write!(f, "port '{port_name}' does not exist on node {node_id}")
            }
            Self::IncompatiblePorts {
                source_node,
                source_port,
                target_node,
                target_port,
            } => {
                write!(
                    f,
                    "incompatible connection: {source_node}:{source_port} -> {target_node}:{target_port}"
                )
            }
            Self::InvalidConfig { node_id, reason } => {
                write!(f, "invalid configuration on node {node_id}: {reason}")
            }
            Self::MissingRequiredInput { node_id, port_name } => {
                write!(
                    f,
                    "required input port '{port_name}' on node {node_id} has no incoming connection"
                )
            }
        }
    }
}

/// The outcome of validating a graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Every finding, in check order.
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Returns true if the graph passed every check.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates a workflow graph, returning the complete finding list.
///
/// A graph with any finding is never executed.
#[must_use]
pub fn validate(graph: &WorkflowGraph) -> ValidationResult {
    let mut errors = Vec::new();

    if let Err(cycle_nodes) = topological_order(graph) {
        errors.push(ValidationError::Cycle {
            node_ids: cycle_nodes,
        });
    }

    // Incoming connections per (target node, target port).
    let connections = graph.connections();
    let mut incoming: HashMap<(NodeId, &str), u32> = HashMap::new();
    for conn in &connections {
        *incoming
            .entry((conn.target_node, conn.target_port.as_str()))
            .or_insert(0) += 1;
    }
    let mut duplicates: Vec<_> = incoming
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|((node_id, port), _)| (*node_id, (*port).to_string()))
        .collect();
    duplicates.sort();
    for (node_id, port_name) in duplicates {
        errors.push(ValidationError::DuplicateInput { node_id, port_name });
    }

    for conn in &connections {
        // Endpoint nodes are guaranteed by construction; ports are not.
        let (Some(source), Some(target)) =
            (graph.node(conn.source_node), graph.node(conn.target_node))
        else {
            continue;
        };

        let source_port = match source.output_port(&conn.source_port) {
            Some(port) => port,
            None => {
                errors.push(ValidationError::UnknownPort {
                    node_id: conn.source_node,
                    port_name: conn.source_port.clone(),
                });
                continue;
            }
        };
        let target_port = match target.input_port(&conn.target_port) {
            Some(port) => port,
            None => {
                errors.push(ValidationError::UnknownPort {
                    node_id: conn.target_node,
                    port_name: conn.target_port.clone(),
                });
                continue;
            }
        };

        if !source_port.port_type.can_feed(target_port.port_type) {
            errors.push(ValidationError::IncompatiblePorts {
                source_node: conn.source_node,
                source_port: conn.source_port.clone(),
                target_node: conn.target_node,
                target_port: conn.target_port.clone(),
            });
        }
    }

    for node in graph.nodes() {
        if let Err(reason) = node.config.validate() {
            errors.push(ValidationError::InvalidConfig {
                node_id: node.id,
                reason,
            });
        }
    }

    for node in graph.nodes() {
        for input in &node.inputs {
            if input.required && !incoming.contains_key(&(node.id, input.name.as_str())) {
                errors.push(ValidationError::MissingRequiredInput {
                    node_id: node.id,
                    port_name: input.name.clone(),
                });
            }
        }
    }

    ValidationResult { errors }
}

/// Computes a topological order of the graph via Kahn's algorithm.
///
/// # Errors
///
/// Returns the IDs of the nodes that lie on a cycle.
pub fn topological_order(graph: &WorkflowGraph) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let nodes: Vec<NodeId> = graph.node_ids().collect();
    let edges: Vec<(NodeId, NodeId)> = graph
        .connections()
        .iter()
        .map(|conn| (conn.source_node, conn.target_node))
        .collect();

    let (order, forward_residual) = kahn(&nodes, edges.iter().copied());
    if forward_residual.is_empty() {
        return Ok(order);
    }

    // The forward residual holds the cycle members plus everything
    // downstream of them; intersecting with the reverse pass keeps only
    // nodes that a cycle actually runs through.
    let (_, backward_residual) = kahn(&nodes, edges.iter().map(|&(source, target)| (target, source)));
    let backward: HashSet<NodeId> = backward_residual.into_iter().collect();
    let mut cycle: Vec<NodeId> = forward_residual
        .into_iter()
        .filter(|id| backward.contains(id))
        .collect();
    cycle.sort();
    Err(cycle)
}

/// One Kahn pass: returns the processed order and the residual (unordered)
/// nodes.
fn kahn(
    nodes: &[NodeId],
    edges: impl Iterator<Item = (NodeId, NodeId)>,
) -> (Vec<NodeId>, Vec<NodeId>) {
    let mut indegree: HashMap<NodeId, usize> = nodes.iter().map(|id| (*id, 0)).collect();
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (source, target) in edges {
        if let Some(count) = indegree.get_mut(&target) {
            *count += 1;
        }
        adjacency.entry(source).or_default().push(target);
    }

    let mut queue: VecDeque<NodeId> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node_id) = queue.pop_front() {
        order.push(node_id);
        for target in adjacency.get(&node_id).cloned().unwrap_or_default() {
            if let Some(count) = indegree.get_mut(&target) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(target);
                }
            }
        }
        indegree.remove(&node_id);
    }

    let residual = indegree.keys().copied().collect();
    (order, residual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionSpec;
    use crate::graph::GraphSpec;
    use crate::node::{
        ActionConfig, FallbackPolicy, GeneratorConfig, Node, NodeConfig, Platform, TriggerConfig,
    };
    use amber_relay_core::ConnectionId;

    fn trigger_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Trigger(TriggerConfig::Schedule {
                cron: "0 9 * * MON".to_string(),
                timezone: Some("UTC".to_string()),
            }),
        )
    }

    fn text_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Generator(GeneratorConfig::Text {
                prompt: "weekly update".to_string(),
                model: "standard".to_string(),
                fallback: FallbackPolicy::None,
            }),
        )
    }

    fn image_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Generator(GeneratorConfig::Image {
                prompt: "header art".to_string(),
                model: "image-v1".to_string(),
                fallback: FallbackPolicy::None,
            }),
        )
    }

    fn publish_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Action(ActionConfig::Publish {
                platform: Platform::LinkedIn,
                connection: ConnectionId::new(),
            }),
        )
    }

    fn valid_pipeline() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        let trigger = graph.add_node(trigger_node("Trigger"));
        let generator = graph.add_node(text_node("Generator"));
        let publish = graph.add_node(publish_node("Publish"));
        graph
            .connect(ConnectionSpec::new(trigger, "output", generator, "context"))
            .unwrap();
        graph
            .connect(ConnectionSpec::new(generator, "content", publish, "content"))
            .unwrap();
        graph
    }

    #[test]
    fn valid_graph_has_no_errors() {
        let graph = valid_pipeline();
        let result = validate(&graph);
        assert!(result.is_valid(), "unexpected errors: {:?}", result.errors);
    }

    #[test]
    fn cycle_is_reported_with_offending_nodes() {
        // Build a cycle through the spec path, since `connect` has no
        // cycle check (it is the validator's job).
        let a = text_node("A");
        let b = text_node("B");
        let (id_a, id_b) = (a.id, b.id);
        let spec = GraphSpec {
            nodes: vec![a, b],
            connections: vec![
                ConnectionSpec::new(id_a, "content", id_b, "context"),
                ConnectionSpec::new(id_b, "content", id_a, "context"),
            ],
        };
        let graph = WorkflowGraph::from_spec(spec).unwrap();

        let result = validate(&graph);
        let cycle = result
            .errors
            .iter()
            .find_map(|e| match e {
                ValidationError::Cycle { node_ids } => Some(node_ids),
                _ => None,
            })
            .expect("cycle error");
        assert!(cycle.contains(&id_a));
        assert!(cycle.contains(&id_b));
    }

    #[test]
    fn nodes_off_the_cycle_are_not_reported() {
        let a = text_node("A");
        let b = text_node("B");
        let c = publish_node("C");
        let (id_a, id_b, id_c) = (a.id, b.id, c.id);
        let spec = GraphSpec {
            nodes: vec![a, b, c],
            connections: vec![
                ConnectionSpec::new(id_a, "content", id_b, "context"),
                ConnectionSpec::new(id_b, "content", id_a, "context"),
                ConnectionSpec::new(id_b, "content", id_c, "content"),
            ],
        };
        let graph = WorkflowGraph::from_spec(spec).unwrap();

        let result = validate(&graph);
        let cycle = result
            .errors
            .iter()
            .find_map(|e| match e {
                ValidationError::Cycle { node_ids } => Some(node_ids),
                _ => None,
            })
            .expect("cycle error");
        assert!(cycle.contains(&id_a));
        assert!(cycle.contains(&id_b));
        // C hangs off the cycle: it never becomes ready, but it is not a
        // member of the cycle itself.
        assert!(!cycle.contains(&id_c));
    }

    #[test]
    fn duplicate_input_is_reported() {
        let a = text_node("A");
        let b = text_node("B");
        let p = publish_node("P");
        let (id_a, id_b, id_p) = (a.id, b.id, p.id);
        let spec = GraphSpec {
            nodes: vec![a, b, p],
            connections: vec![
                ConnectionSpec::new(id_a, "content", id_p, "content"),
                ConnectionSpec::new(id_b, "content", id_p, "content"),
            ],
        };
        let graph = WorkflowGraph::from_spec(spec).unwrap();

        let result = validate(&graph);
        assert!(result.errors.iter().any(|e| matches!(
            e,
            ValidationError::DuplicateInput { node_id, .. } if *node_id == id_p
        )));
    }

    #[test]
    fn incompatible_connection_is_reported() {
        let image = image_node("Image");
        let truncate = Node::new(
            "Truncate",
            NodeConfig::Modifier(crate::node::ModifierConfig::TruncateText { max_chars: 10 }),
        );
        let (id_image, id_truncate) = (image.id, truncate.id);
        let spec = GraphSpec {
            nodes: vec![image, truncate],
            connections: vec![ConnectionSpec::new(id_image, "content", id_truncate, "input")],
        };
        let graph = WorkflowGraph::from_spec(spec).unwrap();

        let result = validate(&graph);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::IncompatiblePorts { .. })));
    }

    #[test]
    fn unknown_port_is_reported() {
        let a = text_node("A");
        let p = publish_node("P");
        let (id_a, id_p) = (a.id, p.id);
        let spec = GraphSpec {
            nodes: vec![a, p],
            connections: vec![ConnectionSpec::new(id_a, "no_such_port", id_p, "content")],
        };
        let graph = WorkflowGraph::from_spec(spec).unwrap();

        let result = validate(&graph);
        assert!(result.errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownPort { node_id, .. } if *node_id == id_a
        )));
    }

    #[test]
    fn invalid_config_is_reported() {
        let mut graph = WorkflowGraph::new();
        let bad = Node::new(
            "Bad Trigger",
            NodeConfig::Trigger(TriggerConfig::Schedule {
                cron: "whenever".to_string(),
                timezone: None,
            }),
        );
        let bad_id = graph.add_node(bad);

        let result = validate(&graph);
        assert!(result.errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidConfig { node_id, .. } if *node_id == bad_id
        )));
    }

    #[test]
    fn unfed_required_input_is_reported() {
        let mut graph = WorkflowGraph::new();
        let publish = graph.add_node(publish_node("Publish"));

        let result = validate(&graph);
        assert!(result.errors.iter().any(|e| matches!(
            e,
            ValidationError::MissingRequiredInput { node_id, .. } if *node_id == publish
        )));
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let graph = valid_pipeline();
        let order = topological_order(&graph).expect("acyclic");
        assert_eq!(order.len(), 3);

        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for conn in graph.connections() {
            assert!(position[&conn.source_node] < position[&conn.target_node]);
        }
    }
}
