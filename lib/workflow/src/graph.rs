//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed graphs where:
//! - Nodes are workflow steps with typed ports
//! - Connections carry content from output ports to input ports
//!
//! Edit operations are atomic: a connection that fails any check is never
//! inserted, leaving the graph unchanged. The serialized form is
//! [`GraphSpec`] (`{nodes, connections}`); deserialization rejects
//! connections whose endpoints do not exist.

use crate::connection::{Connection, ConnectionSpec};
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphSpec", into = "GraphSpec")]
pub struct WorkflowGraph {
    /// The underlying directed graph.
    graph: DiGraph<Node, Connection>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Adds a node to the graph and returns its ID.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let node_id = node.id;
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        node_id
    }

    /// Removes a node from the graph, along with all of its connections.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let index = self.node_index_map.remove(&node_id)?;
        let removed = self.graph.remove_node(index);
        // petgraph swaps the last node into the removed slot, invalidating
        // one index in the map.
        self.rebuild_index_map();
        removed
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns all node IDs in the graph.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().map(|n| n.id)
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of connections in the graph.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Connects a source node's output port to a target node's input port.
    ///
    /// The operation is atomic: every check runs before anything is
    /// inserted, so a rejected connection leaves the graph unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if either node or port does not exist, the target
    /// input already has an incoming connection, or the port types are
    /// incompatible.
    pub fn connect(&mut self, spec: ConnectionSpec) -> Result<(), GraphError> {
        let source_index = *self
            .node_index_map
            .get(&spec.source_node)
            .ok_or(GraphError::NodeNotFound {
                node_id: spec.source_node,
            })?;
        let target_index = *self
            .node_index_map
            .get(&spec.target_node)
            .ok_or(GraphError::NodeNotFound {
                node_id: spec.target_node,
            })?;

        let source_node = &self.graph[source_index];
        let target_node = &self.graph[target_index];

        let source_port = source_node.output_port(&spec.source_port).ok_or_else(|| {
            GraphError::SourcePortNotFound {
                node_id: spec.source_node,
                port_name: spec.source_port.clone(),
            }
        })?;
        let target_port = target_node.input_port(&spec.target_port).ok_or_else(|| {
            GraphError::TargetPortNotFound {
                node_id: spec.target_node,
                port_name: spec.target_port.clone(),
            }
        })?;

        if !source_port.port_type.can_feed(target_port.port_type) {
            return Err(GraphError::IncompatiblePorts {
                source_node: spec.source_node,
                source_port: spec.source_port,
                target_node: spec.target_node,
                target_port: spec.target_port,
            });
        }

        // An input port is single-valued.
        let already_fed = self
            .graph
            .edges_directed(target_index, Direction::Incoming)
            .any(|edge| edge.weight().target_port == spec.target_port);
        if already_fed {
            return Err(GraphError::InputAlreadyConnected {
                node_id: spec.target_node,
                port_name: spec.target_port,
            });
        }

        self.graph.add_edge(
            source_index,
            target_index,
            Connection::new(spec.source_port, spec.target_port),
        );
        Ok(())
    }

    /// Returns the predecessors (upstream nodes) of a given node.
    pub fn predecessors(&self, node_id: NodeId) -> Vec<(&Node, &Connection)> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(index, Direction::Incoming)
            .filter_map(|edge| {
                let source = self.graph.node_weight(edge.source())?;
                Some((source, edge.weight()))
            })
            .collect()
    }

    /// Returns the successors (downstream nodes) of a given node.
    pub fn successors(&self, node_id: NodeId) -> Vec<(&Node, &Connection)> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(index, Direction::Outgoing)
            .filter_map(|edge| {
                let target = self.graph.node_weight(edge.target())?;
                Some((target, edge.weight()))
            })
            .collect()
    }

    /// Returns every connection as a fully-qualified spec.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionSpec> {
        self.graph
            .edge_references()
            .filter_map(|edge| {
                let source = self.graph.node_weight(edge.source())?;
                let target = self.graph.node_weight(edge.target())?;
                Some(ConnectionSpec {
                    source_node: source.id,
                    source_port: edge.weight().source_port.clone(),
                    target_node: target.id,
                    target_port: edge.weight().target_port.clone(),
                })
            })
            .collect()
    }

    /// Exports the graph to its serializable spec form.
    #[must_use]
    pub fn to_spec(&self) -> GraphSpec {
        GraphSpec {
            nodes: self.graph.node_weights().cloned().collect(),
            connections: self.connections(),
        }
    }

    /// Builds a graph from its spec form.
    ///
    /// Connections referencing unknown nodes are rejected (no dangling
    /// endpoints). Port-level problems are left for the validator so that
    /// externally produced graphs can be loaded and fully diagnosed.
    ///
    /// # Errors
    ///
    /// Returns an error if a connection references a node not in `nodes`.
    pub fn from_spec(spec: GraphSpec) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in spec.nodes {
            graph.add_node(node);
        }

        for conn in spec.connections {
            let source_index =
                *graph
                    .node_index_map
                    .get(&conn.source_node)
                    .ok_or(GraphError::NodeNotFound {
                        node_id: conn.source_node,
                    })?;
            let target_index =
                *graph
                    .node_index_map
                    .get(&conn.target_node)
                    .ok_or(GraphError::NodeNotFound {
                        node_id: conn.target_node,
                    })?;
            graph.graph.add_edge(
                source_index,
                target_index,
                Connection::new(conn.source_port, conn.target_port),
            );
        }

        Ok(graph)
    }

    /// Rebuilds the node index map after structural modification.
    fn rebuild_index_map(&mut self) {
        self.node_index_map.clear();
        for index in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(index) {
                self.node_index_map.insert(node.id, index);
            }
        }
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// The serializable form of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    /// All nodes in the graph.
    pub nodes: Vec<Node>,
    /// All connections between node ports.
    pub connections: Vec<ConnectionSpec>,
}

impl From<WorkflowGraph> for GraphSpec {
    fn from(graph: WorkflowGraph) -> Self {
        graph.to_spec()
    }
}

impl TryFrom<GraphSpec> for WorkflowGraph {
    type Error = GraphError;

    fn try_from(spec: GraphSpec) -> Result<Self, Self::Error> {
        Self::from_spec(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{
        ActionConfig, FallbackPolicy, GeneratorConfig, NodeConfig, Platform, TriggerConfig,
    };
    use amber_relay_core::ConnectionId;

    fn trigger_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Trigger(TriggerConfig::Schedule {
                cron: "0 9 * * MON".to_string(),
                timezone: None,
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

    fn truncate_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Modifier(crate::node::ModifierConfig::TruncateText { max_chars: 100 }),
        )
    }

    #[test]
    fn add_and_get_node() {
        let mut graph = WorkflowGraph::new();
        let node = trigger_node("Trigger");
        let node_id = graph.add_node(node);

        assert_eq!(graph.node(node_id).unwrap().name, "Trigger");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn connect_compatible_ports() {
        let mut graph = WorkflowGraph::new();
        let trigger = graph.add_node(trigger_node("Trigger"));
        let generator = graph.add_node(text_node("Generator"));

        let result = graph.connect(ConnectionSpec::new(trigger, "output", generator, "context"));
        assert!(result.is_ok());
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn connect_rejects_missing_port() {
        let mut graph = WorkflowGraph::new();
        let trigger = graph.add_node(trigger_node("Trigger"));
        let generator = graph.add_node(text_node("Generator"));

        let result = graph.connect(ConnectionSpec::new(
            trigger,
            "nonexistent",
            generator,
            "context",
        ));
        assert!(matches!(
            result,
            Err(GraphError::SourcePortNotFound { .. })
        ));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn connect_rejects_image_into_text_input_and_leaves_graph_unchanged() {
        let mut graph = WorkflowGraph::new();
        let image = graph.add_node(image_node("Image"));
        let truncate = graph.add_node(truncate_node("Truncate"));

        let result = graph.connect(ConnectionSpec::new(image, "content", truncate, "input"));
        assert!(matches!(result, Err(GraphError::IncompatiblePorts { .. })));
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn connect_rejects_second_feed_into_same_input() {
        let mut graph = WorkflowGraph::new();
        let a = graph.add_node(text_node("A"));
        let b = graph.add_node(text_node("B"));
        let publish = graph.add_node(publish_node("Publish"));

        graph
            .connect(ConnectionSpec::new(a, "content", publish, "content"))
            .unwrap();
        let result = graph.connect(ConnectionSpec::new(b, "content", publish, "content"));
        assert!(matches!(
            result,
            Err(GraphError::InputAlreadyConnected { .. })
        ));
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn predecessors_and_successors() {
        let mut graph = WorkflowGraph::new();
        let trigger = graph.add_node(trigger_node("Trigger"));
        let generator = graph.add_node(text_node("Generator"));
        graph
            .connect(ConnectionSpec::new(trigger, "output", generator, "context"))
            .unwrap();

        let preds = graph.predecessors(generator);
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].0.id, trigger);

        let succs = graph.successors(trigger);
        assert_eq!(succs.len(), 1);
        assert_eq!(succs[0].0.id, generator);
    }

    #[test]
    fn remove_node_drops_connections() {
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

        graph.remove_node(generator);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connection_count(), 0);
        // Remaining nodes still resolve through the rebuilt index.
        assert!(graph.node(trigger).is_some());
        assert!(graph.node(publish).is_some());
    }

    #[test]
    fn from_spec_rejects_dangling_endpoint() {
        let node = trigger_node("Trigger");
        let node_id = node.id;
        let spec = GraphSpec {
            nodes: vec![node],
            connections: vec![ConnectionSpec::new(
                node_id,
                "output",
                NodeId::new(),
                "context",
            )],
        };

        assert!(matches!(
            WorkflowGraph::from_spec(spec),
            Err(GraphError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn spec_roundtrip_is_identity() {
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

        let spec = graph.to_spec();
        let rebuilt = WorkflowGraph::from_spec(spec.clone()).expect("rebuild");

        assert_eq!(rebuilt.to_spec(), spec);
    }

    #[test]
    fn graph_serde_roundtrip() {
        let mut graph = WorkflowGraph::new();
        let trigger = graph.add_node(trigger_node("Trigger"));
        let generator = graph.add_node(text_node("Generator"));
        graph
            .connect(ConnectionSpec::new(trigger, "output", generator, "context"))
            .unwrap();

        let json = serde_json::to_string(&graph).expect("serialize");
        let parsed: WorkflowGraph = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.node_count(), 2);
        assert_eq!(parsed.connection_count(), 1);
        assert!(parsed.node(trigger).is_some());
        assert_eq!(parsed.to_spec(), graph.to_spec());
    }
}
