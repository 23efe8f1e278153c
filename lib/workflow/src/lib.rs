//! Workflow graph model for the amber-relay publishing engine.
//!
//! This crate provides:
//!
//! - **Graph Model**: directed graphs using petgraph with typed nodes and
//!   port-to-port connections
//! - **Node Types**: trigger, generator, modifier, action — a closed set
//!   with statically validated configurations
//! - **Port System**: typed connection points (text, image, video, mixed)
//!   with a fixed compatibility table
//! - **Validator**: pure structural/semantic validation producing the full
//!   error list for a candidate graph
//! - **Execution Records**: execution and per-node result types

pub mod connection;
pub mod content;
pub mod definition;
pub mod error;
pub mod execution;
pub mod graph;
pub mod node;
pub mod port;
pub mod validate;

pub use connection::{Connection, ConnectionSpec};
pub use content::{ContentValue, MediaRef, OutputRef, PostDraft};
pub use definition::{Workflow, WorkflowMetadata};
pub use error::GraphError;
pub use execution::{Execution, ExecutionStatus, NodeResult, NodeStatus, aggregate};
pub use graph::{GraphSpec, WorkflowGraph};
pub use node::{
    ActionConfig, FallbackPolicy, GeneratorConfig, ModifierConfig, Node, NodeConfig, NodeId,
    NodeKind, Platform, TriggerConfig,
};
pub use port::{InputPort, OutputPort, PortType};
pub use validate::{ValidationError, ValidationResult, validate};
