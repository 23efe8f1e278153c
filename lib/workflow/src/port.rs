//! Port system for workflow nodes.
//!
//! Ports are named connection points on nodes. Each port carries one of the
//! four content types; a connection is valid only if the source output's
//! type is accepted by the target input's type per the fixed table below.

use serde::{Deserialize, Serialize};

/// The content type carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    /// Plain text content.
    Text,
    /// A single image reference.
    Image,
    /// A single video reference.
    Video,
    /// Composite or untyped content (post drafts, trigger payloads).
    Mixed,
}

impl PortType {
    /// Returns true if an output of this type may feed an input of `input`.
    ///
    /// The table is fixed: a typed output feeds an input of the same type or
    /// a mixed input; a mixed output feeds only a mixed input.
    #[must_use]
    pub fn can_feed(self, input: PortType) -> bool {
        self == input || input == PortType::Mixed
    }
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// An input port on a workflow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPort {
    /// The name of this port.
    pub name: String,
    /// The content type this port accepts.
    pub port_type: PortType,
    /// Whether this input must have an incoming connection.
    pub required: bool,
}

impl InputPort {
    /// Creates a new required input port.
    #[must_use]
    pub fn required(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            required: true,
        }
    }

    /// Creates a new optional input port.
    #[must_use]
    pub fn optional(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            required: false,
        }
    }
}

/// An output port on a workflow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    /// The name of this port.
    pub name: String,
    /// The content type this port produces.
    pub port_type: PortType,
}

impl OutputPort {
    /// Creates a new output port.
    #[must_use]
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_feeds() {
        assert!(PortType::Text.can_feed(PortType::Text));
        assert!(PortType::Image.can_feed(PortType::Image));
    }

    #[test]
    fn typed_output_feeds_mixed_input() {
        assert!(PortType::Text.can_feed(PortType::Mixed));
        assert!(PortType::Image.can_feed(PortType::Mixed));
        assert!(PortType::Video.can_feed(PortType::Mixed));
    }

    #[test]
    fn cross_type_rejected() {
        assert!(!PortType::Image.can_feed(PortType::Text));
        assert!(!PortType::Text.can_feed(PortType::Image));
        assert!(!PortType::Video.can_feed(PortType::Image));
    }

    #[test]
    fn mixed_output_feeds_only_mixed() {
        assert!(PortType::Mixed.can_feed(PortType::Mixed));
        assert!(!PortType::Mixed.can_feed(PortType::Text));
        assert!(!PortType::Mixed.can_feed(PortType::Image));
    }

    #[test]
    fn port_serde_roundtrip() {
        let port = InputPort::required("content", PortType::Text);
        let json = serde_json::to_string(&port).expect("serialize");
        let parsed: InputPort = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(port, parsed);
    }
}
