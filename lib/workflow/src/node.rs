//! Workflow node types and configurations.
//!
//! Nodes are the building blocks of workflows. Each node has:
//! - A unique ID within the workflow
//! - A kind (trigger, generator, modifier, action)
//! - Configuration specific to its kind, drawn from a closed set of
//!   statically validated variants
//! - Input and output ports derived from the configuration

use crate::port::{InputPort, OutputPort, PortType};
use amber_relay_core::ConnectionId;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A unique identifier for a node within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a node ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry points that initiate workflow execution.
    Trigger,
    /// Steps that produce content via the generation collaborator.
    Generator,
    /// Pure, deterministic content transforms.
    Modifier,
    /// Terminal steps that publish to an external platform.
    Action,
}

/// A social platform that content can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    LinkedIn,
    X,
    Mastodon,
    Instagram,
    Facebook,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LinkedIn => "linkedin",
            Self::X => "x",
            Self::Mastodon => "mastodon",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
        };
        f.write_str(name)
    }
}

/// Degraded behavior when a generator call fails or times out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Reuse the last successful output of this node.
    Cache,
    /// Substitute a fixed template text.
    Template {
        /// The fallback text.
        text: String,
    },
    /// Skip this node and its downstream branch.
    Skip,
    /// No fallback: the node fails.
    None,
}

/// Configuration for trigger nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Cron-style scheduled trigger.
    Schedule {
        /// Cron expression (5-field classic, or 6/7-field with seconds).
        cron: String,
        /// IANA timezone for the schedule (UTC when absent).
        timezone: Option<String>,
    },
    /// HTTP webhook trigger.
    Webhook {
        /// The webhook path (e.g., "/hooks/weekly-digest").
        path: String,
    },
    /// Manual trigger (user-initiated).
    Manual,
}

/// Configuration for generator nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// Text generation via the external collaborator.
    Text {
        /// The prompt to generate from.
        prompt: String,
        /// Model identifier passed to the collaborator.
        model: String,
        /// Fallback behavior on collaborator failure.
        fallback: FallbackPolicy,
    },
    /// Image generation via the external collaborator.
    Image {
        /// The prompt to generate from.
        prompt: String,
        /// Model identifier passed to the collaborator.
        model: String,
        /// Fallback behavior on collaborator failure.
        fallback: FallbackPolicy,
    },
}

impl GeneratorConfig {
    /// Returns the configured fallback policy.
    #[must_use]
    pub fn fallback(&self) -> &FallbackPolicy {
        match self {
            Self::Text { fallback, .. } | Self::Image { fallback, .. } => fallback,
        }
    }
}

/// Configuration for modifier nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierConfig {
    /// Truncate text to a maximum character count.
    TruncateText {
        /// Maximum number of characters to keep.
        max_chars: u32,
    },
    /// Render text into a fixed template; `{input}` is replaced verbatim.
    RenderTemplate {
        /// The template string.
        template: String,
    },
    /// Resize an image via the media-store collaborator.
    ResizeImage {
        /// Target width in pixels.
        width: u32,
        /// Target height in pixels.
        height: u32,
    },
}

/// Configuration for action (publisher) nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Publish the incoming content to a platform account.
    Publish {
        /// The target platform.
        platform: Platform,
        /// The account connection to publish through.
        connection: ConnectionId,
    },
}

/// Configuration for a node, varying by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    /// Trigger node configuration.
    Trigger(TriggerConfig),
    /// Generator node configuration.
    Generator(GeneratorConfig),
    /// Modifier node configuration.
    Modifier(ModifierConfig),
    /// Action node configuration.
    Action(ActionConfig),
}

impl NodeConfig {
    /// Returns the kind of this node configuration.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger(_) => NodeKind::Trigger,
            Self::Generator(_) => NodeKind::Generator,
            Self::Modifier(_) => NodeKind::Modifier,
            Self::Action(_) => NodeKind::Action,
        }
    }

    /// Validates this configuration against its kind's constraints.
    ///
    /// Full cron/timezone parsing happens in the scheduler when a schedule
    /// is registered; here only the expression shape is checked.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the configuration is unusable.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Trigger(TriggerConfig::Schedule { cron, .. }) => {
                let fields = cron.split_whitespace().count();
                if !(5..=7).contains(&fields) {
                    return Err(format!(
                        "cron expression '{cron}' has {fields} fields, expected 5 to 7"
                    ));
                }
                Ok(())
            }
            Self::Trigger(TriggerConfig::Webhook { path }) => {
                if !path.starts_with('/') {
                    return Err(format!("webhook path '{path}' must start with '/'"));
                }
                Ok(())
            }
            Self::Trigger(TriggerConfig::Manual) => Ok(()),
            Self::Generator(
                GeneratorConfig::Text {
                    prompt,
                    model,
                    fallback,
                }
                | GeneratorConfig::Image {
                    prompt,
                    model,
                    fallback,
                },
            ) => {
                if prompt.trim().is_empty() {
                    return Err("generator prompt must not be empty".to_string());
                }
                if model.trim().is_empty() {
                    return Err("generator model must not be empty".to_string());
                }
                if let FallbackPolicy::Template { text } = fallback
                    && text.trim().is_empty()
                {
                    return Err("template fallback text must not be empty".to_string());
                }
                Ok(())
            }
            Self::Modifier(ModifierConfig::TruncateText { max_chars }) => {
                if *max_chars == 0 {
                    return Err("truncation limit must be positive".to_string());
                }
                Ok(())
            }
            Self::Modifier(ModifierConfig::RenderTemplate { template }) => {
                if template.trim().is_empty() {
                    return Err("render template must not be empty".to_string());
                }
                Ok(())
            }
            Self::Modifier(ModifierConfig::ResizeImage { width, height }) => {
                if *width == 0 || *height == 0 {
                    return Err("resize dimensions must be positive".to_string());
                }
                Ok(())
            }
            Self::Action(ActionConfig::Publish { .. }) => Ok(()),
        }
    }
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node within the workflow.
    pub id: NodeId,
    /// Human-readable name for this node.
    pub name: String,
    /// Node configuration (determines kind and behavior).
    pub config: NodeConfig,
    /// Input ports for this node.
    pub inputs: Vec<InputPort>,
    /// Output ports for this node.
    pub outputs: Vec<OutputPort>,
}

impl Node {
    /// Creates a new node with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self::with_id(NodeId::new(), name, config)
    }

    /// Creates a new node with a specific ID.
    #[must_use]
    pub fn with_id(id: NodeId, name: impl Into<String>, config: NodeConfig) -> Self {
        let (inputs, outputs) = Self::default_ports(&config);
        Self {
            id,
            name: name.into(),
            config,
            inputs,
            outputs,
        }
    }

    /// Returns the kind of this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    /// Returns the input port with the given name, if any.
    #[must_use]
    pub fn input_port(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Returns the output port with the given name, if any.
    #[must_use]
    pub fn output_port(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Derives the port set from a node configuration.
    ///
    /// Triggers have no inputs; actions have no outputs.
    fn default_ports(config: &NodeConfig) -> (Vec<InputPort>, Vec<OutputPort>) {
        match config {
            NodeConfig::Trigger(_) => {
                (vec![], vec![OutputPort::new("output", PortType::Mixed)])
            }
            NodeConfig::Generator(GeneratorConfig::Text { .. }) => (
                vec![InputPort::optional("context", PortType::Mixed)],
                vec![OutputPort::new("content", PortType::Text)],
            ),
            NodeConfig::Generator(GeneratorConfig::Image { .. }) => (
                vec![InputPort::optional("context", PortType::Mixed)],
                vec![OutputPort::new("content", PortType::Image)],
            ),
            NodeConfig::Modifier(
                ModifierConfig::TruncateText { .. } | ModifierConfig::RenderTemplate { .. },
            ) => (
                vec![InputPort::required("input", PortType::Text)],
                vec![OutputPort::new("output", PortType::Text)],
            ),
            NodeConfig::Modifier(ModifierConfig::ResizeImage { .. }) => (
                vec![InputPort::required("input", PortType::Image)],
                vec![OutputPort::new("output", PortType::Image)],
            ),
            NodeConfig::Action(ActionConfig::Publish { .. }) => (
                vec![InputPort::required("content", PortType::Mixed)],
                vec![],
            ),
        }
    }
}
