//! Content values flowing between workflow nodes.
//!
//! Node outputs are persisted to the content store and referenced by key;
//! execution records carry only [`OutputRef`] pointers, never raw payloads.

use crate::port::PortType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A reference to a media object held by the external media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Storage key of the object.
    pub key: String,
    /// MIME content type (e.g. "image/png").
    pub content_type: String,
}

impl MediaRef {
    /// Creates a new media reference.
    #[must_use]
    pub fn new(key: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content_type: content_type.into(),
        }
    }
}

/// A composite draft of a social post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostDraft {
    /// The post text, if any.
    pub text: Option<String>,
    /// Attached media, in display order.
    pub media: Vec<MediaRef>,
}

/// A typed content value produced by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentValue {
    /// Plain text.
    Text(String),
    /// A single image reference.
    Image(MediaRef),
    /// A single video reference.
    Video(MediaRef),
    /// A composite post draft.
    Post(PostDraft),
    /// Raw structured data (trigger payloads, webhook bodies).
    Data(JsonValue),
}

impl ContentValue {
    /// Returns the port type this value travels over.
    #[must_use]
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Text(_) => PortType::Text,
            Self::Image(_) => PortType::Image,
            Self::Video(_) => PortType::Video,
            Self::Post(_) | Self::Data(_) => PortType::Mixed,
        }
    }

    /// Returns the text payload, if this value carries one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Post(draft) => draft.text.as_deref(),
            _ => None,
        }
    }
}

/// A pointer to a stored node output.
///
/// Execution records reference outputs by key; the content store resolves
/// the key back to the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputRef {
    /// Content store key.
    pub key: String,
}

impl OutputRef {
    /// Creates a new output reference.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}
