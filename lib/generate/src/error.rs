//! Error types for the generation collaborator.

use std::fmt;

/// Errors from a content-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// The collaborator could not be reached or returned a server error.
    Unavailable { message: String },
    /// The collaborator rejected the request (bad parameters, unsupported
    /// content kind).
    Rejected { message: String },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { message } => {
                write!(f, "content generator unavailable: {message}")
            }
            Self::Rejected { message } => {
                write!(f, "content generation rejected: {message}")
            }
        }
    }
}

impl std::error::Error for GenerateError {}
