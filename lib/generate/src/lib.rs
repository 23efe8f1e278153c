//! Content-generation collaborator interface for amber-relay.
//!
//! The engine never generates content itself: generator nodes call an
//! external collaborator through the [`ContentGenerator`] trait. This crate
//! defines that seam, a deterministic built-in backend, and test doubles.

pub mod error;
pub mod generator;

pub use error::GenerateError;
pub use generator::{
    ContentGenerator, ContentKind, FailingGenerator, GenerateRequest, PendingGenerator,
    StaticGenerator, TemplateBackend,
};
