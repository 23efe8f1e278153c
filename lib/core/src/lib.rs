//! Core domain types and utilities for the amber-relay platform.
//!
//! This crate provides the foundational identifier types and the shared
//! error-handling `Result` alias used throughout the amber-relay social
//! publishing engine.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConnectionId, ExecutionId, ScheduleId, UserId, WorkflowId};
