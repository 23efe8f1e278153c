//! Platform formatting and publishing for amber-relay.
//!
//! This crate provides:
//!
//! - **Platform catalog**: the fixed constraint table per platform
//! - **Formatter**: pure content shaping with deterministic truncation
//! - **Publisher**: the delivery trait, keyed by a dedupe key so retried
//!   attempts never create duplicate posts
//! - **Delivery driver**: transient/permanent failure classification with
//!   exponential backoff up to a retry ceiling
//! - **Rate limiter**: per-connection sliding windows for client-side
//!   limit discipline

pub mod connection;
pub mod error;
pub mod format;
pub mod platform;
pub mod publisher;
pub mod rate_limit;
pub mod retry;

pub use connection::{ConnectionHandle, ConnectionLookup, StaticConnections};
pub use error::{ConnectionError, FormatError, PublishError};
pub use format::{FormattedPost, format_content, validate_content};
pub use platform::{PlatformConstraints, constraints};
pub use publisher::{
    FailingPublisher, PublishReceipt, Publisher, RecordingPublisher, ScriptedPublisher,
    TracingPublisher,
};
pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use retry::{RetryPolicy, deliver};
