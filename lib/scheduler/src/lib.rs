//! Cron scheduling for amber-relay workflows.
//!
//! This crate provides:
//!
//! - **CronSchedule**: real cron parsing with IANA timezone support
//! - **Job**: the queue payload with its idempotency key
//! - **ScheduleRegistry**: the min-heap registry that pops due schedules
//!   and advances them strictly forward (missed firings are skipped)
//!
//! The scheduler only produces jobs; it never executes graphs.

pub mod error;
pub mod job;
pub mod registry;
pub mod schedule;

pub use error::ScheduleError;
pub use job::Job;
pub use registry::ScheduleRegistry;
pub use schedule::{CronSchedule, Schedule};
