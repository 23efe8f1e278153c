//! Execution engine for amber-relay workflows.
//!
//! This crate ties the graph model, scheduler, generator, and publisher
//! together:
//!
//! - **Job queue**: durable queue with idempotent enqueue (in-memory and
//!   NATS JetStream implementations)
//! - **Node executor**: exhaustive dispatch over the node-kind set with
//!   per-call timeouts and fallback handling
//! - **Coordinator**: per-workflow exclusivity locking, dependency-ordered
//!   evaluation with a bounded worker pool, failure isolation, aggregation
//! - **Ledger**: append-only execution history and the lock table
//!   (in-memory and Postgres implementations)
//! - **Service**: the engine facade consumed by callers

pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod nats;
pub mod postgres;
pub mod queue;
pub mod service;
pub mod store;

pub use config::EngineConfig;
pub use coordinator::{Coordinator, RunOutcome};
pub use error::{CoordinatorError, EngineError, LedgerError, QueueError, StoreError};
pub use executor::{ExecutionContext, NodeExecutor, NodeOutcome};
pub use ledger::{ClaimOutcome, ExecutionLedger, MemoryLedger};
pub use nats::{NatsJobQueue, NatsQueueConfig};
pub use postgres::PostgresLedger;
pub use queue::{EnqueueOutcome, JobQueue, MemoryJobQueue};
pub use service::{EngineService, JobTicket, MemoryWorkflowRepository, WorkflowRepository};
pub use store::{ContentStore, MediaStore, MemoryContentStore, MemoryMediaStore};
