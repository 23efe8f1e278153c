//! Error types for the engine crate.

use amber_relay_core::WorkflowId;
use amber_relay_scheduler::ScheduleError;
use std::fmt;

/// Errors from job queue operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Failed to enqueue a job.
    EnqueueFailed { message: String },
    /// Failed to dequeue a job.
    DequeueFailed { message: String },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnqueueFailed { message } => write!(f, "job enqueue failed: {message}"),
            Self::DequeueFailed { message } => write!(f, "job dequeue failed: {message}"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Errors from ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The backing store failed.
    Storage { message: String },
    /// A stored record could not be decoded.
    Decode { message: String },
    /// An attempt was made to modify a completed execution.
    Immutable { execution_id: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { message } => write!(f, "ledger storage failed: {message}"),
            Self::Decode { message } => write!(f, "ledger record decode failed: {message}"),
            Self::Immutable { execution_id } => {
                write!(f, "execution {execution_id} is already completed")
            }
        }
    }
}

impl std::error::Error for LedgerError {}

/// Errors from content/media store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key not found.
    NotFound { key: String },
    /// The backing store failed.
    Storage { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "object not found: {key}"),
            Self::Storage { message } => write!(f, "store operation failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from the execution coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The job names a workflow the repository does not know.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// Ledger failure.
    Ledger(LedgerError),
    /// Queue failure.
    Queue(QueueError),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::Ledger(e) => write!(f, "ledger error: {e}"),
            Self::Queue(e) => write!(f, "queue error: {e}"),
        }
    }
}

impl std::error::Error for CoordinatorError {}

impl From<LedgerError> for CoordinatorError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl From<QueueError> for CoordinatorError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

/// Errors from the engine service facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The named workflow is not registered.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// The workflow graph failed validation.
    InvalidWorkflow { errors: Vec<String> },
    /// Schedule failure.
    Schedule(ScheduleError),
    /// Queue failure.
    Queue(QueueError),
    /// Ledger failure.
    Ledger(LedgerError),
    /// Coordinator failure.
    Coordinator(CoordinatorError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::InvalidWorkflow { errors } => {
                write!(f, "workflow graph is invalid: {}", errors.join("; "))
            }
            Self::Schedule(e) => write!(f, "schedule error: {e}"),
            Self::Queue(e) => write!(f, "queue error: {e}"),
            Self::Ledger(e) => write!(f, "ledger error: {e}"),
            Self::Coordinator(e) => write!(f, "coordinator error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ScheduleError> for EngineError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<QueueError> for EngineError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl From<CoordinatorError> for EngineError {
    fn from(e: CoordinatorError) -> Self {
        Self::Coordinator(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_error_display() {
        let err = QueueError::EnqueueFailed {
            message: "stream unavailable".to_string(),
        };
        assert!(err.to_string().contains("stream unavailable"));
    }

    #[test]
    fn engine_error_wraps_schedule_error() {
        let err: EngineError = ScheduleError::InvalidTimezone {
            timezone: "Nowhere".to_string(),
        }
        .into();
        assert!(err.to_string().contains("Nowhere"));
    }
}
