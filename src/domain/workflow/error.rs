//! Workflow error types

use thiserror::Error;

use super::status::WorkflowStatus;
use crate::domain::DomainError;

/// Errors reported synchronously to callers of the workflow engine
///
/// Activity failures never surface here; they are converted to step outcomes
/// and, when fatal, recorded as the instance's terminal error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow already running: {0}")]
    AlreadyRunning(String),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow '{id}' is not waiting for review (status: {status})")]
    NotWaiting { id: String, status: WorkflowStatus },

    #[error("Duplicate signal for workflow: {0}")]
    DuplicateSignal(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Workflow engine is shutting down")]
    ShuttingDown,
}

impl WorkflowError {
    pub fn already_running(id: impl Into<String>) -> Self {
        Self::AlreadyRunning(id.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn not_waiting(id: impl Into<String>, status: WorkflowStatus) -> Self {
        Self::NotWaiting {
            id: id.into(),
            status,
        }
    }

    pub fn duplicate_signal(id: impl Into<String>) -> Self {
        Self::DuplicateSignal(id.into())
    }

    pub fn invalid_transition(from: WorkflowStatus, to: WorkflowStatus) -> Self {
        Self::InvalidTransition { from, to }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Named protocol errors a caller can act on
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning(_)
                | Self::NotFound(_)
                | Self::NotWaiting { .. }
                | Self::DuplicateSignal(_)
        )
    }
}

impl From<DomainError> for WorkflowError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { message } => Self::NotFound(message),
            DomainError::InvalidId { message } | DomainError::Validation { message } => {
                Self::Validation(message)
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}
