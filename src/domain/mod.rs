//! Domain layer - Core business logic and entities

pub mod audit;
pub mod error;
pub mod storage;
pub mod workflow;

pub use audit::{AuditAction, AuditEntry, AuditEntryId, AuditEvent, AuditSink};
pub use error::DomainError;
pub use storage::{Storage, StorageEntity, StorageKey};
pub use workflow::{
    ActivityError, AnalysisResult, DocumentId, ExtractionActivity, ExtractionSource,
    ProcessingResult, RetryPolicy, ReviewApplier, ReviewDecision, ReviewOutcome, TenantId,
    TransitionRecord, WorkflowError, WorkflowId, WorkflowState, WorkflowStateRepository,
    WorkflowStatus,
};
