//! Document-processing workflow domain
//!
//! A workflow instance drives one document through the fixed
//! analyze → fallback → review → apply sequence:
//!
//! - primary extraction, retried per [`RetryPolicy`]
//! - fallback extraction when the primary path fails or is not applicable
//! - an unbounded wait for a human [`ReviewDecision`]
//! - applying the decision through a final activity
//!
//! Analysis failures never fail the workflow; a document always reaches
//! review. Only the apply step or an engine error can end in FAILED.

mod activity;
mod entity;
mod error;
mod ids;
pub mod repository;
mod retry;
mod review;
mod status;

pub use activity::{ActivityError, AnalysisResult, ExtractionActivity, ReviewApplier};
pub use entity::{ProcessingResult, TransitionRecord, WorkflowState};
pub use error::WorkflowError;
pub use ids::{DocumentId, TenantId, WorkflowId, MAX_ID_LENGTH, WORKFLOW_ID_PREFIX};
pub use repository::WorkflowStateRepository;
pub use retry::RetryPolicy;
pub use review::{ReviewDecision, ReviewOutcome};
pub use status::{ExtractionSource, WorkflowStatus};
