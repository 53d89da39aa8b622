//! Persisted workflow state snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::WorkflowError;
use super::ids::{DocumentId, TenantId, WorkflowId};
use super::review::ReviewDecision;
use super::status::{ExtractionSource, WorkflowStatus};
use crate::domain::storage::StorageEntity;

/// One committed status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub cause: String,
}

/// Summary returned to callers once a run has finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub status: WorkflowStatus,
    pub error: Option<String>,
    pub extraction_source: Option<ExtractionSource>,
}

/// State machine snapshot for one document-processing run
///
/// The snapshot is the unit of persistence: it is written whole after every
/// transition, and `version` increases with every mutation so a stale copy
/// can never overwrite a newer one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    id: WorkflowId,
    document_id: DocumentId,
    tenant_id: TenantId,
    status: WorkflowStatus,
    #[serde(default)]
    extraction_source: Option<ExtractionSource>,
    #[serde(default)]
    extracted_data: Option<Value>,
    #[serde(default)]
    history: Vec<TransitionRecord>,
    #[serde(default)]
    pending_review: Option<ReviewDecision>,
    #[serde(default)]
    accepted_review: Option<ReviewDecision>,
    #[serde(default)]
    terminal_error: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(document_id: DocumentId, tenant_id: TenantId) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::for_document(&document_id),
            document_id,
            tenant_id,
            status: WorkflowStatus::Started,
            extraction_source: None,
            extracted_data: None,
            history: Vec::new(),
            pending_review: None,
            accepted_review: None,
            terminal_error: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    // Getters

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn extraction_source(&self) -> Option<ExtractionSource> {
        self.extraction_source
    }

    pub fn extracted_data(&self) -> Option<&Value> {
        self.extracted_data.as_ref()
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn pending_review(&self) -> Option<&ReviewDecision> {
        self.pending_review.as_ref()
    }

    pub fn accepted_review(&self) -> Option<&ReviewDecision> {
        self.accepted_review.as_ref()
    }

    pub fn terminal_error(&self) -> Option<&str> {
        self.terminal_error.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn result(&self) -> ProcessingResult {
        ProcessingResult {
            status: self.status,
            error: self.terminal_error.clone(),
            extraction_source: self.extraction_source,
        }
    }

    // State changes

    /// Move to `to`, appending a history record
    pub fn transition(
        &mut self,
        to: WorkflowStatus,
        cause: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            return Err(WorkflowError::invalid_transition(from, to));
        }

        let now = Utc::now();
        self.history.push(TransitionRecord {
            at: now,
            from,
            to,
            cause: cause.into(),
        });
        self.status = to;
        self.touch(now);
        Ok(())
    }

    /// Record the analysis outcome and park for review
    pub fn enter_review(
        &mut self,
        source: ExtractionSource,
        extracted_data: Option<Value>,
        cause: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        self.transition(WorkflowStatus::WaitingForReview, cause)?;
        self.extraction_source = Some(source);
        self.extracted_data = extracted_data;
        Ok(())
    }

    /// Store a review decision delivered while waiting
    ///
    /// Accept-once: a second decision is rejected until the first one has
    /// been consumed by the transition to PROCESSING_REVIEW.
    pub fn record_review(&mut self, decision: ReviewDecision) -> Result<(), WorkflowError> {
        if self.status != WorkflowStatus::WaitingForReview {
            return Err(WorkflowError::not_waiting(self.id.as_str(), self.status));
        }
        if self.pending_review.is_some() {
            return Err(WorkflowError::duplicate_signal(self.id.as_str()));
        }

        self.pending_review = Some(decision);
        self.touch(Utc::now());
        Ok(())
    }

    /// Consume the pending review and start applying it
    pub fn begin_processing_review(
        &mut self,
        decision: ReviewDecision,
    ) -> Result<(), WorkflowError> {
        let cause = format!("review received: {}", decision.outcome());
        self.transition(WorkflowStatus::ProcessingReview, cause)?;
        self.pending_review = None;
        self.accepted_review = Some(decision);
        Ok(())
    }

    pub fn complete(&mut self, cause: impl Into<String>) -> Result<(), WorkflowError> {
        self.transition(WorkflowStatus::Completed, cause)
    }

    /// Terminal failure with a recorded error
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), WorkflowError> {
        let error = error.into();
        self.transition(WorkflowStatus::Failed, error.clone())?;
        self.terminal_error = Some(error);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

impl StorageEntity for WorkflowState {
    type Key = WorkflowId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
