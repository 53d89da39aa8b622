//! Audit event and persisted audit entry

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::workflow::{TenantId, WorkflowId};

/// Entity name recorded for every workflow audit event
pub const AUDIT_ENTITY: &str = "Document";

/// Actor recorded for engine-originated events
pub const AUDIT_USERNAME: &str = "system";

/// Audited workflow task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    AnalyzeDocumentPrimary,
    AnalyzeDocumentFallback,
    ReviewDocument,
    ProcessDocument,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeDocumentPrimary => "AnalyzeDocumentPrimary",
            Self::AnalyzeDocumentFallback => "AnalyzeDocumentFallback",
            Self::ReviewDocument => "ReviewDocument",
            Self::ProcessDocument => "ProcessDocument",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record emitted per workflow transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub entity: String,
    pub entity_id: String,
    pub workflow_id: WorkflowId,
    pub tenant_id: TenantId,
    pub action: AuditAction,
    pub detail: String,
    pub username: String,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        workflow_id: &WorkflowId,
        tenant_id: &TenantId,
        action: AuditAction,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entity: AUDIT_ENTITY.to_string(),
            entity_id: workflow_id.document_id().to_string(),
            workflow_id: workflow_id.clone(),
            tenant_id: tenant_id.clone(),
            action,
            detail: detail.into(),
            username: AUDIT_USERNAME.to_string(),
            at: Utc::now(),
        }
    }
}

/// Identifier of a persisted audit entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(String);

impl AuditEntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl StorageKey for AuditEntryId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored form of an audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    id: AuditEntryId,
    #[serde(flatten)]
    event: AuditEvent,
}

impl AuditEntry {
    pub fn new(event: AuditEvent) -> Self {
        Self {
            id: AuditEntryId::generate(),
            event,
        }
    }

    pub fn id(&self) -> &AuditEntryId {
        &self.id
    }

    pub fn event(&self) -> &AuditEvent {
        &self.event
    }
}

impl StorageEntity for AuditEntry {
    type Key = AuditEntryId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
