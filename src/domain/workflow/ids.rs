//! Workflow, document and tenant identifiers

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageKey;
use crate::domain::DomainError;

/// External identifiers: letters, digits, hyphens and underscores
static EXTERNAL_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());

/// Maximum length for document and tenant identifiers
pub const MAX_ID_LENGTH: usize = 64;

/// Prefix of every document workflow identifier
pub const WORKFLOW_ID_PREFIX: &str = "document-";

fn validate_external_id(kind: &str, id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::invalid_id(format!("{} ID cannot be empty", kind)));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(DomainError::invalid_id(format!(
            "{} ID exceeds maximum length of {} characters",
            kind, MAX_ID_LENGTH
        )));
    }

    if !EXTERNAL_ID_PATTERN.is_match(id) {
        return Err(DomainError::invalid_id(format!(
            "Invalid {} ID '{}': only letters, digits, '-' and '_' are allowed",
            kind.to_lowercase(),
            id
        )));
    }

    Ok(())
}

/// Identifier of the document being processed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_external_id("Document", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the tenant (organization) owning a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_external_id("Tenant", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable workflow identifier, derived from the document identifier
///
/// One document maps to exactly one workflow id, which is what limits a
/// document to a single active run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Derive the workflow id for a document
    pub fn for_document(document_id: &DocumentId) -> Self {
        Self(format!("{}{}", WORKFLOW_ID_PREFIX, document_id.as_str()))
    }

    /// Parse an externally supplied workflow id
    pub fn parse(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        let document_part = id.strip_prefix(WORKFLOW_ID_PREFIX).ok_or_else(|| {
            DomainError::invalid_id(format!(
                "Invalid workflow ID '{}': must start with '{}'",
                id, WORKFLOW_ID_PREFIX
            ))
        })?;
        validate_external_id("Document", document_part)?;

        Ok(Self(id))
    }

    /// The document this workflow processes
    pub fn document_id(&self) -> DocumentId {
        DocumentId(self.0[WORKFLOW_ID_PREFIX.len()..].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkflowId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<WorkflowId> for String {
    fn from(id: WorkflowId) -> Self {
        id.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for WorkflowId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_id_is_derived_from_document() {
        let document_id = DocumentId::new("123").unwrap();
        let workflow_id = WorkflowId::for_document(&document_id);

        assert_eq!(workflow_id.as_str(), "document-123");
        assert_eq!(workflow_id.document_id(), document_id);
    }

    #[test]
    fn test_same_document_yields_same_workflow_id() {
        let a = WorkflowId::for_document(&DocumentId::new("inv-2024-07").unwrap());
        let b = WorkflowId::for_document(&DocumentId::new("inv-2024-07").unwrap());

        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_workflow_id() {
        let id = WorkflowId::parse("document-42").unwrap();
        assert_eq!(id.document_id().as_str(), "42");

        assert!(WorkflowId::parse("workflow-42").is_err());
        assert!(WorkflowId::parse("document-").is_err());
        assert!(WorkflowId::parse("document-a b").is_err());
    }

    #[test]
    fn test_invalid_external_ids() {
        assert!(DocumentId::new("").is_err());
        assert!(DocumentId::new("-leading-hyphen").is_err());
        assert!(DocumentId::new("a".repeat(MAX_ID_LENGTH + 1)).is_err());
        assert!(TenantId::new("org/1").is_err());
        assert!(TenantId::new("org_1").is_ok());
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let id = WorkflowId::parse("document-9").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"document-9\"");

        let parsed: WorkflowId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        let invalid: Result<TenantId, _> = serde_json::from_str("\"\"");
        assert!(invalid.is_err());
    }
}
