//! Audit sink port

use async_trait::async_trait;

use super::entity::AuditEvent;
use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Fire-and-forget destination for audit events
///
/// Callers bound each call with a timeout and never let a failure abort the
/// transition being audited.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), DomainError>;
}
