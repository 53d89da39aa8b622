use async_trait::async_trait;
use tracing::info;

use crate::domain::audit::{AuditEvent, AuditSink};
use crate::domain::DomainError;

/// Writes audit events as structured log lines on the `audit` target
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), DomainError> {
        info!(
            target: "audit",
            entity = %event.entity,
            entity_id = %event.entity_id,
            workflow_id = %event.workflow_id,
            tenant_id = %event.tenant_id,
            action = %event.action,
            username = %event.username,
            "{}",
            event.detail
        );
        Ok(())
    }
}
