use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

/// Persists audit events as [`AuditEntry`] records
#[derive(Debug)]
pub struct StorageAuditSink {
    storage: Arc<dyn Storage<AuditEntry>>,
}

impl StorageAuditSink {
    pub fn new(storage: Arc<dyn Storage<AuditEntry>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl AuditSink for StorageAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), DomainError> {
        self.storage.create(AuditEntry::new(event)).await?;
        Ok(())
    }
}
