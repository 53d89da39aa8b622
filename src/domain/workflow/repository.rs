//! Workflow state repository trait

use async_trait::async_trait;

use super::entity::WorkflowState;
use super::ids::{TenantId, WorkflowId};
use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Durable snapshot store keyed by workflow id
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkflowStateRepository: Send + Sync {
    /// Finds the latest snapshot for a workflow
    async fn find(&self, id: &WorkflowId) -> Result<Option<WorkflowState>, DomainError>;

    /// Stores the first snapshot of a run, replacing a terminal predecessor
    ///
    /// Fails with a conflict if an active run exists for the same id.
    async fn insert(&self, state: WorkflowState) -> Result<WorkflowState, DomainError>;

    /// Replaces the stored snapshot
    ///
    /// Fails with a conflict if the stored snapshot is not older than `state`.
    async fn save(&self, state: WorkflowState) -> Result<WorkflowState, DomainError>;

    /// Lists all non-terminal snapshots
    async fn list_active(&self) -> Result<Vec<WorkflowState>, DomainError>;

    /// Lists snapshots belonging to a tenant
    async fn list_by_tenant(&self, tenant_id: &TenantId)
    -> Result<Vec<WorkflowState>, DomainError>;
}
