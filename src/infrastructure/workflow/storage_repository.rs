//! Workflow state repository backed by the generic snapshot storage

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::storage::Storage;
use crate::domain::workflow::{TenantId, WorkflowId, WorkflowState, WorkflowStateRepository};
use crate::domain::DomainError;

/// Persists one [`WorkflowState`] snapshot per workflow id
#[derive(Debug)]
pub struct StorageWorkflowStateRepository {
    storage: Arc<dyn Storage<WorkflowState>>,
}

impl StorageWorkflowStateRepository {
    pub fn new(storage: Arc<dyn Storage<WorkflowState>>) -> Self {
        Self { storage }
    }

    fn sorted(mut states: Vec<WorkflowState>) -> Vec<WorkflowState> {
        states.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        states
    }
}

#[async_trait]
impl WorkflowStateRepository for StorageWorkflowStateRepository {
    async fn find(&self, id: &WorkflowId) -> Result<Option<WorkflowState>, DomainError> {
        self.storage.get(id).await
    }

    async fn insert(&self, state: WorkflowState) -> Result<WorkflowState, DomainError> {
        let id = state.id().clone();

        self.storage
            .write_guarded(state, &move |stored: Option<&WorkflowState>| match stored {
                Some(existing) if existing.is_active() => Err(DomainError::conflict(format!(
                    "Workflow '{}' already has an active run ({})",
                    id,
                    existing.status()
                ))),
                _ => Ok(()),
            })
            .await
    }

    async fn save(&self, state: WorkflowState) -> Result<WorkflowState, DomainError> {
        let id = state.id().clone();
        let version = state.version();

        self.storage
            .write_guarded(state, &move |stored: Option<&WorkflowState>| match stored {
                None => Err(DomainError::not_found(format!(
                    "Workflow '{}' not found",
                    id
                ))),
                Some(existing) if existing.version() >= version => {
                    Err(DomainError::conflict(format!(
                        "Stale snapshot for workflow '{}': version {} is not newer than stored version {}",
                        id,
                        version,
                        existing.version()
                    )))
                }
                Some(_) => Ok(()),
            })
            .await
    }

    async fn list_active(&self) -> Result<Vec<WorkflowState>, DomainError> {
        let states = self.storage.list().await?;
        Ok(Self::sorted(
            states.into_iter().filter(WorkflowState::is_active).collect(),
        ))
    }

    async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<WorkflowState>, DomainError> {
        let states = self.storage.list().await?;
        Ok(Self::sorted(
            states
                .into_iter()
                .filter(|state| state.tenant_id() == tenant_id)
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{DocumentId, WorkflowStatus};
    use crate::infrastructure::storage::InMemoryStorage;

    fn repository() -> StorageWorkflowStateRepository {
        StorageWorkflowStateRepository::new(Arc::new(InMemoryStorage::new()))
    }

    fn state(document: &str, tenant: &str) -> WorkflowState {
        WorkflowState::new(
            DocumentId::new(document).unwrap(),
            TenantId::new(tenant).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repository();
        let state = state("1", "org-a");

        repo.insert(state.clone()).await.unwrap();

        let found = repo.find(state.id()).await.unwrap();
        assert_eq!(found, Some(state));
    }

    #[tokio::test]
    async fn test_insert_rejects_active_run() {
        let repo = repository();
        repo.insert(state("1", "org-a")).await.unwrap();

        let result = repo.insert(state("1", "org-a")).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_insert_replaces_terminal_run() {
        let repo = repository();
        let mut finished = state("1", "org-a");
        finished.fail("boom").unwrap();
        repo.insert(finished).await.unwrap();

        let fresh = state("1", "org-a");
        repo.insert(fresh.clone()).await.unwrap();

        let found = repo.find(fresh.id()).await.unwrap().unwrap();
        assert_eq!(found.status(), WorkflowStatus::Started);
    }

    #[tokio::test]
    async fn test_save_requires_newer_version() {
        let repo = repository();
        let stored = state("1", "org-a");
        repo.insert(stored.clone()).await.unwrap();

        let mut next = stored.clone();
        next.transition(WorkflowStatus::AnalyzingPrimary, "begin")
            .unwrap();
        repo.save(next.clone()).await.unwrap();

        let stale = repo.save(stored).await;
        assert!(matches!(stale, Err(DomainError::Conflict { .. })));

        let found = repo.find(next.id()).await.unwrap().unwrap();
        assert_eq!(found.status(), WorkflowStatus::AnalyzingPrimary);
    }

    #[tokio::test]
    async fn test_save_unknown_workflow() {
        let repo = repository();

        let result = repo.save(state("404", "org-a")).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_active_and_by_tenant() {
        let repo = repository();
        repo.insert(state("1", "org-a")).await.unwrap();
        repo.insert(state("2", "org-b")).await.unwrap();

        let mut done = state("3", "org-a");
        done.fail("boom").unwrap();
        repo.insert(done).await.unwrap();

        let active: Vec<String> = repo
            .list_active()
            .await
            .unwrap()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(active.len(), 2);
        assert!(!active.contains(&"document-3".to_string()));

        let tenant_a = repo
            .list_by_tenant(&TenantId::new("org-a").unwrap())
            .await
            .unwrap();
        assert_eq!(tenant_a.len(), 2);
        assert!(tenant_a.iter().all(|s| s.tenant_id().as_str() == "org-a"));
    }
}
