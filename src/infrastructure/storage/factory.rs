//! Storage factory for runtime backend selection

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig as StorageSettings};
use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::in_memory::InMemoryStorage;
use super::postgres::{PostgresConfig, PostgresStorage};

/// Resolved storage backend configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    Postgres(PostgresConfig),
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        match settings.backend {
            StorageBackend::Memory => Self::InMemory,
            StorageBackend::Postgres => Self::Postgres(
                PostgresConfig::new(settings.url.clone())
                    .with_max_connections(settings.max_connections)
                    .with_min_connections(settings.min_connections),
            ),
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Postgres(_))
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a storage instance for one entity type, creating its table
    /// when the backend needs one
    pub async fn create<E>(
        config: &StorageConfig,
        table_name: &str,
    ) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match config {
            StorageConfig::InMemory => Ok(Arc::new(InMemoryStorage::<E>::new())),
            StorageConfig::Postgres(pg_config) => {
                let storage = PostgresStorage::<E>::connect(pg_config, table_name).await?;
                storage.ensure_table().await?;
                Ok(Arc::new(storage))
            }
        }
    }
}
