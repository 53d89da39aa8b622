//! docflow
//!
//! Durable document-analysis workflows:
//! - Primary extraction with a fallback extractor
//! - Suspension until a human review decision arrives
//! - Persisted snapshots so instances survive restarts

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use api::state::AppState;
use domain::audit::{AuditEntry, AuditSink};
use domain::storage::Storage;
use domain::workflow::{WorkflowState, WorkflowStateRepository};
use infrastructure::{
    activity::ActivityFactory,
    audit::{StorageAuditSink, TracingAuditSink},
    storage::{StorageConfig, StorageFactory},
    workflow::{
        shutdown_channel, StorageWorkflowStateRepository, WorkflowDispatcher, WorkflowEngine,
        WorkflowEngineConfig, WorkflowEngineDeps,
    },
};

/// Build the workflow runtime from configuration
///
/// Nothing is started: call `recover` on the dispatcher to resume persisted
/// instances.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage_config = StorageConfig::from_settings(&config.storage);
    info!(
        backend = ?config.storage.backend,
        durable = storage_config.is_durable(),
        "Storage backend selected"
    );

    let workflow_storage: Arc<dyn Storage<WorkflowState>> =
        StorageFactory::create(&storage_config, &config.storage.table).await?;
    let repository: Arc<dyn WorkflowStateRepository> = Arc::new(
        StorageWorkflowStateRepository::new(Arc::clone(&workflow_storage)),
    );

    // In-memory audit entries would only grow; log them instead
    let audit: Arc<dyn AuditSink> = if storage_config.is_durable() {
        let audit_storage: Arc<dyn Storage<AuditEntry>> =
            StorageFactory::create(&storage_config, &config.storage.audit_table).await?;
        Arc::new(StorageAuditSink::new(audit_storage))
    } else {
        Arc::new(TracingAuditSink)
    };

    let activities = ActivityFactory::create(&config.activities)?;

    let (trigger, shutdown) = shutdown_channel();
    let engine = WorkflowEngine::new(
        WorkflowEngineDeps {
            repository: Arc::clone(&repository),
            primary: activities.primary,
            fallback: activities.fallback,
            applier: activities.applier,
            audit,
        },
        WorkflowEngineConfig {
            extraction_policy: config.retry.extraction.clone(),
            review_policy: config.retry.review.clone(),
            audit_timeout: config.engine.audit_timeout(),
        },
        shutdown,
    );

    let dispatcher = Arc::new(WorkflowDispatcher::new(
        Arc::new(engine),
        repository,
        trigger,
    ));

    Ok(AppState::new(dispatcher, workflow_storage))
}
