//! Read-only commands over persisted workflow snapshots

use std::sync::Arc;

use clap::Args;
use tracing::warn;

use crate::config::AppConfig;
use crate::domain::storage::Storage;
use crate::domain::workflow::{TenantId, WorkflowId, WorkflowState, WorkflowStateRepository};
use crate::infrastructure::logging;
use crate::infrastructure::storage::{StorageConfig, StorageFactory};
use crate::infrastructure::workflow::StorageWorkflowStateRepository;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Workflow id, e.g. `document-42`
    pub workflow_id: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Tenant whose workflows are listed
    #[arg(long)]
    pub tenant: String,
}

pub async fn status(args: StatusArgs) -> anyhow::Result<()> {
    let id = WorkflowId::parse(args.workflow_id)?;
    let repository = open_repository().await?;

    let state = repository
        .find(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Workflow '{}' not found", id))?;

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

pub async fn list(args: ListArgs) -> anyhow::Result<()> {
    let tenant = TenantId::new(args.tenant)?;
    let repository = open_repository().await?;

    for state in repository.list_by_tenant(&tenant).await? {
        println!("{}", summary_line(&state));
    }

    Ok(())
}

fn summary_line(state: &WorkflowState) -> String {
    let source = state
        .extraction_source()
        .map(|s| s.as_str())
        .unwrap_or("-");

    format!(
        "{}\t{}\t{}\t{}",
        state.id(),
        state.status(),
        source,
        state.updated_at().to_rfc3339()
    )
}

async fn open_repository() -> anyhow::Result<StorageWorkflowStateRepository> {
    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let storage_config = StorageConfig::from_settings(&config.storage);
    if !storage_config.is_durable() {
        warn!("In-memory storage holds no workflows outside a running server");
    }

    let storage: Arc<dyn Storage<WorkflowState>> =
        StorageFactory::create(&storage_config, &config.storage.table).await?;
    Ok(StorageWorkflowStateRepository::new(storage))
}
