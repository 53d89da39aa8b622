//! Workflow registry and dispatcher
//!
//! Entry point for starting, signaling and querying workflows. Live
//! instances are kept in a registry keyed by workflow id; an id missing from
//! the registry is rehydrated from its persisted snapshot when a review
//! signal arrives for it.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinSet;
use tracing::{info, warn};

use super::engine::{RunExit, WorkflowEngine};
use super::instance::WorkflowInstance;
use super::key_lock::KeyedLocks;
use super::shutdown::ShutdownTrigger;
use crate::domain::workflow::{
    DocumentId, ProcessingResult, ReviewDecision, TenantId, WorkflowError, WorkflowId,
    WorkflowState, WorkflowStateRepository, WorkflowStatus,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_signal, set_active_workflows};

type Registry = Arc<RwLock<HashMap<WorkflowId, Arc<WorkflowInstance>>>>;

fn read(registry: &Registry) -> RwLockReadGuard<'_, HashMap<WorkflowId, Arc<WorkflowInstance>>> {
    registry.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(
    registry: &Registry,
) -> RwLockWriteGuard<'_, HashMap<WorkflowId, Arc<WorkflowInstance>>> {
    registry.write().unwrap_or_else(PoisonError::into_inner)
}

enum Resolved {
    Live(Arc<WorkflowInstance>),
    /// Stored snapshot that cannot take a signal; left unlaunched
    Stored(WorkflowState),
}

pub struct WorkflowDispatcher {
    engine: Arc<WorkflowEngine>,
    repository: Arc<dyn WorkflowStateRepository>,
    instances: Registry,
    locks: KeyedLocks<WorkflowId>,
    tasks: Mutex<JoinSet<()>>,
    shutdown: ShutdownTrigger,
}

impl std::fmt::Debug for WorkflowDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDispatcher")
            .field("engine", &self.engine)
            .field("live_instances", &read(&self.instances).len())
            .field("shutting_down", &self.shutdown.is_triggered())
            .finish()
    }
}

impl WorkflowDispatcher {
    /// `shutdown` must be the trigger paired with the engine's signal
    pub fn new(
        engine: Arc<WorkflowEngine>,
        repository: Arc<dyn WorkflowStateRepository>,
        shutdown: ShutdownTrigger,
    ) -> Self {
        Self {
            engine,
            repository,
            instances: Arc::new(RwLock::new(HashMap::new())),
            locks: KeyedLocks::new(),
            tasks: Mutex::new(JoinSet::new()),
            shutdown,
        }
    }

    /// Start processing a document
    ///
    /// Fails with `AlreadyRunning` while a non-terminal run exists for the
    /// document. A document whose previous run finished starts over under
    /// the same id.
    pub async fn start(
        &self,
        document_id: DocumentId,
        tenant_id: TenantId,
    ) -> Result<WorkflowId, WorkflowError> {
        if self.shutdown.is_triggered() {
            return Err(WorkflowError::ShuttingDown);
        }

        let id = WorkflowId::for_document(&document_id);
        let _key = self.locks.lock(&id).await;

        if let Some(instance) = self.registered(&id) {
            if instance.status().is_active() {
                return Err(WorkflowError::already_running(id.as_str()));
            }
        }

        if let Some(existing) = self.repository.find(&id).await? {
            if existing.is_active() {
                return Err(WorkflowError::already_running(id.as_str()));
            }
            info!(
                workflow_id = %id,
                previous_status = %existing.status(),
                "Restarting finished workflow"
            );
        }

        let state = self
            .repository
            .insert(WorkflowState::new(document_id, tenant_id))
            .await
            .map_err(|e| match e {
                DomainError::Conflict { .. } => WorkflowError::already_running(id.as_str()),
                other => other.into(),
            })?;

        info!(
            workflow_id = %id,
            document_id = %state.document_id(),
            tenant_id = %state.tenant_id(),
            "Workflow started"
        );
        self.launch(state);

        Ok(id)
    }

    /// Deliver a review decision to a workflow waiting for review
    pub async fn signal(
        &self,
        id: &WorkflowId,
        decision: ReviewDecision,
    ) -> Result<(), WorkflowError> {
        let result = {
            let _key = self.locks.lock(id).await;

            match self.resolve(id).await {
                Ok(Resolved::Live(instance)) => self.engine.accept_review(&instance, decision).await,
                Ok(Resolved::Stored(state)) => {
                    Err(WorkflowError::not_waiting(id.as_str(), state.status()))
                }
                Err(e) => Err(e),
            }
        };

        record_signal(match &result {
            Ok(()) => "accepted",
            Err(WorkflowError::DuplicateSignal(_)) => "duplicate",
            Err(WorkflowError::NotWaiting { .. }) => "not_waiting",
            Err(WorkflowError::NotFound(_)) => "not_found",
            Err(_) => "error",
        });

        if let Err(e) = &result {
            warn!(workflow_id = %id, error = %e, "Review signal rejected");
        }

        result
    }

    /// Last committed status
    pub async fn query(&self, id: &WorkflowId) -> Result<WorkflowStatus, WorkflowError> {
        if let Some(instance) = self.registered(id) {
            return Ok(instance.status());
        }

        self.repository
            .find(id)
            .await?
            .map(|state| state.status())
            .ok_or_else(|| WorkflowError::not_found(id.as_str()))
    }

    /// Full snapshot, including history
    pub async fn snapshot(&self, id: &WorkflowId) -> Result<WorkflowState, WorkflowError> {
        if let Some(instance) = self.registered(id) {
            return Ok(instance.snapshot().await);
        }

        self.repository
            .find(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(id.as_str()))
    }

    pub async fn result(&self, id: &WorkflowId) -> Result<ProcessingResult, WorkflowError> {
        Ok(self.snapshot(id).await?.result())
    }

    pub async fn list_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<WorkflowState>, WorkflowError> {
        Ok(self.repository.list_by_tenant(tenant_id).await?)
    }

    /// Resume every persisted non-terminal workflow; returns how many were
    /// launched
    pub async fn recover(&self) -> Result<usize, WorkflowError> {
        if self.shutdown.is_triggered() {
            return Err(WorkflowError::ShuttingDown);
        }

        let mut recovered = 0;

        for state in self.repository.list_active().await? {
            let id = state.id().clone();
            let _key = self.locks.lock(&id).await;

            if self.registered(&id).is_some() {
                continue;
            }

            info!(
                workflow_id = %id,
                status = %state.status(),
                pending_review = state.pending_review().is_some(),
                "Recovering workflow"
            );
            self.launch(state);
            recovered += 1;
        }

        info!(recovered = recovered, "Workflow recovery finished");
        Ok(recovered)
    }

    /// Live instance count per status
    pub fn status_counts(&self) -> HashMap<WorkflowStatus, usize> {
        let mut counts = HashMap::new();
        for instance in read(&self.instances).values() {
            *counts.entry(instance.status()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Interrupt all suspensions and wait for instance tasks to exit
    ///
    /// Committed snapshots are left as they are, ready for `recover`.
    pub async fn shutdown(&self) {
        info!("Shutting down workflow dispatcher");
        self.shutdown.trigger();

        let mut tasks = mem::take(&mut *self.tasks());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Workflow task ended abnormally");
            }
        }
        self.engine.flush_audit().await;

        info!("Workflow dispatcher stopped");
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registered(&self, id: &WorkflowId) -> Option<Arc<WorkflowInstance>> {
        read(&self.instances).get(id).cloned()
    }

    /// Find the instance a signal goes to. Only a snapshot waiting for review
    /// is rehydrated; caller must hold the key lock for `id`
    async fn resolve(&self, id: &WorkflowId) -> Result<Resolved, WorkflowError> {
        if let Some(instance) = self.registered(id) {
            return Ok(Resolved::Live(instance));
        }

        let state = self
            .repository
            .find(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(id.as_str()))?;

        if state.status() != WorkflowStatus::WaitingForReview {
            return Ok(Resolved::Stored(state));
        }

        if self.shutdown.is_triggered() {
            return Err(WorkflowError::ShuttingDown);
        }

        info!(workflow_id = %id, status = %state.status(), "Rehydrating workflow");
        Ok(Resolved::Live(self.launch(state)))
    }

    /// Register the instance and spawn its engine task
    fn launch(&self, state: WorkflowState) -> Arc<WorkflowInstance> {
        let instance = Arc::new(WorkflowInstance::new(state));
        let id = instance.id().clone();

        {
            let mut instances = write(&self.instances);
            instances.insert(id.clone(), Arc::clone(&instance));
            set_active_workflows(instances.len());
        }

        let engine = Arc::clone(&self.engine);
        let registry = Arc::clone(&self.instances);
        let task_instance = Arc::clone(&instance);

        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let exit = engine.run(&task_instance).await;

            if let RunExit::Finished(status) = exit {
                let mut instances = write(&registry);
                if instances
                    .get(&id)
                    .is_some_and(|current| Arc::ptr_eq(current, &task_instance))
                {
                    instances.remove(&id);
                }
                set_active_workflows(instances.len());
                drop(instances);

                info!(workflow_id = %id, status = %status, "Workflow finished");
            }
        });

        instance
    }
}
