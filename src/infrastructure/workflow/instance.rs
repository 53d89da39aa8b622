//! Live workflow instance shared between the engine task and callers

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::warn;

use super::inbox::SignalInbox;
use crate::domain::workflow::{DocumentId, TenantId, WorkflowId, WorkflowState, WorkflowStatus};

/// In-memory handle of one running workflow
///
/// `state` is the last committed snapshot; the engine holds its lock only
/// while committing a transition, never across an activity or a wait.
/// `status` mirrors the committed status for lock-free reads.
#[derive(Debug)]
pub struct WorkflowInstance {
    id: WorkflowId,
    document_id: DocumentId,
    tenant_id: TenantId,
    state: Mutex<WorkflowState>,
    status: watch::Sender<WorkflowStatus>,
    inbox: SignalInbox,
}

impl WorkflowInstance {
    /// Wrap a snapshot, re-queuing a review that was recorded but not yet
    /// consumed before the snapshot was written
    pub fn new(state: WorkflowState) -> Self {
        let inbox = SignalInbox::new(state.id().clone());
        if let Some(decision) = state.pending_review() {
            if let Err(e) = inbox.deliver(decision.clone()) {
                warn!(workflow_id = %state.id(), error = %e, "Could not re-queue pending review");
            }
        }

        let (status, _) = watch::channel(state.status());

        Self {
            id: state.id().clone(),
            document_id: state.document_id().clone(),
            tenant_id: state.tenant_id().clone(),
            state: Mutex::new(state),
            status,
            inbox,
        }
    }

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Last committed status; never waits on a running transition
    pub fn status(&self) -> WorkflowStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowStatus> {
        self.status.subscribe()
    }

    pub async fn snapshot(&self) -> WorkflowState {
        self.state.lock().await.clone()
    }

    pub(crate) fn inbox(&self) -> &SignalInbox {
        &self.inbox
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().await
    }

    pub(crate) fn publish_status(&self, status: WorkflowStatus) {
        self.status.send_replace(status);
    }
}
