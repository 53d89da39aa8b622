//! Application state shared by the HTTP handlers

use std::sync::Arc;

use crate::domain::storage::Storage;
use crate::domain::workflow::WorkflowState;
use crate::infrastructure::workflow::WorkflowDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<WorkflowDispatcher>,
    pub workflow_storage: Arc<dyn Storage<WorkflowState>>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<WorkflowDispatcher>,
        workflow_storage: Arc<dyn Storage<WorkflowState>>,
    ) -> Self {
        Self {
            dispatcher,
            workflow_storage,
        }
    }
}
