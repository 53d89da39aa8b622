//! Single-slot signal inbox for review decisions

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::shutdown::ShutdownSignal;
use crate::domain::workflow::{ReviewDecision, WorkflowError, WorkflowId};

/// Holds at most one undelivered review decision for a workflow instance
///
/// A decision delivered before anyone waits stays in the slot, so
/// deliver-then-await and await-then-deliver behave the same.
#[derive(Debug)]
pub struct SignalInbox {
    workflow_id: WorkflowId,
    slot: Mutex<Option<ReviewDecision>>,
    notify: Notify,
}

impl SignalInbox {
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ReviewDecision>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a decision; rejected while another one is still pending
    pub fn deliver(&self, decision: ReviewDecision) -> Result<(), WorkflowError> {
        {
            let mut slot = self.slot();
            if slot.is_some() {
                return Err(WorkflowError::duplicate_signal(self.workflow_id.as_str()));
            }
            *slot = Some(decision);
        }

        self.notify.notify_one();
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    /// Wait for a decision and take it out of the slot
    ///
    /// Returns `None` when shutdown interrupts the wait; the slot is left
    /// untouched in that case.
    pub async fn await_one(&self, shutdown: &mut ShutdownSignal) -> Option<ReviewDecision> {
        loop {
            let notified = self.notify.notified();

            if let Some(decision) = self.slot().take() {
                return Some(decision);
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                _ = notified => {}
            }
        }
    }
}
