//! Background audit writer
//!
//! Transitions hand their audit events to a bounded queue drained by one task
//! that owns the sink. A slow or failing sink only delays the queue, never the
//! workflow that produced the event.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::audit::{AuditEvent, AuditSink};

/// Events buffered before new ones are dropped
pub const AUDIT_QUEUE_CAPACITY: usize = 1024;

enum Command {
    Record(AuditEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task; dropping every handle stops the task once the
/// queue is drained
#[derive(Debug, Clone)]
pub struct AuditWriter {
    tx: mpsc::Sender<Command>,
}

impl AuditWriter {
    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>, record_timeout: Duration, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(drain(sink, record_timeout, rx));
        Self { tx }
    }

    /// Queue an event without waiting for the sink
    pub fn submit(&self, event: AuditEvent) {
        let workflow_id = event.workflow_id.clone();
        let action = event.action;

        match self.tx.try_send(Command::Record(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    workflow_id = %workflow_id,
                    action = %action,
                    "Audit queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(
                    workflow_id = %workflow_id,
                    action = %action,
                    "Audit writer stopped, event dropped"
                );
            }
        }
    }

    /// Wait until every event queued before this call has been handled
    pub async fn flush(&self) {
        let (done, handled) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).await.is_err() {
            debug!("Audit writer already stopped");
            return;
        }
        if handled.await.is_err() {
            debug!("Audit writer stopped before flush");
        }
    }
}

async fn drain(sink: Arc<dyn AuditSink>, record_timeout: Duration, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(event) => record(sink.as_ref(), record_timeout, event).await,
            Command::Flush(done) => {
                // The flushing side may have given up waiting
                done.send(()).ok();
            }
        }
    }
    debug!("Audit writer stopped");
}

async fn record(sink: &dyn AuditSink, record_timeout: Duration, event: AuditEvent) {
    let workflow_id = event.workflow_id.clone();
    let action = event.action;

    match timeout(record_timeout, sink.record(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(
                workflow_id = %workflow_id,
                action = %action,
                error = %e,
                "Failed to record audit event"
            );
        }
        Err(_) => {
            warn!(
                workflow_id = %workflow_id,
                action = %action,
                timeout_ms = record_timeout.as_millis() as u64,
                "Audit sink timed out"
            );
        }
    }
}
