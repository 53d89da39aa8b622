//! Scripted activity fakes shared by engine and dispatcher tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::audit::{AuditAction, AuditEvent, AuditSink};
use crate::domain::storage::Storage;
use crate::domain::workflow::{
    ActivityError, AnalysisResult, DocumentId, ExtractionActivity, RetryPolicy, ReviewApplier,
    ReviewDecision, WorkflowId, WorkflowState,
};
use crate::domain::DomainError;
use crate::infrastructure::storage::InMemoryStorage;

/// Extraction activity replaying scripted responses, then a fixed default
#[derive(Debug)]
pub struct ScriptedExtraction {
    name: String,
    script: Mutex<VecDeque<Result<AnalysisResult, ActivityError>>>,
    fallback: Result<AnalysisResult, ActivityError>,
    calls: AtomicU32,
}

impl ScriptedExtraction {
    pub fn new(name: &str, fallback: Result<AnalysisResult, ActivityError>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicU32::new(0),
        })
    }

    pub fn succeeding(name: &str) -> Arc<Self> {
        Self::new(name, Ok(AnalysisResult::extracted(json!({"source": name}))))
    }

    pub fn skipping(name: &str, reason: &str) -> Arc<Self> {
        Self::new(name, Ok(AnalysisResult::skipped(reason)))
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::new(name, Err(ActivityError::transient("service unavailable")))
    }

    pub fn then(self: Arc<Self>, response: Result<AnalysisResult, ActivityError>) -> Arc<Self> {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionActivity for ScriptedExtraction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, _document_id: &DocumentId) -> Result<AnalysisResult, ActivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Review applier recording every call
#[derive(Debug, Default)]
pub struct RecordingApplier {
    calls: Mutex<Vec<(DocumentId, ReviewDecision)>>,
    error: Option<ActivityError>,
}

impl RecordingApplier {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(error: ActivityError) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            error: Some(error),
        })
    }

    pub fn calls(&self) -> Vec<(DocumentId, ReviewDecision)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewApplier for RecordingApplier {
    fn name(&self) -> &str {
        "apply-review"
    }

    async fn apply_decision(
        &self,
        document_id: &DocumentId,
        decision: &ReviewDecision,
    ) -> Result<(), ActivityError> {
        self.calls
            .lock()
            .unwrap()
            .push((document_id.clone(), decision.clone()));

        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Storage whose writes and listings start failing on demand
#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: InMemoryStorage<WorkflowState>,
    failing: AtomicBool,
}

impl FlakyStorage {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(DomainError::storage("connection reset"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage<WorkflowState> for FlakyStorage {
    async fn get(&self, key: &WorkflowId) -> Result<Option<WorkflowState>, DomainError> {
        self.inner.get(key).await
    }

    async fn list(&self) -> Result<Vec<WorkflowState>, DomainError> {
        self.check()?;
        self.inner.list().await
    }

    async fn create(&self, entity: WorkflowState) -> Result<WorkflowState, DomainError> {
        self.check()?;
        self.inner.create(entity).await
    }

    async fn update(&self, entity: WorkflowState) -> Result<WorkflowState, DomainError> {
        self.check()?;
        self.inner.update(entity).await
    }

    async fn write_guarded(
        &self,
        entity: WorkflowState,
        guard: &(dyn for<'a> Fn(Option<&'a WorkflowState>) -> Result<(), DomainError> + Send + Sync),
    ) -> Result<WorkflowState, DomainError> {
        self.check()?;
        self.inner.write_guarded(entity, guard).await
    }

    async fn delete(&self, key: &WorkflowId) -> Result<bool, DomainError> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.inner.clear().await
    }
}

/// Fast policy so paused-clock tests stay short
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .with_initial_interval(10)
        .with_max_interval(40)
        .with_attempt_timeout(1_000)
}

/// Audit sink keeping events in memory, optionally failing every call
#[derive(Debug, Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
    failing: bool,
}

impl RecordingAudit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        })
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.action)
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, event: AuditEvent) -> Result<(), DomainError> {
        self.events.lock().unwrap().push(event);
        if self.failing {
            Err(DomainError::internal("audit store unavailable"))
        } else {
            Ok(())
        }
    }
}

/// Audit sink that never answers
#[derive(Debug, Default)]
pub struct HangingAudit;

#[async_trait]
impl AuditSink for HangingAudit {
    async fn record(&self, _event: AuditEvent) -> Result<(), DomainError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
