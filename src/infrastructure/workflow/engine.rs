//! Workflow engine
//!
//! Drives one instance through the fixed step sequence, committing and
//! persisting the snapshot after every transition. An instance re-entering
//! the engine after a restart resumes from its committed status, so every
//! step must tolerate being run again.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info};

use super::executor::{ActivityExecutor, ActivityOutcome};
use super::instance::WorkflowInstance;
use super::shutdown::ShutdownSignal;
use crate::domain::audit::{AuditAction, AuditEvent, AuditSink};
use crate::infrastructure::audit::{AuditWriter, AUDIT_QUEUE_CAPACITY};
use crate::domain::workflow::{
    ExtractionActivity, ExtractionSource, RetryPolicy, ReviewApplier, ReviewDecision,
    WorkflowError, WorkflowState, WorkflowStateRepository, WorkflowStatus,
};
use crate::infrastructure::observability::record_transition;

/// Collaborators of the engine
pub struct WorkflowEngineDeps {
    pub repository: Arc<dyn WorkflowStateRepository>,
    pub primary: Arc<dyn ExtractionActivity>,
    pub fallback: Arc<dyn ExtractionActivity>,
    pub applier: Arc<dyn ReviewApplier>,
    pub audit: Arc<dyn AuditSink>,
}

#[derive(Debug, Clone)]
pub struct WorkflowEngineConfig {
    /// Policy for both extraction paths
    pub extraction_policy: RetryPolicy,
    /// Policy for the apply-decision activity
    pub review_policy: RetryPolicy,
    /// Upper bound for a single audit call on the background writer
    pub audit_timeout: Duration,
}

impl Default for WorkflowEngineConfig {
    fn default() -> Self {
        Self {
            extraction_policy: RetryPolicy::default(),
            review_policy: RetryPolicy::default(),
            audit_timeout: Duration::from_secs(2),
        }
    }
}

/// How a call to [`WorkflowEngine::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The instance reached a terminal status
    Finished(WorkflowStatus),
    /// Shutdown interrupted a suspension; the committed snapshot is resumable
    Suspended,
}

enum StepError {
    Cancelled,
    Engine(String),
}

pub struct WorkflowEngine {
    repository: Arc<dyn WorkflowStateRepository>,
    primary: Arc<dyn ExtractionActivity>,
    fallback: Arc<dyn ExtractionActivity>,
    applier: Arc<dyn ReviewApplier>,
    audit: AuditWriter,
    executor: ActivityExecutor,
    shutdown: ShutdownSignal,
    config: WorkflowEngineConfig,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .field("applier", &self.applier.name())
            .field("config", &self.config)
            .finish()
    }
}

impl WorkflowEngine {
    /// Build the engine and spawn its audit writer; must be called inside a
    /// Tokio runtime
    pub fn new(
        deps: WorkflowEngineDeps,
        config: WorkflowEngineConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            repository: deps.repository,
            primary: deps.primary,
            fallback: deps.fallback,
            applier: deps.applier,
            audit: AuditWriter::spawn(deps.audit, config.audit_timeout, AUDIT_QUEUE_CAPACITY),
            executor: ActivityExecutor::new(shutdown.clone()),
            shutdown,
            config,
        }
    }

    /// Run the instance until it is terminal or shutdown suspends it
    pub async fn run(&self, instance: &WorkflowInstance) -> RunExit {
        loop {
            let status = instance.status();

            let step = match status {
                WorkflowStatus::Started => self.begin(instance).await,
                WorkflowStatus::AnalyzingPrimary => self.analyze_primary(instance).await,
                WorkflowStatus::AnalyzingFallback => self.analyze_fallback(instance).await,
                WorkflowStatus::WaitingForReview => self.await_review(instance).await,
                WorkflowStatus::ProcessingReview => self.process_review(instance).await,
                WorkflowStatus::Completed | WorkflowStatus::Failed => {
                    return RunExit::Finished(status);
                }
            };

            match step {
                Ok(()) => {}
                Err(StepError::Cancelled) => {
                    info!(
                        workflow_id = %instance.id(),
                        status = %status,
                        "Workflow suspended by shutdown"
                    );
                    return RunExit::Suspended;
                }
                Err(StepError::Engine(message)) => self.fail_instance(instance, message).await,
            }
        }
    }

    /// Record a review decision for an instance waiting for review
    ///
    /// The decision is persisted before it is handed to the inbox, so a
    /// restart between the two re-delivers it.
    pub async fn accept_review(
        &self,
        instance: &WorkflowInstance,
        decision: ReviewDecision,
    ) -> Result<(), WorkflowError> {
        let mut state = instance.lock_state().await;

        let mut next = state.clone();
        next.record_review(decision.clone())?;
        let next = self
            .repository
            .save(next)
            .await
            .map_err(|e| WorkflowError::persistence(e.to_string()))?;
        *state = next;

        instance.inbox().deliver(decision)?;

        info!(
            workflow_id = %instance.id(),
            document_id = %instance.document_id(),
            "Review decision accepted"
        );
        Ok(())
    }

    async fn begin(&self, instance: &WorkflowInstance) -> Result<(), StepError> {
        self.commit(
            instance,
            AuditAction::ProcessDocument,
            "Document processing started".to_string(),
            |state, cause| state.transition(WorkflowStatus::AnalyzingPrimary, cause),
        )
        .await
    }

    async fn analyze_primary(&self, instance: &WorkflowInstance) -> Result<(), StepError> {
        match self.extract(instance, &self.primary).await {
            ActivityOutcome::Completed { value, attempts } => {
                self.commit(
                    instance,
                    AuditAction::AnalyzeDocumentPrimary,
                    format!("Primary analysis succeeded after {} attempt(s)", attempts),
                    move |state, cause| state.enter_review(ExtractionSource::Primary, value, cause),
                )
                .await
            }
            ActivityOutcome::Failed { error, attempts } => {
                info!(
                    workflow_id = %instance.id(),
                    error = %error,
                    "Primary analysis failed, trying fallback"
                );
                self.commit(
                    instance,
                    AuditAction::AnalyzeDocumentPrimary,
                    format!(
                        "Primary analysis failed after {} attempt(s): {}",
                        attempts,
                        error.message()
                    ),
                    |state, cause| state.transition(WorkflowStatus::AnalyzingFallback, cause),
                )
                .await
            }
            ActivityOutcome::Cancelled => Err(StepError::Cancelled),
        }
    }

    async fn analyze_fallback(&self, instance: &WorkflowInstance) -> Result<(), StepError> {
        match self.extract(instance, &self.fallback).await {
            ActivityOutcome::Completed { value, attempts } => {
                self.commit(
                    instance,
                    AuditAction::AnalyzeDocumentFallback,
                    format!("Fallback analysis succeeded after {} attempt(s)", attempts),
                    move |state, cause| {
                        state.enter_review(ExtractionSource::Fallback, value, cause)
                    },
                )
                .await
            }
            ActivityOutcome::Failed { error, attempts } => {
                // Analysis failure is not fatal; the document goes to manual review
                self.commit(
                    instance,
                    AuditAction::AnalyzeDocumentFallback,
                    format!(
                        "Fallback analysis failed after {} attempt(s): {}",
                        attempts,
                        error.message()
                    ),
                    |state, cause| state.enter_review(ExtractionSource::None, None, cause),
                )
                .await
            }
            ActivityOutcome::Cancelled => Err(StepError::Cancelled),
        }
    }

    async fn await_review(&self, instance: &WorkflowInstance) -> Result<(), StepError> {
        debug!(workflow_id = %instance.id(), "Waiting for review decision");

        let mut shutdown = self.shutdown.clone();
        let Some(decision) = instance.inbox().await_one(&mut shutdown).await else {
            return Err(StepError::Cancelled);
        };

        self.commit(
            instance,
            AuditAction::ReviewDocument,
            format!("Review received: {}", decision.outcome()),
            move |state, _| state.begin_processing_review(decision),
        )
        .await
    }

    async fn process_review(&self, instance: &WorkflowInstance) -> Result<(), StepError> {
        let decision = instance
            .lock_state()
            .await
            .accepted_review()
            .cloned()
            .ok_or_else(|| StepError::Engine("No accepted review decision to apply".to_string()))?;

        let applier = Arc::clone(&self.applier);
        let name = applier.name().to_string();
        let document_id = instance.document_id().clone();
        let outcome = decision.outcome();

        let result = self
            .executor
            .run(&name, &self.config.review_policy, move |attempt| {
                let applier = Arc::clone(&applier);
                let document_id = document_id.clone();
                let decision = decision.clone();
                async move {
                    debug!(document_id = %document_id, attempt = attempt, "Applying review decision");
                    applier.apply_decision(&document_id, &decision).await
                }
            })
            .await;

        match result {
            ActivityOutcome::Completed { .. } => {
                self.commit(
                    instance,
                    AuditAction::ProcessDocument,
                    format!("Document review completed: {}", outcome),
                    |state, cause| state.complete(cause),
                )
                .await
            }
            ActivityOutcome::Failed { error, attempts } => {
                let message = format!(
                    "{} failed after {} attempt(s): {}",
                    name,
                    attempts,
                    error.message()
                );
                self.commit(
                    instance,
                    AuditAction::ProcessDocument,
                    format!("Document processing failed: {}", message),
                    move |state, _| state.fail(message),
                )
                .await
            }
            ActivityOutcome::Cancelled => Err(StepError::Cancelled),
        }
    }

    async fn extract(
        &self,
        instance: &WorkflowInstance,
        activity: &Arc<dyn ExtractionActivity>,
    ) -> ActivityOutcome<Option<Value>> {
        let activity = Arc::clone(activity);
        let name = activity.name().to_string();
        let document_id = instance.document_id().clone();

        self.executor
            .run(&name, &self.config.extraction_policy, move |attempt| {
                let activity = Arc::clone(&activity);
                let document_id = document_id.clone();
                async move {
                    debug!(
                        activity = activity.name(),
                        document_id = %document_id,
                        attempt = attempt,
                        "Analyzing document"
                    );
                    activity.analyze(&document_id).await?.into_step_result()
                }
            })
            .await
    }

    /// Apply `mutate` to a copy of the committed snapshot, persist it, then
    /// publish it; nothing changes in memory when persisting fails
    async fn commit<F>(
        &self,
        instance: &WorkflowInstance,
        action: AuditAction,
        detail: String,
        mutate: F,
    ) -> Result<(), StepError>
    where
        F: FnOnce(&mut WorkflowState, &str) -> Result<(), WorkflowError>,
    {
        let (from, to) = {
            let mut state = instance.lock_state().await;

            let mut next = state.clone();
            let from = next.status();
            mutate(&mut next, &detail).map_err(|e| StepError::Engine(e.to_string()))?;
            let to = next.status();

            let next = self.repository.save(next).await.map_err(|e| {
                StepError::Engine(format!(
                    "Failed to persist transition {} -> {}: {}",
                    from, to, e
                ))
            })?;

            *state = next;
            instance.publish_status(to);
            (from, to)
        };

        record_transition(from, to);
        info!(
            workflow_id = %instance.id(),
            document_id = %instance.document_id(),
            tenant_id = %instance.tenant_id(),
            from = %from,
            to = %to,
            "{}",
            detail
        );

        self.record_audit(instance, action, detail);
        Ok(())
    }

    async fn fail_instance(&self, instance: &WorkflowInstance, message: String) {
        error!(
            workflow_id = %instance.id(),
            error = %message,
            "Unrecoverable workflow error"
        );

        let terminal_error = message.clone();
        let committed = self
            .commit(
                instance,
                AuditAction::ProcessDocument,
                format!("Document processing failed: {}", message),
                move |state, _| state.fail(terminal_error),
            )
            .await;

        if let Err(StepError::Engine(persist_error)) = committed {
            // The stored snapshot keeps its last committed status and
            // resumes on the next recovery
            let mut state = instance.lock_state().await;
            if state.is_active() {
                let from = state.status();
                if state.fail(message).is_ok() {
                    instance.publish_status(WorkflowStatus::Failed);
                    record_transition(from, WorkflowStatus::Failed);
                }
            }

            error!(
                workflow_id = %instance.id(),
                error = %persist_error,
                "Could not persist FAILED status"
            );
        }
    }

    fn record_audit(&self, instance: &WorkflowInstance, action: AuditAction, detail: String) {
        self.audit
            .submit(AuditEvent::new(instance.id(), instance.tenant_id(), action, detail));
    }

    /// Wait for audit events queued so far to reach the sink
    pub async fn flush_audit(&self) {
        self.audit.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::repository::MockWorkflowStateRepository;
    use crate::domain::workflow::{ActivityError, AnalysisResult, DocumentId, TenantId};
    use crate::domain::DomainError;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::workflow::shutdown::{shutdown_channel, ShutdownTrigger};
    use crate::infrastructure::workflow::storage_repository::StorageWorkflowStateRepository;
    use crate::infrastructure::workflow::testing::{
        fast_policy, FlakyStorage, HangingAudit, RecordingApplier, RecordingAudit,
        ScriptedExtraction,
    };
    use serde_json::json;
    use tokio::task::JoinHandle;

    struct Harness {
        engine: Arc<WorkflowEngine>,
        repository: Arc<dyn WorkflowStateRepository>,
        trigger: ShutdownTrigger,
    }

    fn config() -> WorkflowEngineConfig {
        WorkflowEngineConfig {
            extraction_policy: fast_policy(3),
            review_policy: fast_policy(3),
            audit_timeout: Duration::from_millis(500),
        }
    }

    fn harness_with(
        repository: Arc<dyn WorkflowStateRepository>,
        primary: Arc<dyn ExtractionActivity>,
        fallback: Arc<dyn ExtractionActivity>,
        applier: Arc<dyn ReviewApplier>,
        audit: Arc<dyn AuditSink>,
    ) -> Harness {
        let (trigger, shutdown) = shutdown_channel();
        let engine = WorkflowEngine::new(
            WorkflowEngineDeps {
                repository: Arc::clone(&repository),
                primary,
                fallback,
                applier,
                audit,
            },
            config(),
            shutdown,
        );

        Harness {
            engine: Arc::new(engine),
            repository,
            trigger,
        }
    }

    fn harness(
        primary: Arc<dyn ExtractionActivity>,
        fallback: Arc<dyn ExtractionActivity>,
        applier: Arc<dyn ReviewApplier>,
    ) -> Harness {
        harness_with(
            Arc::new(StorageWorkflowStateRepository::new(Arc::new(
                InMemoryStorage::new(),
            ))),
            primary,
            fallback,
            applier,
            RecordingAudit::new(),
        )
    }

    fn new_state(document: &str) -> WorkflowState {
        WorkflowState::new(
            DocumentId::new(document).unwrap(),
            TenantId::new("org-1").unwrap(),
        )
    }

    async fn start(harness: &Harness, state: WorkflowState) -> Arc<WorkflowInstance> {
        let state = harness.repository.insert(state).await.unwrap();
        Arc::new(WorkflowInstance::new(state))
    }

    fn spawn_run(harness: &Harness, instance: &Arc<WorkflowInstance>) -> JoinHandle<RunExit> {
        let engine = Arc::clone(&harness.engine);
        let instance = Arc::clone(instance);
        tokio::spawn(async move { engine.run(&instance).await })
    }

    async fn wait_for(instance: &WorkflowInstance, status: WorkflowStatus) {
        let mut rx = instance.subscribe();
        tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| *s == status))
            .await
            .expect("status not reached in time")
            .unwrap();
    }

    fn statuses(state: &WorkflowState) -> Vec<WorkflowStatus> {
        let mut sequence = vec![WorkflowStatus::Started];
        sequence.extend(state.history().iter().map(|record| record.to));
        sequence
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_success_waits_for_review() {
        let harness = harness(
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
        );
        let instance = start(&harness, new_state("1")).await;
        let _run = spawn_run(&harness, &instance);

        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        let persisted = harness.repository.find(instance.id()).await.unwrap().unwrap();
        assert_eq!(
            statuses(&persisted),
            vec![
                WorkflowStatus::Started,
                WorkflowStatus::AnalyzingPrimary,
                WorkflowStatus::WaitingForReview
            ]
        );
        assert_eq!(persisted.extraction_source(), Some(ExtractionSource::Primary));
        assert_eq!(persisted.extracted_data(), Some(&json!({"source": "primary"})));
        assert_eq!(persisted, instance.snapshot().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_business_skip_goes_to_fallback_without_retry() {
        let primary = ScriptedExtraction::skipping("primary", "No file attached");
        let fallback = ScriptedExtraction::succeeding("fallback");
        let harness = harness(primary.clone(), fallback.clone(), RecordingApplier::succeeding());
        let instance = start(&harness, new_state("2")).await;
        let _run = spawn_run(&harness, &instance);

        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        let state = instance.snapshot().await;
        assert_eq!(
            statuses(&state),
            vec![
                WorkflowStatus::Started,
                WorkflowStatus::AnalyzingPrimary,
                WorkflowStatus::AnalyzingFallback,
                WorkflowStatus::WaitingForReview
            ]
        );
        assert_eq!(state.extraction_source(), Some(ExtractionSource::Fallback));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        assert!(state.history()[1].cause.contains("No file attached"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_paths_failing_still_reach_review() {
        let primary = ScriptedExtraction::failing("primary");
        let fallback = ScriptedExtraction::failing("fallback");
        let harness = harness(primary.clone(), fallback.clone(), RecordingApplier::succeeding());
        let instance = start(&harness, new_state("3")).await;
        let run = spawn_run(&harness, &instance);

        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        let state = instance.snapshot().await;
        assert_eq!(state.extraction_source(), Some(ExtractionSource::None));
        assert!(state.extracted_data().is_none());
        assert!(state.terminal_error().is_none());
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 3);
        assert!(!run.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_review_completes() {
        let applier = RecordingApplier::succeeding();
        let harness = harness(
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            applier.clone(),
        );
        let instance = start(&harness, new_state("4")).await;
        let run = spawn_run(&harness, &instance);
        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        let decision = ReviewDecision::confirm().with_field("tags", "a,b");
        harness
            .engine
            .accept_review(&instance, decision.clone())
            .await
            .unwrap();

        assert_eq!(
            run.await.unwrap(),
            RunExit::Finished(WorkflowStatus::Completed)
        );

        let calls = applier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_str(), "4");
        assert_eq!(calls[0].1, decision);

        let persisted = harness.repository.find(instance.id()).await.unwrap().unwrap();
        assert_eq!(persisted.status(), WorkflowStatus::Completed);
        assert!(persisted.pending_review().is_none());
        assert_eq!(persisted.accepted_review(), Some(&decision));
        assert_eq!(
            &statuses(&persisted)[3..],
            &[WorkflowStatus::ProcessingReview, WorkflowStatus::Completed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_exhausting_retries_fails_workflow() {
        let applier = RecordingApplier::failing(ActivityError::transient("502 Bad Gateway"));
        let harness = harness(
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            applier.clone(),
        );
        let instance = start(&harness, new_state("5")).await;
        let run = spawn_run(&harness, &instance);
        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        harness
            .engine
            .accept_review(&instance, ReviewDecision::manual_entry())
            .await
            .unwrap();

        assert_eq!(run.await.unwrap(), RunExit::Finished(WorkflowStatus::Failed));
        assert_eq!(applier.calls().len(), 3);

        let persisted = harness.repository.find(instance.id()).await.unwrap().unwrap();
        let result = persisted.result();
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(
            result.error.as_deref(),
            Some("apply-review failed after 3 attempt(s): 502 Bad Gateway")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_review_protocol_errors() {
        let harness = harness(
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
        );
        let instance = start(&harness, new_state("6")).await;

        let not_waiting = harness
            .engine
            .accept_review(&instance, ReviewDecision::confirm())
            .await;
        assert_eq!(
            not_waiting,
            Err(WorkflowError::not_waiting("document-6", WorkflowStatus::Started))
        );

        let _run = spawn_run(&harness, &instance);
        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        let first = harness
            .engine
            .accept_review(&instance, ReviewDecision::confirm())
            .await;
        assert!(first.is_ok());

        let second = harness
            .engine
            .accept_review(&instance, ReviewDecision::reanalyze())
            .await;
        assert!(matches!(
            second,
            Err(WorkflowError::DuplicateSignal(_)) | Err(WorkflowError::NotWaiting { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_from_fallback_snapshot_matches_uninterrupted_run() {
        // Uninterrupted run: primary fails, fallback succeeds
        let uninterrupted = harness(
            ScriptedExtraction::failing("primary"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
        );
        let instance = start(&uninterrupted, new_state("7")).await;
        let run = spawn_run(&uninterrupted, &instance);
        wait_for(&instance, WorkflowStatus::WaitingForReview).await;
        uninterrupted
            .engine
            .accept_review(&instance, ReviewDecision::confirm())
            .await
            .unwrap();
        let expected_exit = run.await.unwrap();
        let expected = instance.snapshot().await;

        // Replay: a snapshot persisted at ANALYZING_FALLBACK before a crash
        let primary = ScriptedExtraction::succeeding("primary");
        let replayed = harness(
            primary.clone(),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
        );
        let mut snapshot = new_state("7");
        snapshot
            .transition(WorkflowStatus::AnalyzingPrimary, "begin")
            .unwrap();
        snapshot
            .transition(WorkflowStatus::AnalyzingFallback, "primary failed")
            .unwrap();
        let instance = start(&replayed, snapshot).await;
        let run = spawn_run(&replayed, &instance);
        wait_for(&instance, WorkflowStatus::WaitingForReview).await;
        replayed
            .engine
            .accept_review(&instance, ReviewDecision::confirm())
            .await
            .unwrap();

        assert_eq!(run.await.unwrap(), expected_exit);
        let actual = instance.snapshot().await;
        assert_eq!(actual.status(), expected.status());
        assert_eq!(actual.extraction_source(), expected.extraction_source());
        assert_eq!(statuses(&actual), statuses(&expected));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_from_processing_review_applies_accepted_decision() {
        let applier = RecordingApplier::succeeding();
        let harness = harness(
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            applier.clone(),
        );

        let decision = ReviewDecision::reanalyze();
        let mut snapshot = new_state("8");
        snapshot
            .transition(WorkflowStatus::AnalyzingPrimary, "begin")
            .unwrap();
        snapshot
            .enter_review(ExtractionSource::Primary, None, "primary ok")
            .unwrap();
        snapshot.record_review(decision.clone()).unwrap();
        snapshot.begin_processing_review(decision.clone()).unwrap();

        let instance = start(&harness, snapshot).await;
        let exit = harness.engine.run(&instance).await;

        assert_eq!(exit, RunExit::Finished(WorkflowStatus::Completed));
        assert_eq!(applier.calls()[0].1, decision);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_fails_workflow() {
        let mut repository = MockWorkflowStateRepository::new();
        repository.expect_insert().returning(Ok);
        repository.expect_save().returning(|state| {
            if state.status() == WorkflowStatus::AnalyzingPrimary {
                Err(DomainError::storage("disk full"))
            } else {
                Ok(state)
            }
        });

        let harness = harness_with(
            Arc::new(repository),
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
            RecordingAudit::new(),
        );
        let instance = start(&harness, new_state("9")).await;

        let exit = harness.engine.run(&instance).await;

        assert_eq!(exit, RunExit::Finished(WorkflowStatus::Failed));
        let state = instance.snapshot().await;
        assert_eq!(
            statuses(&state),
            vec![WorkflowStatus::Started, WorkflowStatus::Failed]
        );
        assert!(state
            .terminal_error()
            .unwrap()
            .contains("Failed to persist transition STARTED -> ANALYZING_PRIMARY"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpersistable_failure_keeps_stored_snapshot_resumable() {
        let storage = Arc::new(FlakyStorage::default());
        let repository: Arc<dyn WorkflowStateRepository> =
            Arc::new(StorageWorkflowStateRepository::new(storage.clone()));
        let harness = harness_with(
            repository,
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
            RecordingAudit::new(),
        );
        let instance = start(&harness, new_state("10")).await;
        storage.set_failing(true);

        let exit = harness.engine.run(&instance).await;

        assert_eq!(exit, RunExit::Finished(WorkflowStatus::Failed));
        assert_eq!(instance.status(), WorkflowStatus::Failed);
        let stored = harness.repository.find(instance.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), WorkflowStatus::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_audit_failures_never_block_transitions() {
        let audit = RecordingAudit::failing();
        let harness = harness_with(
            Arc::new(StorageWorkflowStateRepository::new(Arc::new(
                InMemoryStorage::new(),
            ))),
            ScriptedExtraction::skipping("primary", "Not a PDF file"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
            audit.clone(),
        );
        let instance = start(&harness, new_state("11")).await;
        let _run = spawn_run(&harness, &instance);

        wait_for(&instance, WorkflowStatus::WaitingForReview).await;
        harness.engine.flush_audit().await;

        assert_eq!(
            audit.actions(),
            vec![
                AuditAction::ProcessDocument,
                AuditAction::AnalyzeDocumentPrimary,
                AuditAction::AnalyzeDocumentFallback
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_audit_adds_no_latency() {
        let harness = harness_with(
            Arc::new(StorageWorkflowStateRepository::new(Arc::new(
                InMemoryStorage::new(),
            ))),
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
            Arc::new(HangingAudit),
        );
        let started = tokio::time::Instant::now();
        let instance = start(&harness, new_state("12")).await;
        let run = spawn_run(&harness, &instance);

        wait_for(&instance, WorkflowStatus::WaitingForReview).await;
        assert!(started.elapsed() < config().audit_timeout);

        harness
            .engine
            .accept_review(&instance, ReviewDecision::confirm())
            .await
            .unwrap();

        assert_eq!(
            run.await.unwrap(),
            RunExit::Finished(WorkflowStatus::Completed)
        );
        assert!(started.elapsed() < config().audit_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_suspends_waiting_instance() {
        let harness = harness(
            ScriptedExtraction::succeeding("primary"),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
        );
        let instance = start(&harness, new_state("13")).await;
        let run = spawn_run(&harness, &instance);
        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        harness.trigger.trigger();

        assert_eq!(run.await.unwrap(), RunExit::Suspended);
        let stored = harness.repository.find(instance.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), WorkflowStatus::WaitingForReview);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff_leaves_step_resumable() {
        let harness = harness(
            ScriptedExtraction::new("primary", Err(ActivityError::transient("timeout")))
                .then(Err(ActivityError::transient("timeout"))),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
        );
        let instance = start(&harness, new_state("14")).await;
        let run = spawn_run(&harness, &instance);
        wait_for(&instance, WorkflowStatus::AnalyzingPrimary).await;

        harness.trigger.trigger();

        assert_eq!(run.await.unwrap(), RunExit::Suspended);
        let stored = harness.repository.find(instance.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), WorkflowStatus::AnalyzingPrimary);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsuccessful_result_without_error_text() {
        let harness = harness(
            ScriptedExtraction::new(
                "primary",
                Ok(AnalysisResult {
                    success: false,
                    extracted_data: None,
                    error: None,
                }),
            ),
            ScriptedExtraction::succeeding("fallback"),
            RecordingApplier::succeeding(),
        );
        let instance = start(&harness, new_state("15")).await;
        let _run = spawn_run(&harness, &instance);

        wait_for(&instance, WorkflowStatus::WaitingForReview).await;

        let state = instance.snapshot().await;
        assert_eq!(state.extraction_source(), Some(ExtractionSource::Fallback));
    }
}
