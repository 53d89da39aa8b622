//! Activity ports consumed by the workflow engine
//!
//! Activities are the remote, potentially failing operations a workflow step
//! invokes: the primary and fallback extraction calls and the final
//! apply-decision call. Implementations must be idempotent or safe to repeat
//! for the same document, since a step is re-entered after a restart.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::DocumentId;
use super::review::ReviewDecision;

/// Failure of a single activity attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityError {
    /// Flaky failure; the attempt is retried per the retry policy
    Transient(String),
    /// Business skip or permanent failure; the step fails without retrying
    NonRetryable(String),
}

impl ActivityError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::NonRetryable(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient(message) | Self::NonRetryable(message) => message,
        }
    }
}

impl fmt::Display for ActivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(message) => write!(f, "transient failure: {}", message),
            Self::NonRetryable(message) => write!(f, "non-retryable failure: {}", message),
        }
    }
}

impl std::error::Error for ActivityError {}

/// Result reported by an extraction activity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn extracted(data: Value) -> Self {
        Self {
            success: true,
            extracted_data: Some(data),
            error: None,
        }
    }

    /// Business skip, e.g. no file attached or unsupported content type
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            extracted_data: None,
            error: Some(reason.into()),
        }
    }

    /// Map `success = false` to a non-retryable failure
    pub fn into_step_result(self) -> Result<Option<Value>, ActivityError> {
        if self.success {
            Ok(self.extracted_data)
        } else {
            Err(ActivityError::non_retryable(
                self.error
                    .unwrap_or_else(|| "analysis reported no success".to_string()),
            ))
        }
    }
}

/// Remote document extraction (primary or fallback path)
#[async_trait]
pub trait ExtractionActivity: Send + Sync + fmt::Debug {
    /// Name used in logs, metrics and audit entries
    fn name(&self) -> &str;

    async fn analyze(&self, document_id: &DocumentId) -> Result<AnalysisResult, ActivityError>;
}

/// Applies the reviewer's decision to the business record
#[async_trait]
pub trait ReviewApplier: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn apply_decision(
        &self,
        document_id: &DocumentId,
        decision: &ReviewDecision,
    ) -> Result<(), ActivityError>;
}
