//! Workflow status and extraction source

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a document-processing workflow
///
/// Transitions only move forward along the fixed
/// analyze → fallback → review → apply graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    #[default]
    Started,
    AnalyzingPrimary,
    AnalyzingFallback,
    WaitingForReview,
    ProcessingReview,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Returns all statuses in graph order
    pub fn all() -> [Self; 7] {
        [
            Self::Started,
            Self::AnalyzingPrimary,
            Self::AnalyzingFallback,
            Self::WaitingForReview,
            Self::ProcessingReview,
            Self::Completed,
            Self::Failed,
        ]
    }

    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Non-terminal instances count as active
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if this status can transition to another status
    pub fn can_transition_to(&self, target: WorkflowStatus) -> bool {
        match (self, target) {
            (Self::Started, Self::AnalyzingPrimary) => true,

            (Self::AnalyzingPrimary, Self::WaitingForReview) => true,
            (Self::AnalyzingPrimary, Self::AnalyzingFallback) => true,

            (Self::AnalyzingFallback, Self::WaitingForReview) => true,

            (Self::WaitingForReview, Self::ProcessingReview) => true,

            (Self::ProcessingReview, Self::Completed) => true,

            // Unrecoverable errors may fail any active instance
            (from, Self::Failed) => from.is_active(),

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::AnalyzingPrimary => "ANALYZING_PRIMARY",
            Self::AnalyzingFallback => "ANALYZING_FALLBACK",
            Self::WaitingForReview => "WAITING_FOR_REVIEW",
            Self::ProcessingReview => "PROCESSING_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which analysis path produced the accepted data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionSource {
    Primary,
    Fallback,
    None,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Fallback => "FALLBACK",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
