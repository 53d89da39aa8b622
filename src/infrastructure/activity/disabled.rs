//! Stand-ins used when no service endpoint is configured

use async_trait::async_trait;
use tracing::info;

use crate::domain::workflow::{
    ActivityError, AnalysisResult, DocumentId, ExtractionActivity, ReviewApplier, ReviewDecision,
};

/// Extraction that always reports a skipped analysis
#[derive(Debug, Clone)]
pub struct DisabledExtraction {
    name: String,
}

impl DisabledExtraction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ExtractionActivity for DisabledExtraction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, _document_id: &DocumentId) -> Result<AnalysisResult, ActivityError> {
        Ok(AnalysisResult::skipped(format!(
            "{} is not configured",
            self.name
        )))
    }
}

/// Applier that only logs the decision
#[derive(Debug, Clone, Default)]
pub struct LoggingReviewApplier;

#[async_trait]
impl ReviewApplier for LoggingReviewApplier {
    fn name(&self) -> &str {
        "apply-review"
    }

    async fn apply_decision(
        &self,
        document_id: &DocumentId,
        decision: &ReviewDecision,
    ) -> Result<(), ActivityError> {
        info!(
            document_id = %document_id,
            outcome = %decision.outcome(),
            fields = decision.form_data.len(),
            "Review decision applied without a document service"
        );
        Ok(())
    }
}
