//! HTTP-backed extraction and review activities

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::workflow::{
    ActivityError, AnalysisResult, DocumentId, ExtractionActivity, ReviewApplier, ReviewDecision,
};
use crate::domain::DomainError;

const MAX_ERROR_BODY: usize = 500;

fn build_client(timeout: Duration) -> Result<Client, DomainError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DomainError::configuration(format!("Failed to create HTTP client: {}", e)))
}

fn transport_error(e: reqwest::Error) -> ActivityError {
    if e.is_timeout() {
        ActivityError::transient("Request timed out")
    } else if e.is_connect() {
        ActivityError::transient("Connection failed")
    } else {
        ActivityError::transient(format!("Request failed: {}", e))
    }
}

/// 5xx and 429 are worth retrying, any other non-2xx status is final
fn status_error(status: StatusCode, body: &str) -> ActivityError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = if body.is_empty() {
        format!("HTTP status {}", status.as_u16())
    } else {
        format!("HTTP status {}: {}", status.as_u16(), body)
    };

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ActivityError::transient(message)
    } else {
        ActivityError::non_retryable(message)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    document_id: &'a DocumentId,
}

/// Extraction service reached with a JSON POST
///
/// A 422 reply means the service understood the document but could not
/// extract from it, and is reported as a skipped analysis.
#[derive(Debug, Clone)]
pub struct HttpExtractionActivity {
    name: String,
    url: String,
    client: Client,
}

impl HttpExtractionActivity {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            name: name.into(),
            url: url.into(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ExtractionActivity for HttpExtractionActivity {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, document_id: &DocumentId) -> Result<AnalysisResult, ActivityError> {
        debug!(activity = %self.name, document_id = %document_id, url = %self.url, "Requesting analysis");

        let response = self
            .client
            .post(&self.url)
            .json(&AnalyzeRequest { document_id })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<AnalysisResult>().await.map_err(|e| {
                ActivityError::non_retryable(format!("Malformed analysis response: {}", e))
            });
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            warn!(activity = %self.name, document_id = %document_id, "Document could not be analyzed");
            let reason = if body.is_empty() {
                "document could not be analyzed".to_string()
            } else {
                body.chars().take(MAX_ERROR_BODY).collect()
            };
            return Ok(AnalysisResult::skipped(reason));
        }

        Err(status_error(status, &body))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest<'a> {
    document_id: &'a DocumentId,
    outcome: String,
    decision: &'a ReviewDecision,
}

/// Review decisions forwarded to the document service
#[derive(Debug, Clone)]
pub struct HttpReviewApplier {
    url: String,
    client: Client,
}

impl HttpReviewApplier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        Ok(Self {
            url: url.into(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ReviewApplier for HttpReviewApplier {
    fn name(&self) -> &str {
        "apply-review"
    }

    async fn apply_decision(
        &self,
        document_id: &DocumentId,
        decision: &ReviewDecision,
    ) -> Result<(), ActivityError> {
        let request = ApplyRequest {
            document_id,
            outcome: decision.outcome().to_string(),
            decision,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}
