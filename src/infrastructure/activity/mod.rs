//! Extraction and review-apply activities

mod disabled;
mod http;

use std::sync::Arc;

use tracing::warn;

pub use disabled::{DisabledExtraction, LoggingReviewApplier};
pub use http::{HttpExtractionActivity, HttpReviewApplier};

use crate::config::ActivitiesConfig;
use crate::domain::workflow::{ExtractionActivity, ReviewApplier};
use crate::domain::DomainError;

pub const PRIMARY_EXTRACTION: &str = "primary-extraction";
pub const FALLBACK_EXTRACTION: &str = "fallback-extraction";

/// Activities the engine runs
#[derive(Debug, Clone)]
pub struct Activities {
    pub primary: Arc<dyn ExtractionActivity>,
    pub fallback: Arc<dyn ExtractionActivity>,
    pub applier: Arc<dyn ReviewApplier>,
}

/// Factory for activities from configuration
pub struct ActivityFactory;

impl ActivityFactory {
    pub fn create(config: &ActivitiesConfig) -> Result<Activities, DomainError> {
        let timeout = config.request_timeout();

        let applier: Arc<dyn ReviewApplier> = match &config.review_url {
            Some(url) => Arc::new(HttpReviewApplier::new(url, timeout)?),
            None => {
                warn!("No review service configured, decisions will only be logged");
                Arc::new(LoggingReviewApplier)
            }
        };

        Ok(Activities {
            primary: Self::extraction(PRIMARY_EXTRACTION, config.primary_url.as_deref(), config)?,
            fallback: Self::extraction(FALLBACK_EXTRACTION, config.fallback_url.as_deref(), config)?,
            applier,
        })
    }

    fn extraction(
        name: &str,
        url: Option<&str>,
        config: &ActivitiesConfig,
    ) -> Result<Arc<dyn ExtractionActivity>, DomainError> {
        match url {
            Some(url) => Ok(Arc::new(HttpExtractionActivity::new(
                name,
                url,
                config.request_timeout(),
            )?)),
            None => {
                warn!(activity = name, "No extraction service configured, analysis will be skipped");
                Ok(Arc::new(DisabledExtraction::new(name)))
            }
        }
    }
}
