use std::time::Duration;

use serde::Deserialize;

use crate::domain::workflow::RetryPolicy;

/// Application configuration
///
/// Every section has defaults, so an empty environment yields a working
/// in-memory setup.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub activities: ActivitiesConfig,
    pub retry: RetryConfig,
    pub engine: EngineConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub url: String,
    /// Table holding workflow snapshots
    pub table: String,
    /// Table holding audit entries
    pub audit_table: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Endpoints of the remote activities
///
/// An unset extraction URL disables that path: the step fails immediately
/// as a business skip and the workflow moves on.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivitiesConfig {
    pub primary_url: Option<String>,
    pub fallback_url: Option<String>,
    pub review_url: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    pub extraction: RetryPolicy,
    pub review: RetryPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for a single audit call
    pub audit_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: "postgres://localhost/docflow".to_string(),
            table: "workflow_states".to_string(),
            audit_table: "audit_entries".to_string(),
            max_connections: 10,
            min_connections: 1,
        }
    }
}

impl Default for ActivitiesConfig {
    fn default() -> Self {
        Self {
            primary_url: None,
            fallback_url: None,
            review_url: None,
            request_timeout_secs: 300,
        }
    }
}

impl ActivitiesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_timeout_ms: 2_000,
        }
    }
}

impl EngineConfig {
    pub fn audit_timeout(&self) -> Duration {
        Duration::from_millis(self.audit_timeout_ms)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Rejects retry policies the executor cannot honor
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        for (name, policy) in [
            ("retry.extraction", &self.retry.extraction),
            ("retry.review", &self.retry.review),
        ] {
            policy
                .validate()
                .map_err(|e| config::ConfigError::Message(format!("{}: {}", name, e)))?;
        }

        Ok(())
    }
}
