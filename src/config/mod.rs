//! Application configuration

mod app_config;

pub use app_config::{
    ActivitiesConfig, AppConfig, EngineConfig, LogFormat, LoggingConfig, MetricsConfig,
    RetryConfig, ServerConfig, StorageBackend, StorageConfig,
};
