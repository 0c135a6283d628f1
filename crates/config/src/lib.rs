//! Configuration management for the sales voice agent
//!
//! Supports loading configuration from:
//! - YAML files (config/default.yaml, config/{env}.yaml)
//! - Environment variables (SALESLINE_ prefix, plus the well-known
//!   deployment keys such as LLM_BASE_URL and DATABASE_URL)
//! - Built-in defaults

pub mod settings;

pub use settings::{
    load_settings, CarrierConfig, EngineConfig, LlmSettings, PersistenceConfig, QualityConfig,
    RuntimeEnvironment, ServerConfig, Settings, TtsSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
