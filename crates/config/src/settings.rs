//! Main settings module
//!
//! Default functions read the well-known deployment environment keys
//! directly, so a bare container with only env vars set gets a complete
//! configuration; file layers and SALESLINE__ overrides refine it.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub tts: TtsSettings,

    #[serde(default)]
    pub carrier: CarrierConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL webhooks and audio links are built against
    #[serde(default = "default_webhook_base_url")]
    pub webhook_base_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_webhook_base_url() -> String {
    std::env::var("WEBHOOK_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_base_url: default_webhook_base_url(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_api_key")]
    pub api_key: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Hard cap on completion length; replies are spoken, so short
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
}

fn default_llm_base_url() -> String {
    std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string())
}

fn default_llm_api_key() -> String {
    std::env::var("LLM_API_KEY").unwrap_or_default()
}

fn default_llm_model() -> String {
    std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
}

fn default_llm_max_tokens() -> usize {
    150
}

fn default_llm_temperature() -> f32 {
    0.7
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: default_llm_api_key(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
        }
    }
}

/// TTS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSettings {
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,

    #[serde(default = "default_tts_api_key")]
    pub api_key: String,

    #[serde(default = "default_tts_model")]
    pub model: String,

    #[serde(default = "default_tts_voice")]
    pub voice: String,

    #[serde(default = "default_tts_format")]
    pub format: String,

    #[serde(default = "default_tts_cache_dir")]
    pub cache_dir: String,

    #[serde(default = "default_tts_memory_cache_size")]
    pub memory_cache_size: usize,

    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tts_base_url() -> String {
    std::env::var("TTS_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string())
}

fn default_tts_api_key() -> String {
    std::env::var("TTS_API_KEY")
        .or_else(|_| std::env::var("LLM_API_KEY"))
        .unwrap_or_default()
}

fn default_tts_model() -> String {
    std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string())
}

fn default_tts_voice() -> String {
    std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string())
}

fn default_tts_format() -> String {
    "mp3".to_string()
}

fn default_tts_cache_dir() -> String {
    std::env::var("TTS_CACHE_DIR").unwrap_or_else(|_| "/tmp/salesline-tts-cache".to_string())
}

fn default_tts_memory_cache_size() -> usize {
    std::env::var("TTS_MEMORY_CACHE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(50)
}

fn default_tts_timeout_secs() -> u64 {
    15
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            api_key: default_tts_api_key(),
            model: default_tts_model(),
            voice: default_tts_voice(),
            format: default_tts_format(),
            cache_dir: default_tts_cache_dir(),
            memory_cache_size: default_tts_memory_cache_size(),
            timeout_secs: default_tts_timeout_secs(),
        }
    }
}

/// Telephony carrier credentials and webhook security
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    #[serde(default = "default_carrier_account_sid")]
    pub account_sid: String,

    #[serde(default = "default_carrier_auth_token")]
    pub auth_token: String,

    #[serde(default = "default_carrier_from_number")]
    pub from_number: String,

    #[serde(default = "default_signature_verification")]
    pub signature_verification_enabled: bool,
}

fn default_carrier_account_sid() -> String {
    std::env::var("CARRIER_ACCOUNT_SID").unwrap_or_default()
}

fn default_carrier_auth_token() -> String {
    std::env::var("CARRIER_AUTH_TOKEN").unwrap_or_default()
}

fn default_carrier_from_number() -> String {
    std::env::var("CARRIER_FROM_NUMBER").unwrap_or_default()
}

fn default_signature_verification() -> bool {
    std::env::var("SIGNATURE_VERIFICATION_ENABLED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(true)
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            account_sid: default_carrier_account_sid(),
            auth_token: default_carrier_auth_token(),
            from_number: default_carrier_from_number(),
            signature_verification_enabled: default_signature_verification(),
        }
    }
}

/// Response engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_response_cache_ttl")]
    pub response_cache_ttl_seconds: u64,

    #[serde(default = "default_response_cache_max_entries")]
    pub response_cache_max_entries: usize,

    /// Compatibility path: await the full LLM completion before TTS
    /// instead of overlapping from the first sentence
    #[serde(default)]
    pub serial_pipeline: bool,
}

fn default_response_cache_ttl() -> u64 {
    std::env::var("RESPONSE_CACHE_TTL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600)
}

fn default_response_cache_max_entries() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_cache_ttl_seconds: default_response_cache_ttl(),
            response_cache_max_entries: default_response_cache_max_entries(),
            serial_pipeline: false,
        }
    }
}

/// Quality scoring thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_quality_baseline")]
    pub baseline_score: f32,

    /// Windowed mean this far below baseline raises an alert
    #[serde(default = "default_quality_alert_threshold")]
    pub alert_threshold: f32,
}

fn default_quality_baseline() -> f32 {
    std::env::var("QUALITY_BASELINE_SCORE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(75.0)
}

fn default_quality_alert_threshold() -> f32 {
    std::env::var("QUALITY_ALERT_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5.0)
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            baseline_score: default_quality_baseline(),
            alert_threshold: default_quality_alert_threshold(),
        }
    }
}

/// Database configuration
///
/// `DATABASE_URL` uses the form `scylla://host1,host2/keyspace`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_persistence_enabled")]
    pub enabled: bool,

    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_persistence_enabled() -> bool {
    std::env::var("DATABASE_URL").is_ok()
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "scylla://127.0.0.1:9042/salesline".to_string())
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_persistence_enabled(),
            database_url: default_database_url(),
        }
    }
}

impl PersistenceConfig {
    /// Split the database URL into node addresses and keyspace
    pub fn parse_url(&self) -> Result<(Vec<String>, String), ConfigError> {
        let rest = self
            .database_url
            .strip_prefix("scylla://")
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "persistence.database_url".to_string(),
                message: "expected scylla://host1,host2/keyspace".to_string(),
            })?;
        let (hosts, keyspace) = rest.split_once('/').unwrap_or((rest, "salesline"));
        let hosts: Vec<String> = hosts
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if hosts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "persistence.database_url".to_string(),
                message: "no hosts in database url".to_string(),
            });
        }
        Ok((hosts, keyspace.to_string()))
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "port cannot be 0".to_string(),
            });
        }

        if self.llm.max_tokens == 0 || self.llm.max_tokens > 4096 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: format!("must be in 1..=4096, got {}", self.llm.max_tokens),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("must be in 0.0..=2.0, got {}", self.llm.temperature),
            });
        }

        if self.tts.memory_cache_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tts.memory_cache_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.engine.response_cache_max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.response_cache_max_entries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.quality.baseline_score <= 0.0 || self.quality.baseline_score > 100.0 {
            return Err(ConfigError::InvalidValue {
                field: "quality.baseline_score".to_string(),
                message: format!("must be in (0, 100], got {}", self.quality.baseline_score),
            });
        }

        if self.environment.is_production() {
            if self.carrier.auth_token.is_empty() && self.carrier.signature_verification_enabled {
                return Err(ConfigError::InvalidValue {
                    field: "carrier.auth_token".to_string(),
                    message: "required in production when signature verification is enabled"
                        .to_string(),
                });
            }
            if self.llm.api_key.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "llm.api_key".to_string(),
                    message: "required in production".to_string(),
                });
            }
        }

        self.persistence.parse_url().map(|_| ())
    }
}

/// Load settings from files and environment
///
/// Priority: SALESLINE__ env overrides > config/{env}.yaml >
/// config/default.yaml > built-in defaults (which themselves honor the
/// deployment env keys).
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("SALESLINE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.llm.max_tokens, 150);
        assert_eq!(settings.tts.timeout_secs, 15);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_port_validation() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_temperature_bounds() {
        let mut settings = Settings::default();
        settings.llm.temperature = 3.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_database_url_parsing() {
        let cfg = PersistenceConfig {
            enabled: true,
            database_url: "scylla://10.0.0.1:9042,10.0.0.2:9042/calls".to_string(),
        };
        let (hosts, keyspace) = cfg.parse_url().unwrap();
        assert_eq!(hosts, vec!["10.0.0.1:9042", "10.0.0.2:9042"]);
        assert_eq!(keyspace, "calls");
    }

    #[test]
    fn test_database_url_default_keyspace() {
        let cfg = PersistenceConfig {
            enabled: true,
            database_url: "scylla://127.0.0.1:9042".to_string(),
        };
        let (_, keyspace) = cfg.parse_url().unwrap();
        assert_eq!(keyspace, "salesline");
    }

    #[test]
    fn test_database_url_rejects_other_schemes() {
        let cfg = PersistenceConfig {
            enabled: true,
            database_url: "postgres://localhost/calls".to_string(),
        };
        assert!(cfg.parse_url().is_err());
    }

    #[test]
    fn test_production_requires_credentials() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.llm.api_key = String::new();
        settings.carrier.signature_verification_enabled = false;
        assert!(settings.validate().is_err());

        settings.llm.api_key = "sk-test".to_string();
        assert!(settings.validate().is_ok());
    }
}
