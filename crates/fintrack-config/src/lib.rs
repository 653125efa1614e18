//! Configuration management for fintrack
//!
//! This module handles loading, validation, and management of
//! fintrack configuration from YAML files. Secrets (AI provider keys,
//! Gmail credentials) are resolved from environment variables rather
//! than the config file.

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::ConfigError;

// ==================== Configuration Types ====================

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin ("*" for any)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origin() -> String {
    "*".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/fintrack.sqlite")
}

/// Authentication and token lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Access session lifetime in minutes
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_days: i64,
    /// Maximum concurrent sessions per user; older sessions are pruned
    #[serde(default = "default_max_sessions")]
    pub max_sessions: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_days: default_refresh_ttl(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_access_ttl() -> i64 {
    60 * 24
}

fn default_refresh_ttl() -> i64 {
    7
}

fn default_max_sessions() -> i64 {
    5
}

/// Recurring sweep scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Enable the periodic recurring sweep
    #[serde(default = "default_true")]
    pub sweep_enable: bool,
    /// Minutes between sweep ticks (default: once a day)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_enable: default_true(),
            sweep_interval_minutes: default_sweep_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60 * 24
}

/// AI provider selection
///
/// Providers all speak the OpenAI-compatible chat-completion protocol;
/// selection is by priority-ordered environment lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenAi,
    Groq,
    Gemini,
    DeepSeek,
}

impl AiProvider {
    /// Default base URL for the provider's OpenAI-compatible endpoint
    pub fn base_url(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "https://api.openai.com/v1",
            AiProvider::Groq => "https://api.groq.com/openai/v1",
            AiProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            AiProvider::DeepSeek => "https://api.deepseek.com",
        }
    }

    /// Default chat model for the provider
    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "gpt-4o-mini",
            AiProvider::Groq => "llama-3.3-70b-versatile",
            AiProvider::Gemini => "gemini-2.0-flash",
            AiProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variable holding the provider's API key
    pub fn key_var(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "OPENAI_API_KEY",
            AiProvider::Groq => "GROQ_API_KEY",
            AiProvider::Gemini => "GEMINI_API_KEY",
            AiProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProvider::OpenAi => write!(f, "openai"),
            AiProvider::Groq => write!(f, "groq"),
            AiProvider::Gemini => write!(f, "gemini"),
            AiProvider::DeepSeek => write!(f, "deepseek"),
        }
    }
}

/// A fully resolved AI provider: which one, its key, endpoint and model
#[derive(Debug, Clone)]
pub struct ResolvedAiProvider {
    pub provider: AiProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// AI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Override the provider's default chat model
    #[serde(default)]
    pub model: Option<String>,
    /// Maximum tokens for chat replies
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,
    /// Number of history messages carried into each chat call
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: None,
            chat_max_tokens: default_chat_max_tokens(),
            history_window: default_history_window(),
        }
    }
}

fn default_chat_max_tokens() -> u32 {
    1000
}

fn default_history_window() -> usize {
    10
}

impl AiConfig {
    /// Resolve the active provider from the environment.
    ///
    /// Priority: OPENAI > GROQ > GEMINI > DEEPSEEK. Returns None when no
    /// key is configured; AI endpoints then report an upstream error.
    pub fn resolve_provider(&self) -> Option<ResolvedAiProvider> {
        const ORDER: [AiProvider; 4] = [
            AiProvider::OpenAi,
            AiProvider::Groq,
            AiProvider::Gemini,
            AiProvider::DeepSeek,
        ];
        for provider in ORDER {
            if let Ok(api_key) = std::env::var(provider.key_var()) {
                if api_key.is_empty() {
                    continue;
                }
                return Some(ResolvedAiProvider {
                    provider,
                    api_key,
                    base_url: provider.base_url().to_string(),
                    model: self
                        .model
                        .clone()
                        .unwrap_or_else(|| provider.default_model().to_string()),
                });
            }
        }
        None
    }
}

/// Email sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSyncConfig {
    /// Gmail search query used to select bank notification emails
    #[serde(default = "default_email_query")]
    pub query: String,
    /// Maximum messages fetched per sync pass
    #[serde(default = "default_email_max_results")]
    pub max_results: u32,
}

impl Default for EmailSyncConfig {
    fn default() -> Self {
        Self {
            query: default_email_query(),
            max_results: default_email_max_results(),
        }
    }
}

fn default_email_query() -> String {
    "category:primary newer_than:7d (bank OR transaction OR payment)".to_string()
}

fn default_email_max_results() -> u32 {
    25
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Recurring sweep scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// AI settings
    #[serde(default)]
    pub ai: AiConfig,
    /// Email sync settings
    #[serde(default)]
    pub email_sync: EmailSyncConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|_| ConfigError::IoError)?;

        let config: Config = serde_yaml::from_str(&content).map_err(|_| ConfigError::InvalidYaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if self.auth.refresh_ttl_days < 1 {
            return Err(ConfigError::InvalidValue {
                field: "auth.refresh_ttl_days".to_string(),
                reason: "Refresh token lifetime must be at least one day".to_string(),
            });
        }

        if self.scheduler.sweep_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.sweep_interval_minutes".to_string(),
                reason: "Sweep interval must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.refresh_ttl_days, 7);
        assert_eq!(config.auth.max_sessions, 5);
        assert!(config.scheduler.sweep_enable);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = "server:\n  port: 8080\nauth:\n  refresh_ttl_days: 14\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.refresh_ttl_days, 14);
        // untouched sections fall back to defaults
        assert_eq!(config.auth.max_sessions, 5);
        assert_eq!(config.scheduler.sweep_interval_minutes, 60 * 24);
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let yaml = "server:\n  port: 0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_provider_metadata() {
        assert_eq!(AiProvider::Groq.default_model(), "llama-3.3-70b-versatile");
        assert_eq!(AiProvider::OpenAi.key_var(), "OPENAI_API_KEY");
        assert_eq!(AiProvider::DeepSeek.to_string(), "deepseek");
    }
}
