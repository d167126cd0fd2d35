//! Configuration loading, validation, and management for payassist.
//!
//! Loads configuration from `~/.payassist/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use payassist_core::GenerationConfig;

/// The root configuration structure.
///
/// Maps directly to `~/.payassist/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment label ("development", "production", ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Managed database / auth service
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Hosted LLM settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session cookie settings
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_environment() -> String {
    "development".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Public anon key (used for sign-in and token checks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,

    /// Service role key (used for scoped reads after authorization)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &redact(&self.anon_key))
            .field("service_key", &redact(&self.service_key))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the API base URL (defaults to the public Gemini endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.15
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_output_tokens() -> u32 {
    8192
}

impl LlmConfig {
    /// Sampling settings for the response channel.
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            top_p: self.top_p,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed to make credentialed cross-origin requests
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cookie `Domain` attribute; unset means host-only cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_domain: Option<String>,

    #[serde(default)]
    pub cookie_secure: bool,

    /// Lifetime of the refresh-token cookie
    #[serde(default = "default_refresh_max_age")]
    pub refresh_max_age_secs: u64,
}

fn default_refresh_max_age() -> u64 {
    60 * 60 * 24 * 30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_domain: None,
            cookie_secure: false,
            refresh_max_age_secs: default_refresh_max_age(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.payassist/config.toml),
    /// then apply environment variable overrides:
    /// - `SUPABASE_URL`, `SUPABASE_ANON_KEY`, `SUPABASE_SERVICE_KEY`
    /// - `GEMINI_API_KEY`, `PAYASSIST_MODEL`
    /// - `ENVIRONMENT`, `CORS_ORIGINS` (comma-separated)
    /// - `COOKIE_DOMAIN`, `COOKIE_SECURE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("SUPABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(key) = non_empty("SUPABASE_ANON_KEY") {
            self.database.anon_key = Some(key);
        }
        if let Some(key) = non_empty("SUPABASE_SERVICE_KEY") {
            self.database.service_key = Some(key);
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty("PAYASSIST_MODEL") {
            self.llm.model = model;
        }
        if let Some(env) = non_empty("ENVIRONMENT") {
            self.environment = env;
        }
        if let Some(origins) = non_empty("CORS_ORIGINS") {
            self.gateway.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(domain) = non_empty("COOKIE_DOMAIN") {
            self.session.cookie_domain = Some(domain);
        }
        if let Some(secure) = non_empty("COOKIE_SECURE") {
            self.session.cookie_secure = matches!(
                secure.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".payassist")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.llm.top_p) {
            return Err(ConfigError::ValidationError(
                "llm.top_p must be between 0.0 and 1.0".into(),
            ));
        }

        if self.llm.max_output_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_output_tokens must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Whether both the database URL and a key are present.
    pub fn has_database(&self) -> bool {
        self.database.url.is_some()
            && (self.database.service_key.is_some() || self.database.anon_key.is_some())
    }

    /// Whether an LLM API key is available.
    pub fn has_llm_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            gateway: GatewayConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
