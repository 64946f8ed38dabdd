use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::llm::{GeminiProvider, OpenAIProvider};

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            keep_alive_interval_seconds: default_keep_alive_interval(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_keep_alive_interval() -> u64 {
    15
}

// ============================================================================
// ProvidersConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "ModelConfig::openai", deserialize_with = "openai_section")]
    pub openai: ModelConfig,
    #[serde(default = "ModelConfig::gemini", deserialize_with = "gemini_section")]
    pub gemini: ModelConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ModelConfig::openai(),
            gemini: ModelConfig::gemini(),
        }
    }
}

/// Endpoint and sampling settings for one provider.
///
/// Credentials are never part of this: they arrive per session.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    pub fn openai() -> Self {
        Self {
            base_url: OpenAIProvider::DEFAULT_BASE_URL.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
        }
    }

    pub fn gemini() -> Self {
        Self {
            base_url: GeminiProvider::DEFAULT_BASE_URL.to_string(),
            model: "gemini-2.0-flash".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A provider section as written in the file; unset fields fall back to the
/// provider's defaults.
#[derive(Deserialize)]
struct ModelSection {
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ModelSection {
    fn over(self, defaults: ModelConfig) -> ModelConfig {
        ModelConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            model: self.model.unwrap_or(defaults.model),
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
        }
    }
}

fn openai_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModelConfig, D::Error> {
    Ok(ModelSection::deserialize(deserializer)?.over(ModelConfig::openai()))
}

fn gemini_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModelConfig, D::Error> {
    Ok(ModelSection::deserialize(deserializer)?.over(ModelConfig::gemini()))
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

// ============================================================================
// Tests
// ============================================================================
