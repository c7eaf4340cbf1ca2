//! Configuration file parser for ~/.config/presswire/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::publish::PostStatus;
use crate::rewrite::{
    RewriteOptions, Style, Tone, DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Every section and key is optional; missing values fall back to
/// `Default::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub rewrite: RewriteConfig,
    pub publish: PublishConfig,
    pub pipeline: PipelineConfig,
}

/// Outbound HTTP policy shared by every adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Permit source URLs on loopback and private networks.
    pub allow_private_hosts: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("presswire/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            allow_private_hosts: false,
        }
    }
}

impl HttpConfig {
    /// Build the client used by all adapters.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
    pub tone: Tone,
    pub style: Style,
    pub seo: bool,
    /// Convert Markdown replies to HTML before storing them. Replies that
    /// already start with a tag are stored as sent.
    pub render_markdown: bool,
    /// API key (alternative to OPENAI_API_KEY env var and the stored key).
    pub api_key: Option<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            tone: Tone::default(),
            style: Style::default(),
            seo: true,
            render_markdown: false,
            api_key: None,
        }
    }
}

impl RewriteConfig {
    /// Tone, style and SEO defaults for a rewrite batch.
    pub fn options(&self) -> RewriteOptions {
        RewriteOptions {
            tone: self.tone,
            style: self.style,
            seo: self.seo,
        }
    }
}

impl std::fmt::Debug for RewriteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("tone", &self.tone)
            .field("style", &self.style)
            .field("seo", &self.seo)
            .field("render_markdown", &self.render_markdown)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub status: PostStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items in flight per batch. 1 processes strictly one at a time.
    pub max_concurrent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_concurrent: 1 }
    }
}

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("http", &["user_agent", "timeout_secs", "allow_private_hosts"]),
    (
        "rewrite",
        &[
            "api_base",
            "model",
            "temperature",
            "tone",
            "style",
            "seo",
            "render_markdown",
            "api_key",
        ],
    ),
    ("publish", &["status"]),
    ("pipeline", &["max_concurrent"]),
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::debug!(config = ?config, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.rewrite.temperature) {
            return Err(ConfigError::Invalid(format!(
                "rewrite.temperature must be between 0 and 2, got {}",
                self.rewrite.temperature
            )));
        }
        Ok(())
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (key, value) in raw {
        let Some((_, fields)) = KNOWN_KEYS
            .iter()
            .find(|(section, _)| *section == key.as_str())
        else {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        };
        if let Some(table) = value.as_table() {
            for field in table.keys() {
                if !fields.contains(&field.as_str()) {
                    tracing::warn!(key = %format!("{key}.{field}"), "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
