//! Configuration file parser for ~/.config/skimly/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
//! `FEEDLY_ACCESS_TOKEN` and `FEEDLY_BASE_URL` override the file.
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use thiserror::Error;

use crate::feedly::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::model::{ArticleCount, SortOrder};

pub const ACCESS_TOKEN_ENV: &str = "FEEDLY_ACCESS_TOKEN";
pub const BASE_URL_ENV: &str = "FEEDLY_BASE_URL";

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
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// `Debug` masks the access token.
#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feedly API root.
    pub base_url: String,

    /// Feedly developer access token.
    #[serde(deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,

    /// Unread entries fetched per stream (10, 25, 50 or 100).
    pub article_count: ArticleCount,

    /// Entry ordering: "newest" or "oldest".
    pub sort_order: SortOrder,

    /// Per-request timeout for Feedly calls.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            article_count: ArticleCount::default(),
            sort_order: SortOrder::default(),
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("article_count", &self.article_count.get())
            .field("sort_order", &self.sort_order)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SecretString>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .map(SecretString::from))
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "base_url",
        "access_token",
        "article_count",
        "sort_order",
        "request_timeout_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file -> `Ok(Config::default())`
    /// - Invalid TOML or values -> `Err(ConfigError::Parse)`
    /// - Unknown keys -> accepted, logged as warning
    ///
    /// # Errors
    ///
    /// * [`ConfigError::TooLarge`] - the file exceeds 1 MB
    /// * [`ConfigError::Io`] - the file exists but cannot be read
    /// * [`ConfigError::Parse`] - invalid TOML or an unsupported value
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
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            base_url = %config.base_url,
            article_count = config.article_count.get(),
            sort_order = %config.sort_order,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply environment overrides. Empty variables are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.access_token = Some(SecretString::from(token.trim().to_string()));
        }
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.base_url = base_url.trim().to_string();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
