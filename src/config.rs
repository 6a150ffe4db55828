//! Configuration file parser for ~/.config/brief/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::util::{validate_endpoint, UrlValidationError};

/// Env var that overrides `api_key` from the config file.
pub const API_KEY_ENV: &str = "BRIEF_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid {field}: {source}")]
    Endpoint {
        field: &'static str,
        #[source]
        source: UrlValidationError,
    },

    #[error("page_size must be between 1 and {max}, got {got}")]
    PageSize { got: usize, max: usize },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `api_key` to prevent secret leakage in logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the article store (PostgREST root lives at `/rest/v1`).
    pub store_url: String,

    /// Static read-only store key. `BRIEF_API_KEY` takes precedence.
    pub api_key: Option<String>,

    /// Relay endpoint that asks upstream to re-crawl. `None` disables refresh triggers.
    pub refresh_trigger_url: Option<String>,

    /// Rows per feed page.
    pub page_size: usize,

    /// Row limit of the unfiltered probe issued when a filtered first page is empty.
    pub probe_limit: usize,

    /// Timeout for store requests, in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound on the refresh trigger call, in seconds.
    pub trigger_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: "http://localhost:54321".to_string(),
            api_key: None,
            refresh_trigger_url: None,
            page_size: 20,
            probe_limit: 5,
            request_timeout_secs: 30,
            trigger_timeout_secs: 5,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("store_url", &self.store_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_trigger_url", &self.refresh_trigger_url)
            .field("page_size", &self.page_size)
            .field("probe_limit", &self.probe_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("trigger_timeout_secs", &self.trigger_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Largest page the store will serve in one range request.
    pub const MAX_PAGE_SIZE: usize = 1000;

    const KNOWN_KEYS: [&'static str; 7] = [
        "store_url",
        "api_key",
        "refresh_trigger_url",
        "page_size",
        "probe_limit",
        "request_timeout_secs",
        "trigger_timeout_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
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
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), store = %config.store_url, "Loaded configuration");
        Ok(config)
    }

    /// Check endpoint URLs and numeric bounds.
    ///
    /// Endpoints must be HTTPS; plain HTTP is accepted for localhost only.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.store_url).map_err(|source| ConfigError::Endpoint {
            field: "store_url",
            source,
        })?;
        if let Some(trigger) = &self.refresh_trigger_url {
            validate_endpoint(trigger).map_err(|source| ConfigError::Endpoint {
                field: "refresh_trigger_url",
                source,
            })?;
        }
        if self.page_size == 0 || self.page_size > Self::MAX_PAGE_SIZE {
            return Err(ConfigError::PageSize {
                got: self.page_size,
                max: Self::MAX_PAGE_SIZE,
            });
        }
        Ok(())
    }

    /// Resolve the store key: env var first, then the config file.
    pub fn resolved_api_key(&self) -> Option<SecretString> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .map(SecretString::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_secs(self.trigger_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
