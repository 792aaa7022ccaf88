//! Configuration file parser for ~/.config/podcast-proxy/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown top-level keys are accepted but logged, since they are usually
//! typos.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::MAX_RESOURCE_SIZE;
use crate::strategy::{StrategyConfig, StrategyError, StrategyRegistry};

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

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the response cache and persisted feeds.
    /// `None` uses `$HOME/.cache/podcast-proxy`.
    pub data_dir: Option<PathBuf>,

    /// Freshness window of cached responses, in hours.
    pub cache_ttl_hours: u64,

    /// Whether GET entries take their headers from a separate HEAD request.
    pub head_for_headers: bool,

    /// User-Agent sent with every request.
    pub user_agent: String,

    /// Largest response body accepted, in bytes.
    pub max_resource_bytes: usize,

    /// Extra strategies, or overrides of built-in ones, by name.
    pub strategies: BTreeMap<String, StrategyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            cache_ttl_hours: 24,
            head_for_headers: true,
            user_agent: concat!("podcast-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            max_resource_bytes: MAX_RESOURCE_SIZE,
            strategies: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "data_dir",
        "cache_ttl_hours",
        "head_for_headers",
        "user_agent",
        "max_resource_bytes",
        "strategies",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
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
        tracing::info!(
            path = %path.display(),
            strategies = config.strategies.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(60 * 60))
    }

    /// Built-in strategies plus the ones declared in this file.
    pub fn registry(&self) -> Result<StrategyRegistry, StrategyError> {
        let mut registry = StrategyRegistry::builtin()?;
        for (name, strategy) in &self.strategies {
            registry.register(name, strategy)?;
        }
        Ok(registry)
    }
}

// ============================================================================
// Tests
// ============================================================================
