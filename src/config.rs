use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::migrations::DEFAULT_EMBEDDING_MODEL;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LedgerConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model that produced the stored query embeddings; recorded in `schema_meta`.
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Estimated minutes of instructor time one answered question saves.
    pub minutes_per_query: f64,
    /// How many topics the summary and the topic rollup keep.
    pub top_topics: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.ragledger/ledger.db".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.into(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            minutes_per_query: 2.5,
            top_topics: 10,
        }
    }
}

/// Returns `~/.ragledger/`
pub fn default_ledger_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("could not determine home directory")?
        .join(".ragledger"))
}

/// Returns the default config file path: `~/.ragledger/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_ledger_dir()?.join("config.toml"))
}

impl LedgerConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path()?)
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LedgerConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (RAGLEDGER_DB, RAGLEDGER_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RAGLEDGER_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RAGLEDGER_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(dirs::home_dir()
            .context("could not determine home directory")?
            .join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}
