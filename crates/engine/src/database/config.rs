//! Database configuration via `relaydb.toml`
//!
//! On first open, a default `relaydb.toml` is written into the data
//! directory. To change settings, edit the file and reopen the database.

use relaydb_core::{Error, Result};
use relaydb_storage::{DurabilityMode, WalConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "relaydb.toml";

/// Default number of key lock stripes.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Database configuration loaded from `relaydb.toml`.
///
/// # Example
///
/// ```toml
/// durability = "always"
/// lock_stripes = 128
/// wal_segment_size = 16777216
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Durability mode: `"standard"`, `"always"` or `"cache"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Number of stripes used to serialize same-key mutations.
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,
    /// Maximum WAL segment size in bytes (default 64MB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wal_segment_size: Option<u64>,
}

fn default_durability_str() -> String {
    "standard".to_string()
}

fn default_lock_stripes() -> usize {
    DEFAULT_LOCK_STRIPES
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            lock_stripes: DEFAULT_LOCK_STRIPES,
            wal_segment_size: None,
        }
    }
}

impl RelayConfig {
    /// Sync policy named by `durability`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the string is not `"standard"`, `"always"`
    /// or `"cache"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => Ok(DurabilityMode::standard_default()),
            "always" => Ok(DurabilityMode::Always),
            "cache" => Ok(DurabilityMode::Cache),
            other => Err(Error::Config(format!(
                "invalid durability mode '{}' in {}. Expected \"standard\", \"always\" or \"cache\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// WAL writer settings derived from this config.
    pub fn wal_config(&self) -> WalConfig {
        match self.wal_segment_size {
            Some(size) => WalConfig::default().with_segment_size(size),
            None => WalConfig::default(),
        }
    }

    /// Check every field, not just the durability string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.durability_mode()?;
        if self.lock_stripes == 0 {
            return Err(Error::Config("lock_stripes must be at least 1".to_string()));
        }
        if self.wal_segment_size == Some(0) {
            return Err(Error::Config(
                "wal_segment_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Commented file written on first open
    pub fn default_toml() -> &'static str {
        r#"# relaydb configuration
#
# Durability mode: "standard" (default), "always" or "cache"
#   "standard" = periodic fsync (~100ms), may lose last interval on crash
#   "always"   = fsync every batch, zero data loss
#   "cache"    = no WAL, nothing survives a restart
durability = "standard"

# Stripes used to serialize mutations of the same primary key.
lock_stripes = 64

# Maximum WAL segment size in bytes (default 64MB).
# wal_segment_size = 67108864
"#
    }

    /// Load and validate `relaydb.toml`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read, parsed or
    /// validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: RelayConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create the commented default file unless one is present
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Overwrite `path` with this config
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
