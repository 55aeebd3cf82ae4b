//! Database configuration via `tessera.toml`
//!
//! On first open a default `tessera.toml` is written into the data
//! directory. To change settings, edit the file and reopen.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::{TesseraError, TesseraResult};
use tessera_durability::DurabilityMode;

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Default number of commits between version-chain sweeps.
pub const DEFAULT_GC_INTERVAL: u64 = 1024;

/// Database configuration loaded from `tessera.toml`.
///
/// # Example
///
/// ```toml
/// name = "inventory"
/// durability = "standard"
/// gc_interval = 1024
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesseraConfig {
    /// Name reported in logs and `DatabaseClosed` errors.
    #[serde(default = "default_name")]
    pub name: String,
    /// Durability mode: `"cache"`, `"standard"` or `"always"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Commits between sweeps of versions no snapshot can see.
    #[serde(default = "default_gc_interval")]
    pub gc_interval: u64,
}

fn default_name() -> String {
    "tessera".to_string()
}

fn default_durability_str() -> String {
    "standard".to_string()
}

fn default_gc_interval() -> u64 {
    DEFAULT_GC_INTERVAL
}

impl Default for TesseraConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            durability: default_durability_str(),
            gc_interval: default_gc_interval(),
        }
    }
}

impl TesseraConfig {
    /// Config with the given name and defaults elsewhere
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a known mode.
    pub fn durability_mode(&self) -> TesseraResult<DurabilityMode> {
        self.durability.parse::<DurabilityMode>().map_err(|_| {
            TesseraError::invalid_input(format!(
                "Invalid durability mode '{}' in tessera.toml. Expected \"cache\", \"standard\" or \"always\".",
                self.durability
            ))
        })
    }

    /// Check every field.
    pub fn validate(&self) -> TesseraResult<()> {
        self.durability_mode()?;
        if self.name.is_empty() {
            return Err(TesseraError::invalid_input(
                "database name must not be empty",
            ));
        }
        if self.gc_interval == 0 {
            return Err(TesseraError::invalid_input(
                "gc_interval must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tessera database configuration

# Name used in logs and error messages
name = "tessera"

# Durability mode: "standard" (default), "always" or "cache"
#   "standard" = every commit reaches the OS, fsync on close
#   "always"   = fsync every commit
#   "cache"    = no journal, contents are lost on close
durability = "standard"

# Commits between sweeps of old document versions (default: 1024)
gc_interval = 1024
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> TesseraResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: TesseraConfig = toml::from_str(&content).map_err(|e| {
            TesseraError::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> TesseraResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                TesseraError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> TesseraResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TesseraError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            TesseraError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
